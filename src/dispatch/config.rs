//! Dispatcher configuration and builder.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::dispatcher::Dispatcher;
use super::record::SubscriptionId;
use crate::error::InvocationFault;

/// Tunables for a [`Dispatcher`].
///
/// ```
/// use topic_bus::DispatcherConfig;
///
/// let config = DispatcherConfig::from_json(r#"{ "worker_name": "orders-bus" }"#).unwrap();
/// assert_eq!(config.worker_name, "orders-bus");
/// assert_eq!(config.worker_stack_size, None);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Thread name given to async handler workers.
    pub worker_name: String,
    /// Stack size in bytes for async handler workers; platform default if unset.
    pub worker_stack_size: Option<usize>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            worker_name: "topic-bus-worker".to_string(),
            worker_stack_size: None,
        }
    }
}

impl DispatcherConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// A handler invocation that failed, as passed to the fault hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaultReport {
    pub topic: String,
    pub subscription: SubscriptionId,
    pub fault: InvocationFault,
}

pub(crate) type FaultHook = Arc<dyn Fn(&FaultReport) + Send + Sync>;

/// Builder for [`Dispatcher`].
///
/// ```
/// use topic_bus::Dispatcher;
///
/// let bus = Dispatcher::builder()
///     .worker_name("audit-bus")
///     .on_fault(|report| eprintln!("{} failed: {}", report.subscription, report.fault))
///     .build();
/// assert!(!bus.has_callback("audit").unwrap());
/// ```
#[derive(Default)]
pub struct DispatcherBuilder {
    config: DispatcherConfig,
    on_fault: Option<FaultHook>,
}

impl DispatcherBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: DispatcherConfig) -> Self {
        self.config = config;
        self
    }

    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.config.worker_name = name.into();
        self
    }

    pub fn worker_stack_size(mut self, bytes: usize) -> Self {
        self.config.worker_stack_size = Some(bytes);
        self
    }

    /// Called for every failed handler invocation, sync or async, after the
    /// failure has been logged.
    ///
    /// Sync faults are reported on the publishing thread once `publish` has
    /// released the map lock, after the whole topic was dispatched. Async
    /// faults are reported on the worker thread. Either way the hook may call
    /// back into the dispatcher, e.g. to unsubscribe the failing subscription.
    pub fn on_fault<F>(mut self, hook: F) -> Self
    where
        F: Fn(&FaultReport) + Send + Sync + 'static,
    {
        self.on_fault = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Dispatcher {
        Dispatcher::from_parts(self.config, self.on_fault)
    }
}

impl fmt::Debug for DispatcherBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatcherBuilder")
            .field("config", &self.config)
            .field("on_fault", &self.on_fault.is_some())
            .finish()
    }
}
