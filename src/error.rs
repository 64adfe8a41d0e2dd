//! Error types for the dispatcher.
//!
//! - [`DispatchError`] is returned synchronously by subscribe, unsubscribe and
//!   publish bookkeeping.
//! - [`InvocationFault`] describes a failure inside one handler invocation. It
//!   never escapes `publish`; it is logged and handed to the fault hook.

use thiserror::Error;

/// Errors returned by dispatcher operations.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The value passed to a subscribe call cannot be invoked as a handler.
    #[error("invalid handler for topic {topic}: value is not an invocable callback")]
    InvalidHandler { topic: String },

    /// Unsubscribe was called for a topic with no registered handlers.
    #[error("topic {0} doesn't exist")]
    TopicNotFound(String),

    /// A std lock guarding dispatcher state was poisoned.
    #[error("dispatcher lock poisoned during {0}")]
    LockPoisoned(&'static str),

    /// The blocking task waiting for pending work did not complete.
    #[error("drain failed: {0}")]
    DrainFailed(String),
}

impl DispatchError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            DispatchError::InvalidHandler { .. } => "dispatch_invalid_handler",
            DispatchError::TopicNotFound(_) => "dispatch_topic_not_found",
            DispatchError::LockPoisoned(_) => "dispatch_lock_poisoned",
            DispatchError::DrainFailed(_) => "dispatch_drain_failed",
        }
    }
}

/// A failure local to a single handler invocation.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InvocationFault {
    /// The handler declares a different number of parameters than were published.
    #[error("handler expects {expected} argument(s), got {actual}")]
    Arity { expected: usize, actual: usize },

    /// An argument could not be bound to the handler's parameter type.
    #[error("argument {index} cannot be bound: {reason}")]
    Binding { index: usize, reason: String },

    /// The handler panicked.
    #[error("handler panicked: {0}")]
    Panicked(String),

    /// No worker thread could be started for an asynchronous invocation.
    #[error("handler could not be scheduled: {0}")]
    Unscheduled(String),
}

impl InvocationFault {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            InvocationFault::Arity { .. } => "invocation_arity",
            InvocationFault::Binding { .. } => "invocation_binding",
            InvocationFault::Panicked(_) => "invocation_panicked",
            InvocationFault::Unscheduled(_) => "invocation_unscheduled",
        }
    }

    /// Builds a [`InvocationFault::Panicked`] from a caught panic payload.
    pub(crate) fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(msg) = payload.downcast_ref::<&'static str>() {
            (*msg).to_string()
        } else if let Some(msg) = payload.downcast_ref::<String>() {
            msg.clone()
        } else {
            "unknown panic".to_string()
        };
        InvocationFault::Panicked(message)
    }
}
