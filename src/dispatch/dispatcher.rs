//! The topic dispatcher.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;

use super::args::Args;
use super::config::{DispatcherBuilder, DispatcherConfig, FaultHook, FaultReport};
use super::handler::{Callback, Handler};
use super::record::{HandlerRecord, Mode, SubscriptionId};
use crate::error::{DispatchError, InvocationFault};
use crate::lock::PendingLatch;

type HandlerMap = HashMap<String, Vec<Arc<HandlerRecord>>>;

/// In-process publish/subscribe over named topics.
///
/// Cloning is cheap and every clone shares the same subscriptions and the
/// same pending-async latch.
///
/// Synchronous handlers run on the publisher's thread while the dispatcher's
/// map lock is held, so they are serialized against every other
/// subscribe/unsubscribe/publish call. A synchronous handler must not call
/// back into the same dispatcher; it would deadlock on that lock. Subscribe
/// such handlers with [`subscribe_async`](Self::subscribe_async) instead.
///
/// ```
/// use std::sync::atomic::{AtomicU32, Ordering};
/// use std::sync::Arc;
/// use topic_bus::{args, Dispatcher};
///
/// let bus = Dispatcher::new();
/// let total = Arc::new(AtomicU32::new(0));
///
/// let sink = Arc::clone(&total);
/// let id = bus
///     .subscribe("order.placed", move |qty: u32| {
///         sink.fetch_add(qty, Ordering::SeqCst);
///     })
///     .unwrap();
///
/// bus.publish("order.placed", args![3]).unwrap();
/// bus.publish("order.placed", args![4]).unwrap();
/// assert_eq!(total.load(Ordering::SeqCst), 7);
///
/// bus.unsubscribe("order.placed", id).unwrap();
/// assert!(!bus.has_callback("order.placed").unwrap());
/// ```
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<Inner>,
}

struct Inner {
    handlers: Mutex<HandlerMap>,
    pending: Arc<PendingLatch>,
    next_id: AtomicU64,
    config: DispatcherConfig,
    on_fault: Option<FaultHook>,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    /// Create a dispatcher with the default configuration and no fault hook.
    pub fn new() -> Self {
        Self::from_parts(DispatcherConfig::default(), None)
    }

    /// Start a [`DispatcherBuilder`] for a custom configuration or fault hook.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::new()
    }

    pub(crate) fn from_parts(config: DispatcherConfig, on_fault: Option<FaultHook>) -> Self {
        Self {
            inner: Arc::new(Inner {
                handlers: Mutex::new(HashMap::new()),
                pending: Arc::new(PendingLatch::new()),
                next_id: AtomicU64::new(1),
                config,
                on_fault,
            }),
        }
    }

    /// The configuration this dispatcher was built with.
    pub fn config(&self) -> &DispatcherConfig {
        &self.inner.config
    }

    // ========================================================================
    // Subscribe
    // ========================================================================

    /// Subscribe a handler invoked synchronously on the publisher's thread.
    pub fn subscribe<H, P>(
        &self,
        topic: impl Into<String>,
        handler: H,
    ) -> Result<SubscriptionId, DispatchError>
    where
        H: Handler<P>,
        P: 'static,
    {
        self.register(topic.into(), handler.into_callback(), Mode::SYNC)
    }

    /// Subscribe a handler invoked on a worker thread.
    ///
    /// With `transactional` set, successive invocations of this subscription
    /// never overlap and run in the order their publish calls reached it.
    /// Such a handler must not publish to its own topic: the nested publish
    /// would wait on the invocation the handler itself is running.
    ///
    /// Every dispatch starts its own thread; workers are not pooled. Under a
    /// high publish rate with slow handlers the thread count grows with the
    /// number of outstanding invocations, and once the OS refuses new threads
    /// those invocations are reported as [`InvocationFault::Unscheduled`].
    pub fn subscribe_async<H, P>(
        &self,
        topic: impl Into<String>,
        handler: H,
        transactional: bool,
    ) -> Result<SubscriptionId, DispatchError>
    where
        H: Handler<P>,
        P: 'static,
    {
        let mode = if transactional {
            Mode::TRANSACTIONAL
        } else {
            Mode::ASYNC
        };
        self.register(topic.into(), handler.into_callback(), mode)
    }

    /// Subscribe a synchronous handler that is removed when first dispatched.
    pub fn subscribe_once<H, P>(
        &self,
        topic: impl Into<String>,
        handler: H,
    ) -> Result<SubscriptionId, DispatchError>
    where
        H: Handler<P>,
        P: 'static,
    {
        self.register(topic.into(), handler.into_callback(), Mode::ONCE)
    }

    /// Subscribe an asynchronous handler that is removed when first dispatched.
    pub fn subscribe_once_async<H, P>(
        &self,
        topic: impl Into<String>,
        handler: H,
    ) -> Result<SubscriptionId, DispatchError>
    where
        H: Handler<P>,
        P: 'static,
    {
        self.register(topic.into(), handler.into_callback(), Mode::ONCE_ASYNC)
    }

    /// Subscribe a dynamically typed value.
    ///
    /// The value must be a boxed [`Callback`]; anything else fails with
    /// [`DispatchError::InvalidHandler`] and registers nothing.
    pub fn subscribe_dynamic(
        &self,
        topic: impl Into<String>,
        value: Box<dyn Any + Send + Sync>,
        mode: Mode,
    ) -> Result<SubscriptionId, DispatchError> {
        let topic = topic.into();
        let callback = Callback::from_any(&topic, value)?;
        self.register(topic, callback, mode)
    }

    fn register(
        &self,
        topic: String,
        callback: Callback,
        mode: Mode,
    ) -> Result<SubscriptionId, DispatchError> {
        let id = SubscriptionId::new(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        let record = Arc::new(HandlerRecord::new(id, callback, mode));

        let mut handlers = self.inner.lock_handlers("subscribe")?;
        handlers.entry(topic.clone()).or_default().push(record);
        drop(handlers);

        tracing::debug!(
            topic = %topic,
            subscription = %id,
            once = mode.once,
            is_async = mode.is_async,
            transactional = mode.transactional,
            "subscribed"
        );
        Ok(id)
    }

    // ========================================================================
    // Unsubscribe
    // ========================================================================

    /// Remove the subscription identified by `id`.
    ///
    /// Returns `Ok(false)` if the topic has handlers but none with this id.
    /// Fails with [`DispatchError::TopicNotFound`] if the topic has none.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> Result<bool, DispatchError> {
        self.remove_first(topic, "unsubscribe", |record| record.id == id)
    }

    /// Remove the first subscription registered with a clone of `callback`.
    ///
    /// Same contract as [`unsubscribe`](Self::unsubscribe). Prefer the
    /// subscription id; this only matches clones of one [`Callback`] value.
    pub fn unsubscribe_callback(
        &self,
        topic: &str,
        callback: &Callback,
    ) -> Result<bool, DispatchError> {
        let removed = self.remove_first(topic, "unsubscribe", |record| {
            record.callback.same(callback)
        })?;
        if !removed {
            tracing::warn!(topic, "no subscription matches the given callback");
        }
        Ok(removed)
    }

    /// Remove every subscription of `topic`, returning how many there were.
    pub fn clear_topic(&self, topic: &str) -> Result<usize, DispatchError> {
        let removed = self
            .inner
            .lock_handlers("clear_topic")?
            .remove(topic)
            .map_or(0, |live| live.len());
        tracing::debug!(topic, removed, "topic cleared");
        Ok(removed)
    }

    fn remove_first<F>(
        &self,
        topic: &str,
        operation: &'static str,
        matches: F,
    ) -> Result<bool, DispatchError>
    where
        F: Fn(&HandlerRecord) -> bool,
    {
        let mut handlers = self.inner.lock_handlers(operation)?;
        let live = match handlers.get_mut(topic) {
            Some(live) if !live.is_empty() => live,
            _ => return Err(DispatchError::TopicNotFound(topic.to_string())),
        };

        let Some(idx) = live.iter().position(|record| matches(record.as_ref())) else {
            return Ok(false);
        };
        let record = live.remove(idx);
        if live.is_empty() {
            handlers.remove(topic);
        }
        drop(handlers);

        tracing::debug!(topic, subscription = %record.id, "unsubscribed");
        Ok(true)
    }

    // ========================================================================
    // Publish
    // ========================================================================

    /// Deliver `args` to every handler of `topic`, in subscription order.
    ///
    /// Returns the number of subscriptions dispatched; publishing to a topic
    /// without handlers is a no-op returning `Ok(0)`. Handler failures do not
    /// stop the loop and are not returned here: they are logged and passed to
    /// the fault hook once the map lock is released. Asynchronous handlers may
    /// still be running when this returns; see [`wait_async`](Self::wait_async).
    pub fn publish(&self, topic: &str, args: Args) -> Result<usize, DispatchError> {
        let mut faults = Vec::new();
        let dispatched = self.dispatch(topic, Arc::new(args), &mut faults);

        // The map lock is released here, so the fault hook may use the dispatcher.
        for (subscription, fault) in faults {
            self.inner.report(topic, subscription, fault);
        }
        dispatched
    }

    /// The publish loop. Faults that surface while the map lock is held are
    /// pushed to `faults` instead of being reported.
    fn dispatch(
        &self,
        topic: &str,
        args: Arc<Args>,
        faults: &mut Vec<(SubscriptionId, InvocationFault)>,
    ) -> Result<usize, DispatchError> {
        let mut handlers = self.inner.lock_handlers("publish")?;

        // The live list may change under a transactional hand-off; iterate a copy.
        let snapshot = match handlers.get(topic) {
            Some(live) if !live.is_empty() => live.clone(),
            _ => return Ok(0),
        };

        let mut dispatched = 0;
        for record in snapshot {
            // A once record is claimed before it runs. If it is already gone,
            // another publish (or an unsubscribe) got there first.
            if record.mode.once && !claim(&mut handlers, topic, record.id) {
                continue;
            }

            tracing::trace!(topic, subscription = %record.id, is_async = record.mode.is_async, "dispatch");

            if !record.mode.is_async {
                if let Err(fault) = record.callback.invoke(&args) {
                    faults.push((record.id, fault));
                }
            } else {
                self.inner.pending.add()?;
                let mut ticket = Ticket {
                    pending: Arc::clone(&self.inner.pending),
                    record: Arc::clone(&record),
                    holds_lock: false,
                };

                if record.mode.serializes() {
                    // Wait for the previous invocation of this record without
                    // blocking the rest of the dispatcher.
                    drop(handlers);
                    record.invocation_lock.lock()?;
                    ticket.holds_lock = true;
                    handlers = self.inner.lock_handlers("publish")?;
                }

                if let Err(fault) = self.inner.spawn(topic, ticket, Arc::clone(&args)) {
                    faults.push((record.id, fault));
                }
            }
            dispatched += 1;
        }

        Ok(dispatched)
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// True if `topic` has at least one subscription.
    pub fn has_callback(&self, topic: &str) -> Result<bool, DispatchError> {
        Ok(self
            .inner
            .lock_handlers("has_callback")?
            .get(topic)
            .is_some_and(|live| !live.is_empty()))
    }

    /// Number of subscriptions on `topic`.
    pub fn handler_count(&self, topic: &str) -> Result<usize, DispatchError> {
        Ok(self
            .inner
            .lock_handlers("handler_count")?
            .get(topic)
            .map_or(0, Vec::len))
    }

    /// Topics with at least one subscription, sorted.
    pub fn topics(&self) -> Result<Vec<String>, DispatchError> {
        let mut topics: Vec<String> = self
            .inner
            .lock_handlers("topics")?
            .iter()
            .filter(|(_, live)| !live.is_empty())
            .map(|(topic, _)| topic.clone())
            .collect();
        topics.sort();
        Ok(topics)
    }

    /// Asynchronous invocations spawned and not yet finished.
    pub fn pending_async(&self) -> Result<usize, DispatchError> {
        self.inner.pending.count()
    }

    /// Block until every asynchronous invocation spawned so far has finished,
    /// across all topics. There is no timeout.
    pub fn wait_async(&self) -> Result<(), DispatchError> {
        self.inner.pending.wait()
    }

    /// Like [`wait_async`](Self::wait_async), but waits on a blocking task so
    /// the calling runtime keeps making progress.
    #[cfg(feature = "tokio")]
    pub async fn drain(&self) -> Result<(), DispatchError> {
        let pending = Arc::clone(&self.inner.pending);
        tokio::task::spawn_blocking(move || pending.wait())
            .await
            .map_err(|err| DispatchError::DrainFailed(err.to_string()))?
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.inner.config)
            .field("on_fault", &self.inner.on_fault.is_some())
            .finish_non_exhaustive()
    }
}

/// Remove a once record from the live sequence. False if it is not there.
fn claim(handlers: &mut HandlerMap, topic: &str, id: SubscriptionId) -> bool {
    let Some(live) = handlers.get_mut(topic) else {
        return false;
    };
    let Some(idx) = live.iter().position(|record| record.id == id) else {
        return false;
    };
    live.remove(idx);
    if live.is_empty() {
        handlers.remove(topic);
    }
    tracing::debug!(topic, subscription = %id, "once subscription consumed");
    true
}

impl Inner {
    fn lock_handlers(
        &self,
        operation: &'static str,
    ) -> Result<MutexGuard<'_, HandlerMap>, DispatchError> {
        self.handlers
            .lock()
            .map_err(|_| DispatchError::LockPoisoned(operation))
    }

    fn report(&self, topic: &str, subscription: SubscriptionId, fault: InvocationFault) {
        tracing::error!(
            topic,
            subscription = %subscription,
            fault = fault.as_label(),
            error = %fault,
            "handler invocation failed"
        );

        if let Some(hook) = &self.on_fault {
            let report = FaultReport {
                topic: topic.to_string(),
                subscription,
                fault,
            };
            if panic::catch_unwind(AssertUnwindSafe(|| hook(&report))).is_err() {
                tracing::error!(topic, subscription = %subscription, "fault hook panicked");
            }
        }
    }

    /// Run one async invocation on a worker thread. The ticket travels with
    /// the worker and is released when it finishes, or right here if the
    /// thread cannot be started.
    fn spawn(
        self: &Arc<Self>,
        topic: &str,
        ticket: Ticket,
        args: Arc<Args>,
    ) -> Result<(), InvocationFault> {
        let inner = Arc::clone(self);
        let owned_topic = topic.to_string();

        let mut builder = thread::Builder::new().name(self.config.worker_name.clone());
        if let Some(bytes) = self.config.worker_stack_size {
            builder = builder.stack_size(bytes);
        }

        builder
            .spawn(move || {
                let ticket = ticket;
                if let Err(fault) = ticket.record.callback.invoke(&args) {
                    inner.report(&owned_topic, ticket.record.id, fault);
                }
            })
            .map(drop)
            .map_err(|err| InvocationFault::Unscheduled(err.to_string()))
    }
}

/// Bookkeeping owned by one in-flight async invocation.
struct Ticket {
    pending: Arc<PendingLatch>,
    record: Arc<HandlerRecord>,
    holds_lock: bool,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        if self.holds_lock {
            if let Err(err) = self.record.invocation_lock.unlock() {
                tracing::error!(subscription = %self.record.id, error = %err, "failed to release invocation lock");
            }
        }
        if let Err(err) = self.pending.done() {
            tracing::error!(subscription = %self.record.id, error = %err, "failed to settle pending invocation");
        }
    }
}
