//! Object-safe role traits over the dispatcher.
//!
//! A component can hold `Arc<dyn BusPublisher>` or `&dyn BusController`
//! without the rest. The subscriber role takes erased [`Callback`]s; the
//! generic handler-shaped subscribe calls stay on [`Dispatcher`].

use super::args::Args;
use super::dispatcher::Dispatcher;
use super::handler::Callback;
use super::record::SubscriptionId;
use crate::error::DispatchError;

/// Subscription side of the bus.
pub trait BusSubscriber: Send + Sync {
    /// Subscribe a callback invoked on the publisher's thread.
    fn subscribe(&self, topic: &str, callback: Callback) -> Result<SubscriptionId, DispatchError>;

    /// Subscribe a callback invoked on a worker thread.
    fn subscribe_async(
        &self,
        topic: &str,
        callback: Callback,
        transactional: bool,
    ) -> Result<SubscriptionId, DispatchError>;

    /// Subscribe a callback removed when first dispatched.
    fn subscribe_once(
        &self,
        topic: &str,
        callback: Callback,
    ) -> Result<SubscriptionId, DispatchError>;

    /// Asynchronous variant of [`subscribe_once`](Self::subscribe_once).
    fn subscribe_once_async(
        &self,
        topic: &str,
        callback: Callback,
    ) -> Result<SubscriptionId, DispatchError>;

    /// Remove a subscription. `Ok(false)` if the topic has no such id.
    fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> Result<bool, DispatchError>;
}

/// Delivery side of the bus.
pub trait BusPublisher: Send + Sync {
    /// Deliver `args` to every handler of `topic`. Returns how many were dispatched.
    fn publish(&self, topic: &str, args: Args) -> Result<usize, DispatchError>;
}

/// Inspection and synchronization side of the bus.
pub trait BusController: Send + Sync {
    /// True if `topic` has at least one subscription.
    fn has_callback(&self, topic: &str) -> Result<bool, DispatchError>;

    /// Block until all outstanding asynchronous invocations have finished.
    fn wait_async(&self) -> Result<(), DispatchError>;
}

/// All three roles at once.
pub trait Bus: BusSubscriber + BusPublisher + BusController {}

impl<T: BusSubscriber + BusPublisher + BusController + ?Sized> Bus for T {}

impl BusSubscriber for Dispatcher {
    fn subscribe(&self, topic: &str, callback: Callback) -> Result<SubscriptionId, DispatchError> {
        Dispatcher::subscribe(self, topic, callback)
    }

    fn subscribe_async(
        &self,
        topic: &str,
        callback: Callback,
        transactional: bool,
    ) -> Result<SubscriptionId, DispatchError> {
        Dispatcher::subscribe_async(self, topic, callback, transactional)
    }

    fn subscribe_once(
        &self,
        topic: &str,
        callback: Callback,
    ) -> Result<SubscriptionId, DispatchError> {
        Dispatcher::subscribe_once(self, topic, callback)
    }

    fn subscribe_once_async(
        &self,
        topic: &str,
        callback: Callback,
    ) -> Result<SubscriptionId, DispatchError> {
        Dispatcher::subscribe_once_async(self, topic, callback)
    }

    fn unsubscribe(&self, topic: &str, id: SubscriptionId) -> Result<bool, DispatchError> {
        Dispatcher::unsubscribe(self, topic, id)
    }
}

impl BusPublisher for Dispatcher {
    fn publish(&self, topic: &str, args: Args) -> Result<usize, DispatchError> {
        Dispatcher::publish(self, topic, args)
    }
}

impl BusController for Dispatcher {
    fn has_callback(&self, topic: &str) -> Result<bool, DispatchError> {
        Dispatcher::has_callback(self, topic)
    }

    fn wait_async(&self) -> Result<(), DispatchError> {
        Dispatcher::wait_async(self)
    }
}
