use std::fmt;

use super::handler::Callback;
use crate::lock::InvocationLock;

/// Token identifying one subscription, returned by every subscribe call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Delivery mode flags of a subscription.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Mode {
    /// Remove the subscription when it is dispatched.
    pub once: bool,
    /// Invoke on a worker thread instead of the publisher's.
    pub is_async: bool,
    /// Serialize successive async invocations of this subscription.
    /// Ignored unless `is_async` is set.
    pub transactional: bool,
}

impl Mode {
    pub const SYNC: Mode = Mode {
        once: false,
        is_async: false,
        transactional: false,
    };
    pub const ASYNC: Mode = Mode {
        once: false,
        is_async: true,
        transactional: false,
    };
    pub const TRANSACTIONAL: Mode = Mode {
        once: false,
        is_async: true,
        transactional: true,
    };
    pub const ONCE: Mode = Mode {
        once: true,
        is_async: false,
        transactional: false,
    };
    pub const ONCE_ASYNC: Mode = Mode {
        once: true,
        is_async: true,
        transactional: false,
    };

    pub(crate) fn serializes(&self) -> bool {
        self.is_async && self.transactional
    }
}

/// One registered subscription.
pub(crate) struct HandlerRecord {
    pub(crate) id: SubscriptionId,
    pub(crate) callback: Callback,
    pub(crate) mode: Mode,
    // only taken when `mode.serializes()`
    pub(crate) invocation_lock: InvocationLock,
}

impl HandlerRecord {
    pub(crate) fn new(id: SubscriptionId, callback: Callback, mode: Mode) -> Self {
        Self {
            id,
            callback,
            mode,
            invocation_lock: InvocationLock::new(),
        }
    }
}

impl fmt::Debug for HandlerRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRecord")
            .field("id", &self.id)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}
