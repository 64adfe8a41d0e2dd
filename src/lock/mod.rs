//! Blocking primitives used by the dispatcher.
//!
//! Both are `Mutex` + `Condvar` pairs with no guard type. A transactional
//! record's lock is taken by the publisher and released by the worker that
//! ran the handler; the pending latch is incremented by the publisher and
//! decremented by the worker.

mod invocation;
mod latch;

pub use invocation::InvocationLock;
pub use latch::PendingLatch;
