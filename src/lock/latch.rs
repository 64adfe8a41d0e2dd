use std::sync::{Condvar, Mutex};

use crate::error::DispatchError;

/// Counter of outstanding asynchronous invocations with a drain barrier.
#[derive(Debug, Default)]
pub struct PendingLatch {
    count: Mutex<usize>,
    drained: Condvar,
}

impl PendingLatch {
    pub fn new() -> Self {
        PendingLatch {
            count: Mutex::new(0),
            drained: Condvar::new(),
        }
    }

    /// Register one more outstanding invocation.
    pub fn add(&self) -> Result<(), DispatchError> {
        let mut count = self
            .count
            .lock()
            .map_err(|_| DispatchError::LockPoisoned("pending latch add"))?;
        *count += 1;
        Ok(())
    }

    /// Mark one outstanding invocation as finished, waking waiters at zero.
    pub fn done(&self) -> Result<(), DispatchError> {
        let mut count = self
            .count
            .lock()
            .map_err(|_| DispatchError::LockPoisoned("pending latch done"))?;
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.drained.notify_all();
        }
        Ok(())
    }

    /// Block until the count reaches zero. Returns immediately if it already is.
    pub fn wait(&self) -> Result<(), DispatchError> {
        let mut count = self
            .count
            .lock()
            .map_err(|_| DispatchError::LockPoisoned("pending latch wait"))?;
        while *count > 0 {
            count = self
                .drained
                .wait(count)
                .map_err(|_| DispatchError::LockPoisoned("pending latch wait"))?;
        }
        Ok(())
    }

    pub fn count(&self) -> Result<usize, DispatchError> {
        self.count
            .lock()
            .map(|count| *count)
            .map_err(|_| DispatchError::LockPoisoned("pending latch count"))
    }
}
