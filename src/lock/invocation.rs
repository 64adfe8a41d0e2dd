use std::sync::{Condvar, Mutex};

use crate::error::DispatchError;

/// Per-record lock serializing successive asynchronous invocations.
///
/// Unlike `std::sync::Mutex`, ownership is not tied to a guard, so the thread
/// that acquires it does not have to be the one that releases it.
#[derive(Debug, Default)]
pub struct InvocationLock {
    state: Mutex<bool>,
    wake: Condvar,
}

impl InvocationLock {
    pub fn new() -> Self {
        InvocationLock {
            state: Mutex::new(false),
            wake: Condvar::new(),
        }
    }

    /// Acquire the lock, blocking until the previous holder releases it.
    pub fn lock(&self) -> Result<(), DispatchError> {
        let mut locked = self
            .state
            .lock()
            .map_err(|_| DispatchError::LockPoisoned("invocation lock acquire"))?;
        while *locked {
            locked = self
                .wake
                .wait(locked)
                .map_err(|_| DispatchError::LockPoisoned("invocation lock acquire"))?;
        }
        *locked = true;
        Ok(())
    }

    pub fn unlock(&self) -> Result<(), DispatchError> {
        let mut locked = self
            .state
            .lock()
            .map_err(|_| DispatchError::LockPoisoned("invocation lock release"))?;
        if *locked {
            *locked = false;
            self.wake.notify_one();
        }
        Ok(())
    }
}
