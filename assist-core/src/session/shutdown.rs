use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// Cooperative stop flag shared by the task loops.
///
/// Unlike a bare `AtomicBool` run flag, a loop sleeping in
/// [`wait_timeout`](Self::wait_timeout) wakes as soon as the signal is triggered.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trigger(&self) {
        let (flag, cvar) = &*self.inner;
        *flag.lock() = true;
        cvar.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        *self.inner.0.lock()
    }

    /// Sleep for `timeout` or until triggered. Returns `true` if triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (flag, cvar) = &*self.inner;
        let deadline = Instant::now().checked_add(timeout);
        let mut triggered = flag.lock();
        while !*triggered {
            match deadline {
                Some(deadline) => {
                    if cvar.wait_until(&mut triggered, deadline).timed_out() {
                        break;
                    }
                }
                // Unrepresentable deadline: wait for the trigger alone.
                None => cvar.wait(&mut triggered),
            }
        }
        *triggered
    }
}
