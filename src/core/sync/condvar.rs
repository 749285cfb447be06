/*!
 * Condvar-Based Wait Strategy
 *
 * Blocks immediately on a parking_lot mutex/condvar pair whose predicate is
 * the readiness flag.
 */

use super::traits::{WaitStrategy, WakeResult};
use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Condvar-based wait strategy
///
/// # Performance
///
/// - Lowest CPU usage while waiting
/// - Higher wake latency than spinning
///
/// # Correctness
///
/// The flag is re-checked after the mutex is acquired and `wake_all` takes
/// the same mutex before notifying, so a waiter that arrives between the
/// flag store and the notification can never miss the wake.
#[derive(Debug, Default)]
pub struct CondvarWait {
    /// Guards the blocked-waiter count and orders checks against notifications
    mutex: Mutex<usize>,
    condvar: Condvar,
}

impl CondvarWait {
    /// Create a new condvar-based wait strategy
    pub const fn new() -> Self {
        Self {
            mutex: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }
}

impl WaitStrategy for CondvarWait {
    fn wait_until(&self, ready: &AtomicBool, deadline: Option<Instant>) -> bool {
        let mut blocked = self.mutex.lock();

        *blocked += 1;
        let woken = loop {
            if ready.load(Ordering::Acquire) {
                break true;
            }
            match deadline {
                Some(deadline) => {
                    if self.condvar.wait_until(&mut blocked, deadline).timed_out() {
                        break ready.load(Ordering::Acquire);
                    }
                }
                None => self.condvar.wait(&mut blocked),
            }
        };
        *blocked -= 1;

        woken
    }

    fn wake_all(&self, _ready: &AtomicBool) -> WakeResult {
        let blocked = self.mutex.lock();
        let count = *blocked;
        if count > 0 {
            self.condvar.notify_all();
        }
        WakeResult::from_count(count)
    }

    fn waiter_count(&self) -> usize {
        *self.mutex.lock()
    }

    fn name(&self) -> &'static str {
        "block"
    }
}
