/*!
 * Spin-Wait Strategy
 *
 * Busy-polls the readiness flag, yielding the processor between polls.
 * Never touches a kernel-level wait primitive.
 */

use super::traits::{WaitStrategy, WakeResult};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

/// Pure spin-wait strategy
///
/// # Performance
///
/// - Lowest wake latency: a waiter notices the flag on its next poll
/// - Unbounded CPU usage while waiting
///
/// # Use Cases
///
/// Best for scenarios where:
/// - Signal is expected within microseconds
/// - Waiters have dedicated cores
#[derive(Debug, Default)]
pub struct SpinWait {
    /// Threads currently polling (diagnostics only)
    spinning: AtomicUsize,
}

impl SpinWait {
    /// Create a new spin-wait strategy
    pub const fn new() -> Self {
        Self {
            spinning: AtomicUsize::new(0),
        }
    }
}

impl WaitStrategy for SpinWait {
    fn wait_until(&self, ready: &AtomicBool, deadline: Option<Instant>) -> bool {
        self.spinning.fetch_add(1, Ordering::Relaxed);

        let result = loop {
            if ready.load(Ordering::Acquire) {
                break true;
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    break false;
                }
            }
            thread::yield_now();
        };

        self.spinning.fetch_sub(1, Ordering::Relaxed);
        result
    }

    fn wake_all(&self, _ready: &AtomicBool) -> WakeResult {
        // Spinners notice the flag on their own
        WakeResult::from_count(self.spinning.load(Ordering::Relaxed))
    }

    fn waiter_count(&self) -> usize {
        self.spinning.load(Ordering::Relaxed)
    }

    fn name(&self) -> &'static str {
        "spin"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_spinwait_timeout() {
        let sw = SpinWait::new();
        let flag = AtomicBool::new(false);
        let start = Instant::now();
        let result = sw.wait_until(&flag, Some(start + Duration::from_millis(50)));

        assert!(!result); // Should timeout
        assert!(start.elapsed() >= Duration::from_millis(50));
        assert_eq!(sw.waiter_count(), 0);
    }

    #[test]
    fn test_spinwait_observes_flag() {
        let sw = Arc::new(SpinWait::new());
        let flag = Arc::new(AtomicBool::new(false));

        let handle = {
            let sw = sw.clone();
            let flag = flag.clone();
            thread::spawn(move || sw.wait_until(&flag, None))
        };

        thread::sleep(Duration::from_millis(20));
        flag.store(true, Ordering::Release);
        sw.wake_all(&flag);

        assert!(handle.join().unwrap());
    }

    #[test]
    fn test_spinwait_already_set() {
        let sw = SpinWait::new();
        let flag = AtomicBool::new(true);
        assert!(sw.wait_until(&flag, Some(Instant::now())));
    }
}
