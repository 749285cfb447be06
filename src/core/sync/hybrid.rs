/*!
 * Hybrid Spin-Then-Block Strategy
 *
 * Optimized for scenarios where the signal usually lands quickly.
 * Spins for a bounded number of polls before falling back to a condvar.
 */

use super::condvar::CondvarWait;
use super::config::DEFAULT_SPIN_BUDGET;
use super::traits::{WaitStrategy, WakeResult};
use crate::core::errors::{SyncError, SyncResult};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::thread;
use std::time::Instant;
use tracing::debug;

/// Counters describing how hybrid waits were satisfied
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HybridStats {
    /// Waits satisfied during the spin phase
    pub spin_hits: u64,
    /// Waits that engaged the blocking fallback
    pub fallbacks: u64,
}

/// Hybrid spin-then-block wait strategy
///
/// # Performance
///
/// - Ultra-low latency when the signal arrives within the spin budget
/// - Bounded CPU burn: at most `spin_budget` polls before blocking
/// - A spin-phase hit never touches the fallback mutex
///
/// A budget of zero degenerates to the block-only strategy.
#[derive(Debug)]
pub struct HybridWait {
    /// Fallback condvar for long waits
    fallback: CondvarWait,
    /// Maximum polls before falling back
    spin_budget: AtomicU32,
    /// Set once any wait has started; freezes the budget
    engaged: AtomicBool,
    spin_hits: AtomicU64,
    fallbacks: AtomicU64,
}

impl HybridWait {
    /// Create a hybrid strategy with the given spin budget
    pub const fn with_spin_budget(spin_budget: u32) -> Self {
        Self {
            fallback: CondvarWait::new(),
            spin_budget: AtomicU32::new(spin_budget),
            engaged: AtomicBool::new(false),
            spin_hits: AtomicU64::new(0),
            fallbacks: AtomicU64::new(0),
        }
    }

    /// Create with the default budget of 100 polls
    pub const fn new() -> Self {
        Self::with_spin_budget(DEFAULT_SPIN_BUDGET)
    }

    /// Change the spin budget
    ///
    /// Only valid before the first wait; afterwards the budget is fixed and
    /// this fails with a reuse violation.
    pub fn set_spin_budget(&self, spin_budget: u32) -> SyncResult<()> {
        if self.engaged.load(Ordering::Acquire) {
            return Err(SyncError::ReuseViolation(
                "spin budget can only be configured before the first wait",
            ));
        }
        self.spin_budget.store(spin_budget, Ordering::Relaxed);
        Ok(())
    }

    #[inline]
    pub fn spin_budget(&self) -> u32 {
        self.spin_budget.load(Ordering::Relaxed)
    }

    /// Snapshot of the fast-path/fallback counters
    pub fn stats(&self) -> HybridStats {
        HybridStats {
            spin_hits: self.spin_hits.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
        }
    }

    /// Poll the flag up to the budget
    ///
    /// Returns true as soon as the flag is observed set.
    fn spin(&self, ready: &AtomicBool, deadline: Option<Instant>) -> bool {
        let budget = self.spin_budget.load(Ordering::Relaxed);

        for _ in 0..budget {
            if ready.load(Ordering::Acquire) {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            thread::yield_now();
        }
        false
    }
}

impl Default for HybridWait {
    fn default() -> Self {
        Self::new()
    }
}

impl WaitStrategy for HybridWait {
    fn wait_until(&self, ready: &AtomicBool, deadline: Option<Instant>) -> bool {
        self.engaged.store(true, Ordering::Release);

        if self.spin(ready, deadline) {
            self.spin_hits.fetch_add(1, Ordering::Relaxed);
            return true;
        }

        self.fallbacks.fetch_add(1, Ordering::Relaxed);
        debug!(budget = self.spin_budget(), "hybrid wait falling back to condvar");
        self.fallback.wait_until(ready, deadline)
    }

    fn wake_all(&self, ready: &AtomicBool) -> WakeResult {
        // Delegate to fallback; spinners notice the flag on their own
        self.fallback.wake_all(ready)
    }

    fn waiter_count(&self) -> usize {
        self.fallback.waiter_count()
    }

    fn name(&self) -> &'static str {
        "hybrid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_hybrid_fast_path_skips_fallback() {
        let hw = HybridWait::new();
        let flag = AtomicBool::new(true);

        assert!(hw.wait_until(&flag, None));
        assert_eq!(
            hw.stats(),
            HybridStats {
                spin_hits: 1,
                fallbacks: 0
            }
        );
    }

    #[test]
    fn test_zero_budget_always_blocks() {
        let hw = HybridWait::with_spin_budget(0);
        let flag = AtomicBool::new(true);

        assert!(hw.wait_until(&flag, None));
        assert_eq!(hw.stats().fallbacks, 1);
        assert_eq!(hw.stats().spin_hits, 0);
    }

    #[test]
    fn test_hybrid_timeout() {
        let hw = HybridWait::with_spin_budget(10);
        let flag = AtomicBool::new(false);
        let start = Instant::now();
        let result = hw.wait_until(&flag, Some(start + Duration::from_millis(50)));

        assert!(!result); // Should timeout
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn test_hybrid_wakes_blocked_waiter() {
        let hw = Arc::new(HybridWait::with_spin_budget(1));
        let flag = Arc::new(AtomicBool::new(false));

        let handle = {
            let hw = hw.clone();
            let flag = flag.clone();
            thread::spawn(move || hw.wait_until(&flag, None))
        };

        while hw.waiter_count() == 0 {
            thread::sleep(Duration::from_millis(5));
        }
        flag.store(true, Ordering::Release);
        assert_eq!(hw.wake_all(&flag), WakeResult::Woken(1));

        assert!(handle.join().unwrap());
        assert_eq!(hw.stats().fallbacks, 1);
    }

    #[test]
    fn test_budget_frozen_after_first_wait() {
        let hw = HybridWait::new();
        hw.set_spin_budget(5).unwrap();
        assert_eq!(hw.spin_budget(), 5);

        let flag = AtomicBool::new(true);
        hw.wait_until(&flag, None);

        assert!(matches!(
            hw.set_spin_budget(50),
            Err(SyncError::ReuseViolation(_))
        ));
        assert_eq!(hw.spin_budget(), 5);
    }
}
