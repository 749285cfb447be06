/*!
 * Futex-Based Wait Strategy
 *
 * Uses parking_lot_core for futex-like operations on all platforms.
 * On Linux, this maps directly to futex syscalls for minimal overhead.
 *
 * # Design
 *
 * The parking address is the readiness flag itself, so no allocation or
 * per-key table is needed. parking_lot_core runs the validate callback with
 * the bucket lock held, and `unpark_all` takes the same lock: a flag stored
 * before `wake_all` is either seen by validate (no park) or the parked thread
 * is found and woken.
 */

use super::traits::{WaitStrategy, WakeResult};
use parking_lot_core::{park, unpark_all, ParkResult, ParkToken, DEFAULT_UNPARK_TOKEN};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

/// Futex-based wait strategy keyed on the flag address
///
/// # Performance
///
/// - Zero allocations
/// - Direct futex syscalls on Linux
/// - Lock-free fast path when the flag is already set
#[derive(Debug, Default)]
pub struct FutexWait {
    /// Threads currently parked (diagnostics only)
    parked: AtomicUsize,
}

impl FutexWait {
    /// Create a new futex-based wait strategy
    pub const fn new() -> Self {
        Self {
            parked: AtomicUsize::new(0),
        }
    }

    #[inline]
    fn key(ready: &AtomicBool) -> usize {
        ready as *const AtomicBool as usize
    }
}

impl WaitStrategy for FutexWait {
    fn wait_until(&self, ready: &AtomicBool, deadline: Option<Instant>) -> bool {
        let addr = Self::key(ready);

        loop {
            if ready.load(Ordering::Acquire) {
                return true;
            }

            self.parked.fetch_add(1, Ordering::Relaxed);
            // SAFETY: the validate and timeout callbacks don't panic or call
            // back into parking_lot_core, and the key is a live address.
            let result = unsafe {
                park(
                    addr,
                    || !ready.load(Ordering::Acquire),
                    || {},
                    |_, _| {},
                    ParkToken(0),
                    deadline,
                )
            };
            self.parked.fetch_sub(1, Ordering::Relaxed);

            match result {
                ParkResult::Unparked(_) | ParkResult::Invalid => continue,
                ParkResult::TimedOut => return ready.load(Ordering::Acquire),
            }
        }
    }

    fn wake_all(&self, ready: &AtomicBool) -> WakeResult {
        // SAFETY: unpark_all only uses the address as a key.
        let unparked = unsafe { unpark_all(Self::key(ready), DEFAULT_UNPARK_TOKEN) };
        WakeResult::from_count(unparked)
    }

    fn waiter_count(&self) -> usize {
        self.parked.load(Ordering::Relaxed)
    }

    fn name(&self) -> &'static str {
        "futex"
    }
}
