/*!
 * Synchronization Traits
 *
 * Core abstraction for waiting on a readiness flag.
 *
 * # Design: Trait-Based Wait Strategies
 *
 * Gates own the flag; strategies only decide *how* a thread waits for it to
 * flip. `AnyWait` enum-dispatches over the built-in strategies, while the
 * trait keeps the door open for custom ones (and instrumented test doubles).
 */

use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// Result of a wake operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeResult {
    /// Successfully woke N waiters (N >= 1)
    Woken(usize),
    /// No waiters were blocked
    NoWaiters,
}

impl WakeResult {
    /// Check if any waiters were woken
    #[inline(always)]
    pub fn is_woken(&self) -> bool {
        matches!(self, WakeResult::Woken(_))
    }

    /// Get number of woken waiters (0 if none)
    #[inline(always)]
    pub fn count(&self) -> usize {
        match self {
            WakeResult::Woken(n) => *n,
            WakeResult::NoWaiters => 0,
        }
    }

    pub(crate) fn from_count(n: usize) -> Self {
        if n == 0 {
            WakeResult::NoWaiters
        } else {
            WakeResult::Woken(n)
        }
    }
}

/// Strategy for waiting until a readiness flag is set
///
/// Implementations must be:
/// - **Thread-safe**: Safe to call from multiple threads
/// - **Lossless**: A `wake_all` issued after the flag was stored must never
///   leave a waiter blocked; the predicate is re-checked wherever the
///   implementation synchronizes with `wake_all`
///
/// The flag is always read with `Acquire` and written by the owner of the
/// flag with `Release`, so a successful wait observes every write made before
/// the flag was set.
pub trait WaitStrategy: Send + Sync {
    /// Wait until `ready` reads true or `deadline` passes
    ///
    /// Returns `true` if the flag was observed set, `false` on timeout.
    fn wait_until(&self, ready: &AtomicBool, deadline: Option<Instant>) -> bool;

    /// Wake every thread blocked on `ready`
    ///
    /// Called after the flag has been stored.
    fn wake_all(&self, ready: &AtomicBool) -> WakeResult;

    /// Get approximate count of blocked waiters (for diagnostics)
    fn waiter_count(&self) -> usize {
        0 // Default: unknown
    }

    /// Get strategy name for debugging
    fn name(&self) -> &'static str;
}
