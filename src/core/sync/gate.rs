/*!
 * Readiness Gates
 *
 * N readers block until one writer declares readiness. One core (`Gate`)
 * parameterized by a `WaitStrategy`, exposed as a one-shot `Latch` and a
 * resettable `Barrier`.
 *
 * # Memory Ordering
 *
 * `signal` stores the flag with `Release`; every strategy reads it with
 * `Acquire`. Writes made before `signal` are visible to any thread that
 * returns from `wait`.
 */

use super::condvar::CondvarWait;
use super::config::SyncConfig;
use super::futex::FutexWait;
use super::hybrid::HybridWait;
use super::spinwait::SpinWait;
use super::traits::{WaitStrategy, WakeResult};
use super::wait::AnyWait;
use crate::core::errors::{SyncError, SyncResult};
use std::sync::atomic::{fence, AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Shared gate state: the ready flag, the active-waiter count and the strategy
#[derive(Debug, Default)]
pub struct Gate<S: WaitStrategy> {
    ready: AtomicBool,
    /// Threads currently inside `wait`
    waiters: AtomicUsize,
    strategy: S,
}

impl<S: WaitStrategy> Gate<S> {
    pub const fn with_strategy(strategy: S) -> Self {
        Self {
            ready: AtomicBool::new(false),
            waiters: AtomicUsize::new(0),
            strategy,
        }
    }

    /// Set the flag and wake every blocked waiter
    pub fn signal(&self) -> WakeResult {
        self.ready.store(true, Ordering::Release);
        let result = self.strategy.wake_all(&self.ready);
        trace!(strategy = self.strategy.name(), woken = result.count(), "gate signaled");
        result
    }

    /// Block until signaled
    pub fn wait(&self) {
        self.wait_deadline(None);
    }

    /// Block until signaled or `timeout` elapses
    ///
    /// Returns `true` if the gate was signaled. A timeout too large to
    /// represent as a deadline waits without one.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.wait_deadline(Instant::now().checked_add(timeout))
    }

    fn wait_deadline(&self, deadline: Option<Instant>) -> bool {
        self.waiters.fetch_add(1, Ordering::AcqRel);
        // Pairs with the fence in `clear`: either it sees this waiter or the
        // strategy sees the cleared flag
        fence(Ordering::SeqCst);
        trace!(strategy = self.strategy.name(), "gate wait");
        let ready = self.strategy.wait_until(&self.ready, deadline);
        self.waiters.fetch_sub(1, Ordering::AcqRel);
        trace!(strategy = self.strategy.name(), ready, "gate wait returned");
        ready
    }

    /// Informational only: the answer may be stale by the time it is read
    #[inline]
    pub fn peek_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }

    /// Threads currently inside `wait` (diagnostics only)
    #[inline]
    pub fn waiter_count(&self) -> usize {
        self.waiters.load(Ordering::Acquire)
    }

    #[inline]
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Clear the flag unless a waiter is inside `wait`
    ///
    /// A waiter that arrives between the first check and the clear is
    /// caught by the second check; the flag is restored and the waiter woken.
    fn clear(&self) -> SyncResult<()> {
        const BUSY: SyncError =
            SyncError::PreconditionViolation("cannot reset a gate while threads are waiting on it");

        if self.waiters.load(Ordering::Acquire) != 0 {
            return Err(BUSY);
        }

        let was_ready = self.ready.swap(false, Ordering::AcqRel);
        fence(Ordering::SeqCst);
        if self.waiters.load(Ordering::Relaxed) != 0 {
            if was_ready {
                self.ready.store(true, Ordering::Release);
                self.strategy.wake_all(&self.ready);
            }
            debug!(strategy = self.strategy.name(), "gate reset lost a race with a waiter");
            return Err(BUSY);
        }
        debug!(strategy = self.strategy.name(), "gate reset");
        Ok(())
    }
}

/// One-shot readiness gate
///
/// Once signaled it stays open for good.
///
/// # Examples
///
/// ```
/// use streamline::core::sync::HybridLatch;
/// use std::sync::Arc;
/// use std::thread;
///
/// let latch = Arc::new(HybridLatch::new());
/// let reader = {
///     let latch = latch.clone();
///     thread::spawn(move || latch.wait())
/// };
///
/// latch.signal();
/// reader.join().unwrap();
/// assert!(latch.peek_ready());
/// ```
#[derive(Debug, Default)]
pub struct Latch<S: WaitStrategy = HybridWait> {
    gate: Gate<S>,
}

impl<S: WaitStrategy + Default> Latch<S> {
    pub fn new() -> Self {
        Self::with_strategy(S::default())
    }
}

impl<S: WaitStrategy> Latch<S> {
    pub const fn with_strategy(strategy: S) -> Self {
        Self {
            gate: Gate::with_strategy(strategy),
        }
    }

    #[inline]
    pub fn signal(&self) -> WakeResult {
        self.gate.signal()
    }

    #[inline]
    pub fn wait(&self) {
        self.gate.wait()
    }

    #[inline]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.gate.wait_timeout(timeout)
    }

    #[inline]
    pub fn peek_ready(&self) -> bool {
        self.gate.peek_ready()
    }

    #[inline]
    pub fn waiter_count(&self) -> usize {
        self.gate.waiter_count()
    }

    #[inline]
    pub fn strategy(&self) -> &S {
        self.gate.strategy()
    }
}

impl Latch<AnyWait> {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::with_strategy(AnyWait::from_config(config))
    }
}

impl Latch<HybridWait> {
    pub const fn with_spin_budget(spin_budget: u32) -> Self {
        Self::with_strategy(HybridWait::with_spin_budget(spin_budget))
    }
}

/// Resettable readiness gate
///
/// Cycles between `signal` and `reset`. `reset` requires that no thread is
/// inside `wait`; otherwise a waiter could observe the cleared flag and
/// sleep until the next cycle's signal.
#[derive(Debug, Default)]
pub struct Barrier<S: WaitStrategy = HybridWait> {
    gate: Gate<S>,
}

impl<S: WaitStrategy + Default> Barrier<S> {
    pub fn new() -> Self {
        Self::with_strategy(S::default())
    }
}

impl<S: WaitStrategy> Barrier<S> {
    pub const fn with_strategy(strategy: S) -> Self {
        Self {
            gate: Gate::with_strategy(strategy),
        }
    }

    #[inline]
    pub fn signal(&self) -> WakeResult {
        self.gate.signal()
    }

    #[inline]
    pub fn wait(&self) {
        self.gate.wait()
    }

    #[inline]
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.gate.wait_timeout(timeout)
    }

    /// Clear the flag for a new cycle
    ///
    /// Fails with a precondition violation while any thread is waiting.
    pub fn reset(&self) -> SyncResult<()> {
        self.gate.clear()
    }

    #[inline]
    pub fn peek_ready(&self) -> bool {
        self.gate.peek_ready()
    }

    #[inline]
    pub fn waiter_count(&self) -> usize {
        self.gate.waiter_count()
    }

    #[inline]
    pub fn strategy(&self) -> &S {
        self.gate.strategy()
    }
}

impl Barrier<AnyWait> {
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::with_strategy(AnyWait::from_config(config))
    }
}

impl Barrier<HybridWait> {
    pub const fn with_spin_budget(spin_budget: u32) -> Self {
        Self::with_strategy(HybridWait::with_spin_budget(spin_budget))
    }
}

pub type SpinLatch = Latch<SpinWait>;
pub type BlockLatch = Latch<CondvarWait>;
pub type FutexLatch = Latch<FutexWait>;
pub type HybridLatch = Latch<HybridWait>;

pub type SpinBarrier = Barrier<SpinWait>;
pub type BlockBarrier = Barrier<CondvarWait>;
pub type FutexBarrier = Barrier<FutexWait>;
pub type HybridBarrier = Barrier<HybridWait>;
