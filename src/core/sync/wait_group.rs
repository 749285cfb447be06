/*!
 * WaitGroup
 *
 * Owner-restricted fan-out/fan-in counter with deferred failure aggregation.
 *
 * # Ownership
 *
 * The creating thread (or the thread that took the group over through
 * `transfer`) is the only one allowed to `add`, `wait`, `wait_for` and
 * `reset`. `done` is open to every other thread: fan-in is multi-writer.
 *
 * # Memory Ordering
 *
 * Each `done` decrements with `AcqRel` and the owner observes zero with
 * `Acquire`, so everything a worker wrote before `done` is visible to the
 * owner once `wait` returns.
 *
 * # Cycle
 *
 * `Idle -> Waiting -> Waited`, back to `Idle` through `reset`. A timed-out
 * `wait_for` parks the cycle in `TimedOut`: waiting may be retried, adding
 * work may not. `transfer` leaves the source `Inert`.
 */

use super::config::SyncConfig;
use crate::core::errors::{AggregateFailure, Failure, SyncError, SyncResult};
use parking_lot::lock_api::{Mutex, RawMutex};
use parking_lot_core::{park, unpark_all, ParkResult, ParkToken, DEFAULT_UNPARK_TOKEN};
use std::fmt;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};
use tracing::{debug, instrument, trace, warn};

const IDLE: u8 = 0;
const WAITING: u8 = 1;
const WAITED: u8 = 2;
const TIMED_OUT: u8 = 3;
const INERT: u8 = 4;

/// Where a WaitGroup is in its cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPhase {
    /// Accepting work; nobody has waited yet
    Idle,
    /// The owner is blocked in `wait`/`wait_for`
    Waiting,
    /// A wait completed; `reset` starts a new cycle
    Waited,
    /// `wait_for` timed out; waiting may be retried
    TimedOut,
    /// State moved to another instance by `transfer`
    Inert,
}

impl WaitPhase {
    fn from_raw(raw: u8) -> Self {
        match raw {
            IDLE => WaitPhase::Idle,
            WAITING => WaitPhase::Waiting,
            WAITED => WaitPhase::Waited,
            TIMED_OUT => WaitPhase::TimedOut,
            _ => WaitPhase::Inert,
        }
    }
}

/// Owner-restricted fan-out/fan-in counter
///
/// `R` is the lock protecting the failure log; any `lock_api::RawMutex`
/// works, parking_lot's by default.
///
/// # Examples
///
/// ```
/// use streamline::core::sync::WaitGroup;
/// use streamline::core::Failure;
/// use std::thread;
///
/// let wg = WaitGroup::new();
/// wg.add(2).unwrap();
///
/// thread::scope(|s| {
///     s.spawn(|| wg.done());
///     s.spawn(|| wg.done_with(Failure::msg("disk full")));
/// });
///
/// let err = wg.wait().unwrap_err();
/// assert_eq!(err.aggregate().unwrap().len(), 1);
/// assert_eq!(wg.count(), 0);
/// ```
pub struct WaitGroup<R: RawMutex = parking_lot::RawMutex> {
    /// Outstanding units; also the parking key
    count: AtomicUsize,
    /// Counter value after the most recent `add`
    snapshot: AtomicUsize,
    /// One-shot guard and cycle phase
    phase: AtomicU8,
    owner: ThreadId,
    /// Polls of the counter before parking
    spin_budget: u32,
    failures: Mutex<R, Vec<Failure>>,
}

impl WaitGroup {
    /// Create a WaitGroup owned by the calling thread
    pub fn new() -> Self {
        Self::with_lock(&SyncConfig::default())
    }

    /// Create with a custom spin budget for `wait`
    pub fn with_config(config: &SyncConfig) -> Self {
        Self::with_lock(config)
    }
}

impl Default for WaitGroup {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RawMutex> WaitGroup<R> {
    /// Create with an explicit failure-log lock type
    pub fn with_lock(config: &SyncConfig) -> Self {
        Self {
            count: AtomicUsize::new(0),
            snapshot: AtomicUsize::new(0),
            phase: AtomicU8::new(IDLE),
            owner: thread::current().id(),
            spin_budget: config.spin_budget,
            failures: Mutex::new(Vec::new()),
        }
    }

    /// Register `n` units of work
    ///
    /// Owner only, and only before this cycle's wait has begun. On error the
    /// counter is left unchanged, including when `n` would overflow it.
    pub fn add(&self, n: usize) -> SyncResult<()> {
        self.check_owner("add")?;

        match self.phase.load(Ordering::Acquire) {
            IDLE => {}
            INERT => return Err(SyncError::ReuseViolation("WaitGroup was transferred to another owner")),
            _ => return Err(SyncError::ReuseViolation("cannot add work after waiting has begun")),
        }

        let total = match self
            .count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_add(n))
        {
            Ok(previous) => previous + n,
            Err(outstanding) => {
                warn!(added = n, outstanding, "WaitGroup add would overflow");
                return Err(SyncError::PreconditionViolation(
                    "adding work would overflow the counter",
                ));
            }
        };
        self.snapshot.store(total, Ordering::Release);
        trace!(added = n, outstanding = total, "WaitGroup add");
        Ok(())
    }

    /// Mark one unit complete
    ///
    /// Never fails. Calls from the owner thread, calls beyond the
    /// outstanding count and calls on a transferred group are ignored with a
    /// warning.
    #[inline]
    pub fn done(&self) {
        self.complete(None);
    }

    /// Mark one unit complete, recording its failure for the owner
    ///
    /// The failure is re-surfaced by `wait`/`wait_for` on the owner thread,
    /// never on the caller's.
    #[inline]
    pub fn done_with(&self, failure: Failure) {
        self.complete(Some(failure));
    }

    fn complete(&self, failure: Option<Failure>) {
        if thread::current().id() == self.owner {
            warn!(has_failure = failure.is_some(), "done() called from the owner thread; ignoring");
            return;
        }
        if self.phase.load(Ordering::Acquire) == INERT {
            warn!(has_failure = failure.is_some(), "done() called on a transferred WaitGroup; ignoring");
            return;
        }

        let result = match failure {
            // The log stays locked across the decrement, so an owner that sees
            // zero cannot collect failures before this one is pushed
            Some(failure) => {
                let mut log = self.failures.lock();
                let result = self.decrement();
                if result.is_ok() {
                    debug!(error = %failure, "worker reported failure");
                    log.push(failure);
                } else {
                    warn!(error = %failure, "dropping failure from an uncounted done()");
                }
                result
            }
            None => self.decrement(),
        };

        match result {
            Ok(1) => self.wake_owner(),
            Ok(previous) => trace!(outstanding = previous - 1, "WaitGroup done"),
            Err(_) => warn!("done() called more times than work was added; ignoring"),
        }
    }

    #[inline]
    fn decrement(&self) -> Result<usize, usize> {
        self.count
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| c.checked_sub(1))
    }

    fn wake_owner(&self) {
        // SAFETY: the key is only used as an address in the parking table.
        let woken = unsafe { unpark_all(self.key(), DEFAULT_UNPARK_TOKEN) };
        trace!(woken, "WaitGroup drained");
    }

    /// Block until every unit is done
    ///
    /// One-shot per cycle. Returns `AggregateFailure` if any worker reported
    /// a failure; the wait itself still completed.
    pub fn wait(&self) -> SyncResult<()> {
        self.check_owner("wait")?;
        self.begin_wait()?;

        self.block_until_drained(None);
        self.phase.store(WAITED, Ordering::Release);
        self.collect_failures()
    }

    /// Block until every unit is done or `timeout` elapses
    ///
    /// `Ok(true)` when drained in time, `Ok(false)` on timeout. A timeout
    /// releases the one-shot guard so a later `wait`/`wait_for` may retry,
    /// while `add` stays forbidden for the rest of the cycle. A timeout too
    /// large to represent as a deadline waits without one.
    pub fn wait_for(&self, timeout: Duration) -> SyncResult<bool> {
        self.check_owner("wait_for")?;
        let deadline = Instant::now().checked_add(timeout);
        self.begin_wait()?;

        if !self.block_until_drained(deadline) {
            self.phase.store(TIMED_OUT, Ordering::Release);
            debug!(
                timeout_ms = timeout.as_millis() as u64,
                outstanding = self.count(),
                "WaitGroup wait timed out"
            );
            return Ok(false);
        }

        self.phase.store(WAITED, Ordering::Release);
        self.collect_failures().map(|()| true)
    }

    /// Take the one-shot guard
    fn begin_wait(&self) -> SyncResult<()> {
        let mut current = self.phase.load(Ordering::Acquire);
        loop {
            match current {
                IDLE | TIMED_OUT => {
                    match self.phase.compare_exchange_weak(
                        current,
                        WAITING,
                        Ordering::AcqRel,
                        Ordering::Acquire,
                    ) {
                        Ok(_) => return Ok(()),
                        Err(actual) => current = actual,
                    }
                }
                INERT => {
                    return Err(SyncError::ReuseViolation("WaitGroup was transferred to another owner"))
                }
                _ => {
                    return Err(SyncError::ReuseViolation(
                        "WaitGroup can only be waited on once per cycle",
                    ))
                }
            }
        }
    }

    /// Spin for the budget, then park on the counter address
    fn block_until_drained(&self, deadline: Option<Instant>) -> bool {
        for _ in 0..self.spin_budget {
            if self.count.load(Ordering::Acquire) == 0 {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            thread::yield_now();
        }

        loop {
            if self.count.load(Ordering::Acquire) == 0 {
                return true;
            }

            // SAFETY: the callbacks don't panic or re-enter parking_lot_core;
            // validate re-checks the counter under the bucket lock, which
            // `unpark_all` also takes, so the final decrement cannot be missed.
            let result = unsafe {
                park(
                    self.key(),
                    || self.count.load(Ordering::Acquire) != 0,
                    || {},
                    |_, _| {},
                    ParkToken(0),
                    deadline,
                )
            };

            if matches!(result, ParkResult::TimedOut) {
                return self.count.load(Ordering::Acquire) == 0;
            }
        }
    }

    fn collect_failures(&self) -> SyncResult<()> {
        let failures = self.failures.lock();
        if failures.is_empty() {
            Ok(())
        } else {
            Err(SyncError::AggregateFailure(AggregateFailure::new(failures.clone())))
        }
    }

    /// Start a new cycle
    ///
    /// Valid only once the counter reads zero and no wait is in progress.
    /// Restores the counter to the last `add` snapshot and clears the
    /// one-shot guard and the failure log.
    pub fn reset(&self) -> SyncResult<()> {
        self.check_owner("reset")?;

        let phase = self.phase.load(Ordering::Acquire);
        match phase {
            WAITING => return Err(SyncError::PreconditionViolation("a wait is in progress")),
            INERT => return Err(SyncError::PreconditionViolation("WaitGroup was transferred to another owner")),
            _ => {}
        }
        if self.count.load(Ordering::Acquire) != 0 {
            return Err(SyncError::PreconditionViolation(
                "the prior cycle has not drained to zero",
            ));
        }
        if self
            .phase
            .compare_exchange(phase, IDLE, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(SyncError::PreconditionViolation("WaitGroup changed state during reset"));
        }

        let snapshot = self.snapshot.load(Ordering::Acquire);
        self.count.store(snapshot, Ordering::Release);
        self.failures.lock().clear();
        debug!(restored = snapshot, "WaitGroup reset");
        Ok(())
    }

    /// Take over `source` on the calling thread
    ///
    /// Counter, snapshot, failure log and cycle phase move to the returned
    /// instance; `source` is left inert. Fails while the source's owner is
    /// waiting, and while any unit is outstanding: workers dispatched against
    /// `source` still hold it and their `done` calls must land there.
    #[instrument(level = "debug", skip(source), fields(from = ?source.owner))]
    pub fn transfer(source: &WaitGroup<R>) -> SyncResult<WaitGroup<R>> {
        let mut current = source.phase.load(Ordering::Acquire);
        loop {
            match current {
                WAITING => {
                    return Err(SyncError::ReuseViolation(
                        "cannot transfer a WaitGroup while its owner is waiting",
                    ))
                }
                INERT => return Err(SyncError::ReuseViolation("WaitGroup has already been transferred")),
                _ if source.count.load(Ordering::Acquire) != 0 => {
                    return Err(SyncError::PreconditionViolation(
                        "cannot transfer a WaitGroup with outstanding work",
                    ))
                }
                _ => match source.phase.compare_exchange_weak(
                    current,
                    INERT,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                ) {
                    Ok(_) => break,
                    Err(actual) => current = actual,
                },
            }
        }

        let count = source.count.swap(0, Ordering::AcqRel);
        let snapshot = source.snapshot.load(Ordering::Acquire);
        let failures = std::mem::take(&mut *source.failures.lock());
        debug!(count, snapshot, "WaitGroup transferred");

        Ok(WaitGroup {
            count: AtomicUsize::new(count),
            snapshot: AtomicUsize::new(snapshot),
            phase: AtomicU8::new(current),
            owner: thread::current().id(),
            spin_budget: source.spin_budget,
            failures: Mutex::new(failures),
        })
    }

    /// Outstanding units (diagnostics only; stale while workers run)
    #[inline]
    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    /// Counter value recorded by the most recent `add`
    #[inline]
    pub fn snapshot(&self) -> usize {
        self.snapshot.load(Ordering::Acquire)
    }

    /// Current cycle phase
    #[inline]
    pub fn phase(&self) -> WaitPhase {
        WaitPhase::from_raw(self.phase.load(Ordering::Acquire))
    }

    /// Thread allowed to add, wait and reset
    #[inline]
    pub fn owner(&self) -> ThreadId {
        self.owner
    }

    /// Whether the state has been moved out by `transfer`
    #[inline]
    pub fn is_inert(&self) -> bool {
        self.phase() == WaitPhase::Inert
    }

    /// Whether any worker reported a failure this cycle
    pub fn has_failures(&self) -> bool {
        !self.failures.lock().is_empty()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().len()
    }

    fn check_owner(&self, operation: &'static str) -> SyncResult<()> {
        if thread::current().id() != self.owner {
            return Err(SyncError::ownership(operation, self.owner));
        }
        Ok(())
    }

    #[inline]
    fn key(&self) -> usize {
        &self.count as *const AtomicUsize as usize
    }
}

impl<R: RawMutex> fmt::Debug for WaitGroup<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitGroup")
            .field("count", &self.count())
            .field("snapshot", &self.snapshot())
            .field("phase", &self.phase())
            .field("owner", &self.owner)
            .field("failures", &self.failure_count())
            .finish()
    }
}
