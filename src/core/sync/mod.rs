/*!
 * Synchronization Primitives
 *
 * Thread-coordination primitives:
 * - `WaitGroup`: owner-restricted fan-out/fan-in counter with deferred
 *   failure aggregation
 * - `Latch` / `Barrier`: one-shot and resettable readiness gates
 *
 * # Architecture
 *
 * Gates share one core parameterized by a `WaitStrategy`:
 * - Spin (busy-poll with yields)
 * - Block (mutex + condvar)
 * - Futex (address-keyed parking, futex syscalls on Linux)
 * - Hybrid (bounded spin, then block)
 *
 * # Use Cases
 *
 * - **Fan-in**: Dispatch N units, block until all report back
 * - **Start gates**: Hold N readers until one writer declares readiness
 * - **Phased work**: Reuse a barrier across cycles with `reset`
 */

mod condvar;
mod config;
mod futex;
mod gate;
mod hybrid;
mod spinwait;
mod traits;
mod wait;
mod wait_group;

pub use config::{StrategyType, SyncConfig, UnknownStrategy, DEFAULT_SPIN_BUDGET, SPIN_BUDGET_ENV, STRATEGY_ENV};
pub use gate::{
    Barrier, BlockBarrier, BlockLatch, FutexBarrier, FutexLatch, Gate, HybridBarrier, HybridLatch,
    Latch, SpinBarrier, SpinLatch,
};
pub use traits::{WaitStrategy, WakeResult};
pub use wait::AnyWait;
pub use wait_group::{WaitGroup, WaitPhase};

// Re-export specific strategies for advanced users
pub use condvar::CondvarWait;
pub use futex::FutexWait;
pub use hybrid::{HybridStats, HybridWait};
pub use spinwait::SpinWait;
