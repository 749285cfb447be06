/*!
 * StreamLine Library
 * Thread-coordination primitives: WaitGroup and readiness gates
 */

pub mod core;
pub mod monitoring;

// Re-exports
pub use crate::core::errors::{AggregateFailure, Failure, SyncError, SyncResult};
pub use crate::core::sync::{
    Barrier, BlockBarrier, BlockLatch, HybridBarrier, HybridLatch, Latch, SpinBarrier, SpinLatch,
    StrategyType, SyncConfig, WaitGroup, WaitPhase, WaitStrategy,
};
pub use monitoring::init_tracing;
