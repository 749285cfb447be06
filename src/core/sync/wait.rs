/*!
 * Configured Wait Strategy
 *
 * Selects a strategy from `SyncConfig` at creation time.
 *
 * # Design: Enum Dispatch for Zero-Cost Abstraction
 *
 * Instead of `Arc<dyn WaitStrategy>`, the built-in strategies are wrapped in
 * an enum so the hot path is a match plus a direct call that can inline.
 */

use super::condvar::CondvarWait;
use super::config::{StrategyType, SyncConfig};
use super::futex::FutexWait;
use super::hybrid::HybridWait;
use super::spinwait::SpinWait;
use super::traits::{WaitStrategy, WakeResult};
use std::sync::atomic::AtomicBool;
use std::time::Instant;

/// Wait strategy chosen at runtime
#[derive(Debug)]
pub enum AnyWait {
    Spin(SpinWait),
    Block(CondvarWait),
    Futex(FutexWait),
    Hybrid(HybridWait),
}

impl AnyWait {
    /// Build the strategy the configuration asks for
    pub fn from_config(config: &SyncConfig) -> Self {
        match config.select_strategy() {
            StrategyType::Spin => Self::Spin(SpinWait::new()),
            StrategyType::Block => Self::Block(CondvarWait::new()),
            StrategyType::Futex => Self::Futex(FutexWait::new()),
            StrategyType::Hybrid | StrategyType::Auto => {
                Self::Hybrid(HybridWait::with_spin_budget(config.spin_budget))
            }
        }
    }

    /// The hybrid strategy, if that is what was selected
    pub fn as_hybrid(&self) -> Option<&HybridWait> {
        match self {
            Self::Hybrid(s) => Some(s),
            _ => None,
        }
    }
}

impl Default for AnyWait {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl WaitStrategy for AnyWait {
    #[inline(always)]
    fn wait_until(&self, ready: &AtomicBool, deadline: Option<Instant>) -> bool {
        match self {
            Self::Spin(s) => s.wait_until(ready, deadline),
            Self::Block(s) => s.wait_until(ready, deadline),
            Self::Futex(s) => s.wait_until(ready, deadline),
            Self::Hybrid(s) => s.wait_until(ready, deadline),
        }
    }

    #[inline(always)]
    fn wake_all(&self, ready: &AtomicBool) -> WakeResult {
        match self {
            Self::Spin(s) => s.wake_all(ready),
            Self::Block(s) => s.wake_all(ready),
            Self::Futex(s) => s.wake_all(ready),
            Self::Hybrid(s) => s.wake_all(ready),
        }
    }

    fn waiter_count(&self) -> usize {
        match self {
            Self::Spin(s) => s.waiter_count(),
            Self::Block(s) => s.waiter_count(),
            Self::Futex(s) => s.waiter_count(),
            Self::Hybrid(s) => s.waiter_count(),
        }
    }

    fn name(&self) -> &'static str {
        match self {
            Self::Spin(s) => s.name(),
            Self::Block(s) => s.name(),
            Self::Futex(s) => s.name(),
            Self::Hybrid(s) => s.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strategy_selection() {
        for (strategy, name) in [
            (StrategyType::Spin, "spin"),
            (StrategyType::Block, "block"),
            (StrategyType::Futex, "futex"),
            (StrategyType::Hybrid, "hybrid"),
            (StrategyType::Auto, "hybrid"),
        ] {
            let config = SyncConfig {
                strategy,
                ..Default::default()
            };
            assert_eq!(AnyWait::from_config(&config).name(), name);
        }
    }

    #[test]
    fn test_budget_forwarded_to_hybrid() {
        let wait = AnyWait::from_config(&SyncConfig::low_latency());
        assert_eq!(wait.as_hybrid().map(|h| h.spin_budget()), Some(1_000));
        assert!(AnyWait::from_config(&SyncConfig::long_wait()).as_hybrid().is_none());
    }
}
