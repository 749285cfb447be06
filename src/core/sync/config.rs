/*!
 * Synchronization Configuration
 *
 * Runtime configuration for wait strategy selection
 */

use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Default number of polls the hybrid strategy performs before blocking
pub const DEFAULT_SPIN_BUDGET: u32 = 100;

/// Environment variable selecting the wait strategy
pub const STRATEGY_ENV: &str = "STREAMLINE_SYNC_STRATEGY";

/// Environment variable overriding the spin budget
pub const SPIN_BUDGET_ENV: &str = "STREAMLINE_SPIN_BUDGET";

/// Strategy type selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyType {
    /// Busy-poll with yields, never blocks in the kernel
    Spin,
    /// Mutex + condition variable, blocks immediately
    Block,
    /// Address-keyed parking (futex on Linux)
    Futex,
    /// Spin for the budget, then block
    Hybrid,
    /// Pick a sensible default
    Auto,
}

impl StrategyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::Spin => "spin",
            StrategyType::Block => "block",
            StrategyType::Futex => "futex",
            StrategyType::Hybrid => "hybrid",
            StrategyType::Auto => "auto",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized strategy name
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown wait strategy: {0}")]
pub struct UnknownStrategy(pub String);

impl FromStr for StrategyType {
    type Err = UnknownStrategy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spin" => Ok(StrategyType::Spin),
            "block" | "condvar" => Ok(StrategyType::Block),
            "futex" | "park" => Ok(StrategyType::Futex),
            "hybrid" => Ok(StrategyType::Hybrid),
            "auto" => Ok(StrategyType::Auto),
            other => Err(UnknownStrategy(other.to_string())),
        }
    }
}

/// Synchronization configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Preferred strategy
    pub strategy: StrategyType,
    /// Polls performed before falling back to a blocking wait
    pub spin_budget: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyType::Auto,
            spin_budget: DEFAULT_SPIN_BUDGET,
        }
    }
}

impl SyncConfig {
    /// Configuration optimized for low-latency (signal expected within microseconds)
    pub const fn low_latency() -> Self {
        Self {
            strategy: StrategyType::Hybrid,
            spin_budget: 1_000,
        }
    }

    /// Configuration optimized for long waits (> 1ms expected)
    pub const fn long_wait() -> Self {
        Self {
            strategy: StrategyType::Block,
            spin_budget: 0,
        }
    }

    /// Builder-style override of the spin budget
    pub const fn with_spin_budget(mut self, spin_budget: u32) -> Self {
        self.spin_budget = spin_budget;
        self
    }

    /// Load from environment, falling back to defaults on missing or invalid values
    ///
    /// Environment variables:
    /// - STREAMLINE_SYNC_STRATEGY: spin | block | futex | hybrid | auto
    /// - STREAMLINE_SPIN_BUDGET: non-negative integer (default: 100)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(STRATEGY_ENV) {
            match raw.parse::<StrategyType>() {
                Ok(strategy) => config.strategy = strategy,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring {}", STRATEGY_ENV),
            }
        }

        if let Some(raw) = lookup(SPIN_BUDGET_ENV) {
            match raw.trim().parse::<u32>() {
                Ok(budget) => config.spin_budget = budget,
                Err(e) => warn!(value = %raw, error = %e, "Ignoring {}", SPIN_BUDGET_ENV),
            }
        }

        config
    }

    /// Resolve `Auto` to a concrete strategy
    pub fn select_strategy(&self) -> StrategyType {
        match self.strategy {
            StrategyType::Auto => StrategyType::Hybrid,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = SyncConfig::default();
        assert_eq!(config.spin_budget, 100);
        assert_eq!(config.select_strategy(), StrategyType::Hybrid);
    }

    #[test]
    fn test_parse_strategy() {
        assert_eq!("SPIN".parse::<StrategyType>(), Ok(StrategyType::Spin));
        assert_eq!(" condvar ".parse::<StrategyType>(), Ok(StrategyType::Block));
        assert!("turbo".parse::<StrategyType>().is_err());
    }

    #[test]
    fn test_from_lookup() {
        let config = SyncConfig::from_lookup(lookup(&[
            (STRATEGY_ENV, "futex"),
            (SPIN_BUDGET_ENV, "0"),
        ]));
        assert_eq!(config.strategy, StrategyType::Futex);
        assert_eq!(config.spin_budget, 0);
    }

    #[test]
    fn test_invalid_env_keeps_defaults() {
        let config = SyncConfig::from_lookup(lookup(&[
            (STRATEGY_ENV, "warp"),
            (SPIN_BUDGET_ENV, "-3"),
        ]));
        assert_eq!(config, SyncConfig::default());
    }
}
