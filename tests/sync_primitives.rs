/*!
 * Synchronization Primitives Integration Tests
 *
 * Readiness gates across spin, block, futex and hybrid strategies
 */

use pretty_assertions::assert_eq;
use streamline::core::sync::{
    AnyWait, BlockBarrier, BlockLatch, FutexLatch, HybridBarrier, HybridLatch, HybridStats, Latch,
    SpinBarrier, SpinLatch, StrategyType, SyncConfig, WaitStrategy,
};
use streamline::SyncError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn wait_for_waiters(count: impl Fn() -> usize, expected: usize) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while count() < expected {
        assert!(Instant::now() < deadline, "waiters never arrived");
        thread::sleep(Duration::from_millis(2));
    }
}

#[test]
fn test_futex_single_waiter() {
    let latch = Arc::new(FutexLatch::new());
    let latch_clone = latch.clone();

    let handle = thread::spawn(move || {
        let start = Instant::now();
        latch_clone.wait();
        start.elapsed()
    });

    wait_for_waiters(|| latch.waiter_count(), 1);
    latch.signal();

    let elapsed = handle.join().unwrap();
    // Should wake quickly
    assert!(elapsed < Duration::from_secs(5));
}

#[test]
fn test_block_latch_multiple_waiters() {
    let latch = Arc::new(BlockLatch::new());

    let handles: Vec<_> = (0..5)
        .map(|_| {
            let latch = latch.clone();
            thread::spawn(move || latch.wait_timeout(Duration::from_secs(5)))
        })
        .collect();

    wait_for_waiters(|| latch.strategy().waiter_count(), 5);

    let result = latch.signal();
    assert_eq!(result.count(), 5);

    for handle in handles {
        assert!(handle.join().unwrap(), "Thread should be woken");
    }
}

#[test]
fn test_spin_latch_low_latency() {
    let latch = Arc::new(SpinLatch::new());
    let latch_clone = latch.clone();

    let handle = thread::spawn(move || latch_clone.wait_timeout(Duration::from_secs(5)));

    thread::sleep(Duration::from_millis(10));
    latch.signal();

    assert!(handle.join().unwrap());
}

#[test]
fn test_timeout_behavior() {
    for config in [
        SyncConfig { strategy: StrategyType::Spin, ..Default::default() },
        SyncConfig { strategy: StrategyType::Block, ..Default::default() },
        SyncConfig { strategy: StrategyType::Futex, ..Default::default() },
        SyncConfig { strategy: StrategyType::Hybrid, ..Default::default() },
    ] {
        let latch = Latch::<AnyWait>::from_config(&config);
        let start = Instant::now();

        assert!(!latch.wait_timeout(Duration::from_millis(40)));
        assert!(
            start.elapsed() >= Duration::from_millis(40),
            "{} returned early",
            latch.strategy().name()
        );
        assert_eq!(latch.waiter_count(), 0);
    }
}

#[test]
fn test_signal_before_wait_never_lost() {
    for strategy in [StrategyType::Spin, StrategyType::Block, StrategyType::Futex, StrategyType::Hybrid] {
        let latch = Arc::new(Latch::<AnyWait>::from_config(&SyncConfig {
            strategy,
            ..Default::default()
        }));

        latch.signal();

        let latch_clone = latch.clone();
        let handle = thread::spawn(move || latch_clone.wait_timeout(Duration::from_secs(5)));
        assert!(handle.join().unwrap(), "{:?} lost an early signal", strategy);
    }
}

#[test]
fn test_signal_publishes_writes() {
    let latch = Arc::new(HybridLatch::with_spin_budget(0));
    let payload = Arc::new(AtomicU64::new(0));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let latch = latch.clone();
            let payload = payload.clone();
            thread::spawn(move || {
                latch.wait();
                payload.load(Ordering::Relaxed)
            })
        })
        .collect();

    payload.store(0xfeed, Ordering::Relaxed);
    latch.signal();

    for reader in readers {
        assert_eq!(reader.join().unwrap(), 0xfeed);
    }
}

#[test]
fn test_hybrid_signal_first_skips_fallback() {
    let latch = HybridLatch::new();
    latch.signal();

    for _ in 0..10 {
        latch.wait();
    }

    assert_eq!(
        latch.strategy().stats(),
        HybridStats {
            spin_hits: 10,
            fallbacks: 0
        }
    );
}

#[test]
fn test_hybrid_zero_budget_behaves_like_block() {
    let hybrid = Arc::new(HybridLatch::with_spin_budget(0));
    let handle = {
        let hybrid = hybrid.clone();
        thread::spawn(move || hybrid.wait_timeout(Duration::from_secs(5)))
    };

    wait_for_waiters(|| hybrid.strategy().waiter_count(), 1);
    assert_eq!(hybrid.signal().count(), 1);
    assert!(handle.join().unwrap());

    hybrid.wait();
    assert_eq!(hybrid.strategy().stats().spin_hits, 0);
    assert_eq!(hybrid.strategy().stats().fallbacks, 2);
}

#[test]
fn test_hybrid_budget_configurable_before_first_wait() {
    let latch = HybridLatch::new();
    assert_eq!(latch.strategy().spin_budget(), 100);
    latch.strategy().set_spin_budget(3).unwrap();

    latch.signal();
    latch.wait();

    assert!(matches!(
        latch.strategy().set_spin_budget(0),
        Err(SyncError::ReuseViolation(_))
    ));
}

#[test]
fn test_barrier_cycles_with_many_waiters() {
    fn cycle<S: WaitStrategy + 'static>(barrier: Arc<streamline::core::sync::Barrier<S>>) {
        for round in 0..3 {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    let barrier = barrier.clone();
                    thread::spawn(move || barrier.wait_timeout(Duration::from_secs(5)))
                })
                .collect();

            thread::sleep(Duration::from_millis(5));
            barrier.signal();

            for handle in handles {
                assert!(handle.join().unwrap(), "round {} waiter timed out", round);
            }
            barrier.reset().unwrap();
            assert!(!barrier.peek_ready());
        }
    }

    cycle(Arc::new(SpinBarrier::new()));
    cycle(Arc::new(BlockBarrier::new()));
    cycle(Arc::new(HybridBarrier::new()));
}

#[test]
fn test_barrier_reset_requires_quiescence() {
    let barrier = Arc::new(HybridBarrier::with_spin_budget(0));
    let handle = {
        let barrier = barrier.clone();
        thread::spawn(move || barrier.wait())
    };

    wait_for_waiters(|| barrier.waiter_count(), 1);
    let err = barrier.reset().unwrap_err();
    assert!(matches!(err, SyncError::PreconditionViolation(_)));

    barrier.signal();
    handle.join().unwrap();
    barrier.reset().unwrap();

    // A fresh cycle blocks again until the next signal
    assert!(!barrier.wait_timeout(Duration::from_millis(20)));
}

#[test]
fn test_strategy_auto_selection() {
    let latch = Latch::<AnyWait>::from_config(&SyncConfig::default());
    assert_eq!(latch.strategy().name(), "hybrid");
    assert_eq!(
        latch.strategy().as_hybrid().map(|h| h.spin_budget()),
        Some(100)
    );
}
