/*!
 * StreamLine - Demo Driver
 *
 * Runs two fan-out/fan-in cycles on one WaitGroup:
 * - Workers are held behind a start latch until the owner opens it
 * - Some workers report failures, which surface on the owner after fan-in
 * - The group is reset and replayed with the same unit count
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use tracing::{info, warn};

use streamline::core::sync::AnyWait;
use streamline::{init_tracing, Failure, Latch, SyncConfig, SyncError, WaitGroup};

/// Environment variable overriding the number of workers
const WORKERS_ENV: &str = "STREAMLINE_WORKERS";

#[derive(Debug, thiserror::Error)]
#[error("worker {worker} rejected checksum {checksum:#x}")]
struct ChecksumRejected {
    worker: usize,
    checksum: u64,
}

fn worker_count() -> usize {
    std::env::var(WORKERS_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .filter(|&n| n > 0)
        .unwrap_or_else(|| thread::available_parallelism().map(|n| n.get()).unwrap_or(4))
}

fn checksum(seed: u64) -> u64 {
    (0..100_000u64).fold(seed, |acc, i| acc.rotate_left(5) ^ i.wrapping_mul(0x9e37_79b9_7f4a_7c15))
}

/// Run one cycle; `wg` must already carry one unit per worker
fn run_cycle(cycle: u64, wg: &WaitGroup, config: &SyncConfig, slots: &[AtomicU64]) -> Result<(), SyncError> {
    let start = Latch::<AnyWait>::from_config(config);

    thread::scope(|s| {
        for (worker, slot) in slots.iter().enumerate() {
            let start = &start;
            s.spawn(move || {
                start.wait();
                let sum = checksum(cycle * 1_000 + worker as u64);
                slot.store(sum, Ordering::Relaxed);

                if sum % 5 == 0 {
                    wg.done_with(Failure::new(ChecksumRejected { worker, checksum: sum }));
                } else {
                    wg.done();
                }
            });
        }

        info!(cycle, workers = slots.len(), "Opening start gate");
        start.signal();
        wg.wait()
    })
}

fn main() -> miette::Result<()> {
    init_tracing();

    let config = SyncConfig::from_env();
    let workers = worker_count();
    info!(
        strategy = %config.select_strategy(),
        spin_budget = config.spin_budget,
        workers,
        "StreamLine demo starting"
    );

    let slots: Vec<AtomicU64> = (0..workers).map(|_| AtomicU64::new(0)).collect();
    let wg = WaitGroup::with_config(&config);
    wg.add(workers)?;

    for cycle in 0..2u64 {
        match run_cycle(cycle, &wg, &config, &slots) {
            Ok(()) => info!(cycle, "All workers succeeded"),
            Err(SyncError::AggregateFailure(failures)) => {
                for failure in &failures {
                    warn!(cycle, error = %failure, "Worker failed");
                }
                info!(cycle, failed = failures.len(), "Cycle completed with failures");
            }
            Err(e) => return Err(e.into()),
        }

        let total = slots
            .iter()
            .fold(0u64, |acc, slot| acc ^ slot.load(Ordering::Relaxed));
        info!(cycle, checksum = %format!("{:#x}", total), "Fan-in complete");

        wg.reset()?;
    }

    info!("StreamLine demo finished");
    Ok(())
}
