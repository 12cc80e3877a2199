use crossbeam_channel::unbounded;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use tracing::{debug, error, info};

use crate::error::{PowersumError, Result};
use crate::number_theory::NumberTheory;
use crate::partition::{PartitionDict, find_partitions, merge_into};
use crate::planner::IndexRange;

/// Fixed-size pool that runs the partition search over index ranges.
///
/// Workers share nothing but the read-only provider. The first failing
/// range aborts the run and no partial result is returned.
#[derive(Debug, Clone)]
pub struct WorkerPool {
    workers: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        Self {
            workers: workers.max(1),
        }
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Search every prime in every range and merge the batches as they land.
    pub fn run<N: NumberTheory + ?Sized>(
        &self,
        ranges: &[IndexRange],
        nt: &N,
    ) -> Result<PartitionDict> {
        let total = ranges.len();
        if total == 0 {
            return Ok(PartitionDict::default());
        }
        let workers = self.workers.min(total);

        let (task_tx, task_rx) = unbounded::<IndexRange>();
        for range in ranges {
            task_tx
                .send(*range)
                .map_err(|e| PowersumError::WorkerFault {
                    range: e.0,
                    reason: "task queue closed".to_string(),
                })?;
        }
        drop(task_tx);

        let (result_tx, result_rx) = unbounded::<Result<PartitionDict>>();
        let cancelled = AtomicBool::new(false);

        info!(batches = total, workers, "dispatching batches");

        thread::scope(|s| {
            for worker_id in 0..workers {
                let task_rx = task_rx.clone();
                let result_tx = result_tx.clone();
                let cancelled = &cancelled;
                s.spawn(move || {
                    while let Ok(range) = task_rx.recv() {
                        if cancelled.load(Ordering::Acquire) {
                            debug!(worker_id, "cancelled, leaving queue");
                            break;
                        }
                        let outcome = run_guarded(range, nt);
                        let failed = outcome.is_err();
                        if result_tx.send(outcome).is_err() || failed {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            let mut dict = PartitionDict::default();
            let mut completed = 0usize;
            for outcome in result_rx.iter() {
                match outcome {
                    Ok(partial) => {
                        merge_into(&mut dict, partial);
                        completed += 1;
                        info!(completed, total, "batch complete");
                    }
                    Err(e) => {
                        cancelled.store(true, Ordering::Release);
                        error!(completed, total, "aborting run: {}", e);
                        return Err(e);
                    }
                }
            }
            Ok(dict)
        })
    }
}

/// Run one range, turning provider errors and panics into `WorkerFault`.
fn run_guarded<N: NumberTheory + ?Sized>(range: IndexRange, nt: &N) -> Result<PartitionDict> {
    match panic::catch_unwind(AssertUnwindSafe(|| process_range(range, nt))) {
        Ok(Ok(dict)) => Ok(dict),
        Ok(Err(e)) => Err(PowersumError::WorkerFault {
            range,
            reason: e.to_string(),
        }),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string());
            Err(PowersumError::WorkerFault { range, reason })
        }
    }
}

/// Resolve a range to concrete primes and search each one.
pub fn process_range<N: NumberTheory + ?Sized>(range: IndexRange, nt: &N) -> Result<PartitionDict> {
    let lo = nt.unrank(range.start)?;
    // upper bound is the prime just past the range
    let hi = nt.unrank(range.end + 1)?;
    let primes = nt.primes_in_range(lo, hi);

    let mut dict = PartitionDict::default();
    for &n in &primes {
        dict.insert(n, find_partitions(n, nt));
    }

    debug!(
        start = range.start,
        end = range.end,
        primes = primes.len(),
        "range searched"
    );
    Ok(dict)
}
