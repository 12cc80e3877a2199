use std::path::PathBuf;
use tracing::info;

use crate::config::Config;
use crate::error::{PowersumError, Result};
use crate::number_theory::{NumberTheory, PrimeTable};
use crate::partition::PartitionDict;
use crate::planner::plan_batches;
use crate::pool::WorkerPool;
use crate::resume::{ResumeCoordinator, ResumePoint};

/// What the caller asked for.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub num_primes: u64,
    pub batch_size: u64,
    pub workers: usize,
    pub resume: bool,
    /// Store to resume from; `None` means `config.data_path()`.
    pub store_path: Option<PathBuf>,
}

/// Result of a run that did not fail.
#[derive(Debug)]
pub enum RunOutcome {
    /// Zero primes were requested.
    NothingToDo,
    Completed {
        start_index: u64,
        resumed: Option<ResumePoint>,
        dict: PartitionDict,
    },
}

impl RunOutcome {
    pub fn dict(&self) -> Option<&PartitionDict> {
        match self {
            RunOutcome::NothingToDo => None,
            RunOutcome::Completed { dict, .. } => Some(dict),
        }
    }
}

/// Plan, optionally resume, and search `num_primes` consecutive primes.
///
/// Batch-size validation happens before anything touches the store. When
/// resuming, the scan and backup finish before any worker starts.
pub fn generate_partitions(request: &RunRequest, config: &Config) -> Result<RunOutcome> {
    if request.num_primes == 0 {
        info!("no primes requested");
        return Ok(RunOutcome::NothingToDo);
    }
    if request.batch_size == 0 || request.num_primes % request.batch_size != 0 {
        return Err(PowersumError::InvalidBatchSize {
            count: request.num_primes,
            batch_size: request.batch_size,
        });
    }

    let resumed = if request.resume {
        let store = request
            .store_path
            .clone()
            .unwrap_or_else(|| config.data_path());
        let coordinator = ResumeCoordinator::new(store, &config.backup_dir);
        Some(coordinator.resolve_resume_start(PrimeTable::up_to)?)
    } else {
        None
    };
    let start_index = resumed.as_ref().map_or(0, |r| r.start_index);

    let ranges = plan_batches(start_index, request.num_primes, request.batch_size)?;
    // unrank(end + 1) of the last range needs one prime past the request
    let table = PrimeTable::with_index_capacity(start_index.saturating_add(request.num_primes))?;

    info!(
        start_index,
        first_prime = table.unrank(start_index)?,
        primes = request.num_primes,
        batches = ranges.len(),
        "starting search"
    );

    let dict = WorkerPool::new(request.workers).run(&ranges, &table)?;

    Ok(RunOutcome::Completed {
        start_index,
        resumed,
        dict,
    })
}
