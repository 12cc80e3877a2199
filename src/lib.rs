pub mod config;
pub mod engine;
pub mod error;
pub mod number_theory;
pub mod partition;
pub mod planner;
pub mod pool;
pub mod resume;
pub mod store;
pub mod summary;

pub use config::Config;
pub use engine::{RunOutcome, RunRequest, generate_partitions};
pub use error::*;
pub use number_theory::{NumberTheory, PrimeTable};
pub use partition::{PartitionDict, PartitionSet, PartitionTuple, find_partitions};
pub use planner::{IndexRange, plan_batches};
pub use pool::WorkerPool;
pub use resume::{ResumeCoordinator, ResumePoint};

use tracing_subscriber::EnvFilter;

/// Install a stderr fmt subscriber; `RUST_LOG` overrides the `info` default.
pub fn init_tracing(service: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
    tracing::debug!(service, "tracing initialised");
}
