use std::fmt;
use std::path::PathBuf;

use crate::planner::IndexRange;

#[derive(Debug)]
pub enum PowersumError {
    /// Requested prime count is not a multiple of the batch size.
    InvalidBatchSize { count: u64, batch_size: u64 },
    /// Resume requested but the store does not exist.
    DataNotFound(PathBuf),
    /// Store exists but holds zero bytes.
    EmptyStore(PathBuf),
    /// Store holds only a header, or nothing but blank lines.
    NoDataRows(PathBuf),
    /// Leading field of the last content line is not an integer.
    ParseError { line: String },
    /// A batch failed; the whole run is aborted.
    WorkerFault { range: IndexRange, reason: String },
    NotPrime(u64),
    OutOfTable { requested: u64, limit: u64 },
    Config(String),
    Io(std::io::Error),
}

impl fmt::Display for PowersumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PowersumError::InvalidBatchSize { count, batch_size } => write!(
                f,
                "Invalid batch size: num_primes ({}) must be strictly divisible by batch_size ({})",
                count, batch_size
            ),
            PowersumError::DataNotFound(p) => write!(f, "Data file not found at {}", p.display()),
            PowersumError::EmptyStore(p) => write!(f, "Data file is empty: {}", p.display()),
            PowersumError::NoDataRows(p) => write!(f, "No data rows found in {}", p.display()),
            PowersumError::ParseError { line } => {
                write!(f, "Could not parse last line of store: {}", line)
            }
            PowersumError::WorkerFault { range, reason } => write!(
                f,
                "Worker fault in batch [{}, {}]: {}",
                range.start, range.end, reason
            ),
            PowersumError::NotPrime(v) => write!(f, "{} is not prime", v),
            PowersumError::OutOfTable { requested, limit } => write!(
                f,
                "Prime table exhausted: requested {} but table covers {}",
                requested, limit
            ),
            PowersumError::Config(e) => write!(f, "Config error: {}", e),
            PowersumError::Io(e) => write!(f, "IO error: {}", e),
        }
    }
}

impl std::error::Error for PowersumError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PowersumError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for PowersumError {
    fn from(err: std::io::Error) -> Self {
        PowersumError::Io(err)
    }
}

impl From<toml::de::Error> for PowersumError {
    fn from(err: toml::de::Error) -> Self {
        PowersumError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PowersumError>;
