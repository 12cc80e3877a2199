use chrono::Local;
use filetime::FileTime;
use std::fs::{self, File};
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{PowersumError, Result};
use crate::number_theory::NumberTheory;

const SCAN_BLOCK: u64 = 4096;
const HEADER_PREFIX: &str = "n,";

/// Where a resumed run picks up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResumePoint {
    pub last_prime: u64,
    pub start_index: u64,
    pub backup: Option<PathBuf>,
}

/// Reads the tail of an existing store and snapshots it before a resumed run.
pub struct ResumeCoordinator {
    store_path: PathBuf,
    backup_dir: PathBuf,
}

impl ResumeCoordinator {
    pub fn new(store_path: impl Into<PathBuf>, backup_dir: impl Into<PathBuf>) -> Self {
        Self {
            store_path: store_path.into(),
            backup_dir: backup_dir.into(),
        }
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// `n` of the last content row in the store.
    pub fn last_prime(&self) -> Result<u64> {
        last_stored_prime(&self.store_path)
    }

    /// Scan the store, rank its last prime and back the store up.
    ///
    /// `ranker_for` receives the last stored prime and must return a
    /// provider able to rank it, or the reason it cannot build one. Nothing
    /// is copied unless the scan, the provider and the rank all succeed.
    pub fn resolve_resume_start<N, F>(&self, ranker_for: F) -> Result<ResumePoint>
    where
        N: NumberTheory,
        F: FnOnce(u64) -> Result<N>,
    {
        let last_prime = self.last_prime()?;
        let ranker = ranker_for(last_prime)?;
        let start_index = ranker.rank(last_prime)? + 1;
        let backup = create_backup(&self.store_path, &self.backup_dir)?;

        info!(last_prime, start_index, "resuming after stored prime");
        Ok(ResumePoint {
            last_prime,
            start_index,
            backup,
        })
    }
}

/// Position of the last byte before `upto` that satisfies `pred`.
///
/// Reads fixed blocks backward, so the cost tracks the distance scanned,
/// not the file size.
fn rfind_byte<F: Fn(u8) -> bool>(file: &mut File, upto: u64, pred: F) -> std::io::Result<Option<u64>> {
    let mut buf = [0u8; SCAN_BLOCK as usize];
    let mut end = upto;
    while end > 0 {
        let start = end.saturating_sub(SCAN_BLOCK);
        let chunk = &mut buf[..(end - start) as usize];
        file.seek(SeekFrom::Start(start))?;
        file.read_exact(chunk)?;
        if let Some(i) = chunk.iter().rposition(|&b| pred(b)) {
            return Ok(Some(start + i as u64));
        }
        end = start;
    }
    Ok(None)
}

/// Last line holding anything other than line terminators, trimmed.
///
/// `Ok(None)` when the file is nothing but `\n` / `\r` bytes.
pub fn read_last_line(path: &Path) -> Result<Option<String>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();

    let Some(last) = rfind_byte(&mut file, len, |b| b != b'\n' && b != b'\r')? else {
        return Ok(None);
    };
    let end = last + 1;
    let start = rfind_byte(&mut file, end, |b| b == b'\n')?.map_or(0, |nl| nl + 1);

    let mut line = vec![0u8; (end - start) as usize];
    file.seek(SeekFrom::Start(start))?;
    file.read_exact(&mut line)?;

    Ok(Some(String::from_utf8_lossy(&line).trim().to_string()))
}

/// `n` (first field) of the last non-blank row of the store.
pub fn last_stored_prime(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Err(PowersumError::DataNotFound(path.to_path_buf()));
    }
    if fs::metadata(path)?.len() == 0 {
        return Err(PowersumError::EmptyStore(path.to_path_buf()));
    }

    let line = match read_last_line(path)? {
        Some(line) if !line.is_empty() && !line.starts_with(HEADER_PREFIX) => line,
        _ => return Err(PowersumError::NoDataRows(path.to_path_buf())),
    };

    let parsed = line
        .split(',')
        .next()
        .map(str::trim)
        .and_then(|field| field.parse::<u64>().ok());
    parsed.ok_or(PowersumError::ParseError { line })
}

/// Copy the store to `backup_dir/<timestamp>.csv.bak`, keeping its
/// permissions and timestamps. A missing store is a no-op.
pub fn create_backup(path: &Path, backup_dir: &Path) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    fs::create_dir_all(backup_dir)?;

    let stamp = Local::now().format("%Y-%m-%d_%H%M%S").to_string();
    let mut backup_path = backup_dir.join(format!("{}.csv.bak", stamp));
    let mut suffix = 1;
    while backup_path.exists() {
        backup_path = backup_dir.join(format!("{}_{}.csv.bak", stamp, suffix));
        suffix += 1;
    }

    fs::copy(path, &backup_path)?;
    let meta = fs::metadata(path)?;
    filetime::set_file_times(
        &backup_path,
        FileTime::from_last_access_time(&meta),
        FileTime::from_last_modification_time(&meta),
    )?;

    info!(backup = %backup_path.display(), "backup created");
    Ok(Some(backup_path))
}
