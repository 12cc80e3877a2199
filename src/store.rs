use itertools::Itertools;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::info;

use crate::error::{PowersumError, Result};
use crate::partition::{PartitionDict, PartitionTuple};

pub const HEADER: &str = "n,p,j,q,k";

fn ends_with_newline(file: &mut File) -> std::io::Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::Start(len - 1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Persist `dict` as one row per (prime, representation), sorted by `n`
/// then by tuple. Returns the number of data rows written.
///
/// `append` keeps existing rows and never writes a header; a fresh write
/// always starts with one.
pub fn write_store(dict: &PartitionDict, path: &Path, append: bool) -> Result<usize> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut file = OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(!append)
        .open(path)?;
    let empty = file.metadata()?.len() == 0;
    let needs_newline = append && !ends_with_newline(&mut file)?;
    file.seek(SeekFrom::End(0))?;

    let mut out = BufWriter::new(file);
    if needs_newline {
        writeln!(out)?;
    }
    if empty && !append {
        writeln!(out, "{}", HEADER)?;
    }

    let mut rows = 0usize;
    for (n, set) in dict.iter().sorted_by_key(|(n, _)| **n) {
        for tuple in set.iter().sorted() {
            writeln!(out, "{},{}", n, tuple)?;
            rows += 1;
        }
    }
    out.flush()?;

    info!(rows, primes = dict.len(), append, path = %path.display(), "store written");
    Ok(rows)
}

fn parse_row(line: &str) -> Option<(u64, PartitionTuple)> {
    let mut fields = line.split(',').map(str::trim);
    let n = fields.next()?.parse().ok()?;
    let p = fields.next()?.parse().ok()?;
    let j = fields.next()?.parse().ok()?;
    let q = fields.next()?.parse().ok()?;
    let k = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some((n, PartitionTuple::new(p, j, q, k)))
}

/// Load a store back into memory, skipping the header and blank lines.
pub fn read_store(path: &Path) -> Result<PartitionDict> {
    if !path.exists() {
        return Err(PowersumError::DataNotFound(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    let mut dict = PartitionDict::default();

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with("n,") {
            continue;
        }
        let (n, tuple) = parse_row(trimmed).ok_or_else(|| PowersumError::ParseError {
            line: trimmed.to_string(),
        })?;
        dict.entry(n).or_default().insert(tuple);
    }
    Ok(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::PartitionSet;

    fn sample() -> PartitionDict {
        let mut dict = PartitionDict::default();
        dict.insert(7, PartitionSet::from_iter([
            PartitionTuple::new(2, 2, 3, 1),
            PartitionTuple::new(2, 1, 5, 1),
        ]));
        dict.insert(2, PartitionSet::from_iter([PartitionTuple::SENTINEL]));
        dict.insert(5, PartitionSet::from_iter([PartitionTuple::new(2, 1, 3, 1)]));
        dict.insert(3, PartitionSet::from_iter([PartitionTuple::SENTINEL]));
        dict
    }

    #[test]
    fn test_fresh_write_is_sorted_with_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/partition_data.csv");

        let rows = write_store(&sample(), &path, false).unwrap();
        assert_eq!(rows, 5);
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "n,p,j,q,k\n2,0,0,0,0\n3,0,0,0,0\n5,2,1,3,1\n7,2,1,5,1\n7,2,2,3,1\n"
        );
    }

    #[test]
    fn test_fresh_write_truncates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition_data.csv");
        fs::write(&path, "garbage\nthat should vanish\n").unwrap();

        write_store(&sample(), &path, false).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("n,p,j,q,k\n2,0,0,0,0\n"));
        assert!(!text.contains("garbage"));
    }

    #[test]
    fn test_append_skips_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition_data.csv");
        fs::write(&path, "n,p,j,q,k\n2,0,0,0,0\n").unwrap();

        let mut more = PartitionDict::default();
        more.insert(11, PartitionSet::from_iter([
            PartitionTuple::new(2, 1, 3, 2),
            PartitionTuple::new(2, 3, 3, 1),
        ]));
        write_store(&more, &path, true).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text, "n,p,j,q,k\n2,0,0,0,0\n11,2,1,3,2\n11,2,3,3,1\n");
        assert_eq!(text.matches("n,p,j,q,k").count(), 1);
    }

    #[test]
    fn test_append_to_empty_file_writes_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition_data.csv");
        fs::write(&path, "").unwrap();

        let mut more = PartitionDict::default();
        more.insert(5, PartitionSet::from_iter([PartitionTuple::new(2, 1, 3, 1)]));
        write_store(&more, &path, true).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "5,2,1,3,1\n");

        let fresh = dir.path().join("fresh.csv");
        write_store(&more, &fresh, true).unwrap();
        assert_eq!(fs::read_to_string(&fresh).unwrap(), "5,2,1,3,1\n");
    }

    #[test]
    fn test_append_repairs_missing_final_newline() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition_data.csv");
        fs::write(&path, "n,p,j,q,k\n2,0,0,0,0").unwrap();

        let mut more = PartitionDict::default();
        more.insert(3, PartitionSet::from_iter([PartitionTuple::SENTINEL]));
        write_store(&more, &path, true).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "n,p,j,q,k\n2,0,0,0,0\n3,0,0,0,0\n"
        );
    }

    #[test]
    fn test_read_back_matches_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition_data.csv");
        write_store(&sample(), &path, false).unwrap();
        assert_eq!(read_store(&path).unwrap(), sample());
    }

    #[test]
    fn test_read_rejects_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("partition_data.csv");
        fs::write(&path, "n,p,j,q,k\n5,2,1,3\n").unwrap();
        assert!(matches!(
            read_store(&path),
            Err(PowersumError::ParseError { line }) if line == "5,2,1,3"
        ));
    }
}
