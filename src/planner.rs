use crate::error::{PowersumError, Result};

/// Inclusive span of positions in the global ascending prime sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IndexRange {
    pub start: u64,
    pub end: u64,
}

impl IndexRange {
    pub fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Number of indices covered.
    pub fn span(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Split `count` consecutive indices starting at `start_index` into
/// `count / batch_size` contiguous ranges of exactly `batch_size` each.
///
/// Refuses to truncate or pad: `count` must be a multiple of `batch_size`.
pub fn plan_batches(start_index: u64, count: u64, batch_size: u64) -> Result<Vec<IndexRange>> {
    if batch_size == 0 || count % batch_size != 0 {
        return Err(PowersumError::InvalidBatchSize { count, batch_size });
    }

    let batches = count / batch_size;
    let ranges = (0..batches)
        .map(|b| {
            let start = start_index + b * batch_size;
            IndexRange::new(start, start + batch_size - 1)
        })
        .collect();
    Ok(ranges)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_covers_exact_span() {
        let ranges = plan_batches(10, 12, 4).unwrap();
        assert_eq!(
            ranges,
            vec![
                IndexRange::new(10, 13),
                IndexRange::new(14, 17),
                IndexRange::new(18, 21),
            ]
        );
    }

    #[test]
    fn test_plan_contiguous_no_overlap() {
        let ranges = plan_batches(0, 1_000, 250).unwrap();
        assert_eq!(ranges.len(), 4);
        assert_eq!(ranges.first().unwrap().start, 0);
        assert_eq!(ranges.last().unwrap().end, 999);
        for pair in ranges.windows(2) {
            assert_eq!(pair[0].end + 1, pair[1].start, "gap or overlap between ranges");
        }
        let covered: u64 = ranges.iter().map(|r| r.span()).sum();
        assert_eq!(covered, 1_000);
    }

    #[test]
    fn test_plan_single_index_batches() {
        let ranges = plan_batches(5, 3, 1).unwrap();
        assert_eq!(
            ranges,
            vec![IndexRange::new(5, 5), IndexRange::new(6, 6), IndexRange::new(7, 7)]
        );
    }

    #[test]
    fn test_plan_rejects_non_multiple() {
        let err = plan_batches(0, 10, 3).unwrap_err();
        assert!(matches!(
            err,
            PowersumError::InvalidBatchSize { count: 10, batch_size: 3 }
        ));
    }

    #[test]
    fn test_plan_rejects_zero_batch() {
        assert!(matches!(
            plan_batches(0, 10, 0),
            Err(PowersumError::InvalidBatchSize { .. })
        ));
    }

    #[test]
    fn test_plan_zero_count_is_empty() {
        assert!(plan_batches(7, 0, 5).unwrap().is_empty());
    }
}
