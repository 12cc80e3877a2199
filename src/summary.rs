use std::collections::BTreeMap;
use std::fmt;

use crate::partition::{PartitionDict, PartitionSet, PartitionTuple};

/// Aggregate view of one run's results.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub primes: usize,
    pub total_partitions: usize,
    pub zero_partition_primes: usize,
    /// representation count -> number of primes with that count
    pub distribution: BTreeMap<usize, usize>,
}

fn is_zero_partition(set: &PartitionSet) -> bool {
    set.len() == 1 && set.contains(&PartitionTuple::SENTINEL)
}

impl Summary {
    pub fn from_dict(dict: &PartitionDict) -> Self {
        let mut distribution = BTreeMap::new();
        let mut total_partitions = 0;
        let mut zero_partition_primes = 0;

        for set in dict.values() {
            total_partitions += set.len();
            let count = if is_zero_partition(set) {
                zero_partition_primes += 1;
                0
            } else {
                set.len()
            };
            *distribution.entry(count).or_insert(0) += 1;
        }

        Self {
            primes: dict.len(),
            total_partitions,
            zero_partition_primes,
            distribution,
        }
    }

    pub fn zero_share(&self) -> f64 {
        if self.primes == 0 {
            return 0.0;
        }
        self.zero_partition_primes as f64 / self.primes as f64 * 100.0
    }

    pub fn average(&self) -> f64 {
        if self.primes == 0 {
            return 0.0;
        }
        self.total_partitions as f64 / self.primes as f64
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Summary Statistics ===")?;
        writeln!(f, "Primes processed: {}", self.primes)?;
        writeln!(f, "Total partitions found: {}", self.total_partitions)?;
        writeln!(
            f,
            "Zero-partition primes: {} ({:.1}%)",
            self.zero_partition_primes,
            self.zero_share()
        )?;
        writeln!(f, "Average partitions per prime: {:.2}", self.average())?;
        writeln!(f)?;
        writeln!(f, "=== Partition Count Distribution ===")?;
        for (count, primes) in &self.distribution {
            writeln!(f, "  {} partitions: {} primes", count, primes)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::number_theory::PrimeTable;
    use crate::partition::find_partitions;

    #[test]
    fn test_summary_of_first_four_primes() {
        let table = PrimeTable::up_to(20).unwrap();
        let mut dict = PartitionDict::default();
        for n in [2u64, 3, 5, 7] {
            dict.insert(n, find_partitions(n, &table));
        }

        let summary = Summary::from_dict(&dict);
        assert_eq!(summary.primes, 4);
        assert_eq!(summary.total_partitions, 5);
        assert_eq!(summary.zero_partition_primes, 2);
        assert_eq!(
            summary.distribution,
            BTreeMap::from([(0, 2), (1, 1), (2, 1)])
        );
        assert!((summary.zero_share() - 50.0).abs() < 1e-9);
        assert!((summary.average() - 1.25).abs() < 1e-9);

        let report = summary.to_string();
        assert!(report.contains("Primes processed: 4"));
        assert!(report.contains("Zero-partition primes: 2 (50.0%)"));
        assert!(report.contains("  0 partitions: 2 primes"));
    }

    #[test]
    fn test_summary_of_empty_dict() {
        let summary = Summary::from_dict(&PartitionDict::default());
        assert_eq!(summary.primes, 0);
        assert_eq!(summary.average(), 0.0);
        assert_eq!(summary.zero_share(), 0.0);
        assert!(summary.distribution.is_empty());
    }
}
