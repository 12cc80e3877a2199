use rustc_hash::{FxHashMap, FxHashSet};
use std::fmt;

use crate::number_theory::NumberTheory;

/// One representation `n = p^j + q^k` with `p <= q`.
///
/// Field order matters: the derived `Ord` sorts by `(p, j, q, k)`, which is
/// the order rows are persisted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PartitionTuple {
    pub p: u64,
    pub j: u32,
    pub q: u64,
    pub k: u32,
}

pub type PartitionSet = FxHashSet<PartitionTuple>;
pub type PartitionDict = FxHashMap<u64, PartitionSet>;

impl PartitionTuple {
    /// Marks a prime with no representation at all.
    pub const SENTINEL: PartitionTuple = PartitionTuple {
        p: 0,
        j: 0,
        q: 0,
        k: 0,
    };

    pub fn new(p: u64, j: u32, q: u64, k: u32) -> Self {
        Self { p, j, q, k }
    }

    /// Order two prime-power addends by base, smaller base first.
    ///
    /// On equal bases the first argument keeps the leading slot.
    pub fn canonical(first: (u64, u32), second: (u64, u32)) -> Self {
        if first.0 <= second.0 {
            Self::new(first.0, first.1, second.0, second.1)
        } else {
            Self::new(second.0, second.1, first.0, first.1)
        }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::SENTINEL
    }

    /// `p^j + q^k`, or `None` on overflow.
    pub fn value(&self) -> Option<u64> {
        self.p.checked_pow(self.j)?.checked_add(self.q.checked_pow(self.k)?)
    }
}

impl fmt::Display for PartitionTuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.p, self.j, self.q, self.k)
    }
}

/// Prime-power form `(base, exponent)` of `v`, if it has one.
fn prime_power_form<N: NumberTheory + ?Sized>(v: u64, nt: &N) -> Option<(u64, u32)> {
    if nt.is_prime(v) {
        return Some((v, 1));
    }
    nt.perfect_power(v).filter(|&(base, _)| nt.is_prime(base))
}

/// Every canonical way to write prime `n` as `p^j + q^k`.
///
/// Walks all splits `n = large + small` with `small <= large`. The result is
/// never empty: with no valid split it is exactly `{SENTINEL}`.
pub fn find_partitions<N: NumberTheory + ?Sized>(n: u64, nt: &N) -> PartitionSet {
    let mut found = PartitionSet::default();

    for small in 1..=n / 2 {
        let large = n - small;

        let Some(large_form) = prime_power_form(large, nt) else {
            continue;
        };
        let Some(small_form) = prime_power_form(small, nt) else {
            continue;
        };

        found.insert(PartitionTuple::canonical(large_form, small_form));
    }

    if found.is_empty() {
        found.insert(PartitionTuple::SENTINEL);
    }
    found
}

/// Fold a batch result into the run-wide map.
///
/// Batches cover disjoint primes, so keys never collide here.
pub fn merge_into(target: &mut PartitionDict, partial: PartitionDict) {
    target.extend(partial);
}
