use fixedbitset::FixedBitSet;

use crate::error::{PowersumError, Result};

/// Largest value a [`PrimeTable`] will sieve up to (about 512 MiB of bits).
pub const MAX_SIEVE_LIMIT: u64 = 1 << 32;

/// Witnesses that make Miller-Rabin deterministic for every 64-bit input.
const MR_BASES: [u64; 12] = [2, 3, 5, 7, 11, 13, 17, 19, 23, 29, 31, 37];

/// Read-only arithmetic service consumed by the partition search.
///
/// Every method takes `&self`, so a single instance can be handed to all
/// workers at once without any locking.
pub trait NumberTheory: Send + Sync {
    fn is_prime(&self, v: u64) -> bool;

    /// `(base, exponent)` with the largest exponent >= 2 such that
    /// `base^exponent == v`, or `None` when `v` is not a perfect power.
    fn perfect_power(&self, v: u64) -> Option<(u64, u32)>;

    /// 0-based position of `prime` in the ascending sequence of primes.
    fn rank(&self, prime: u64) -> Result<u64>;

    /// Inverse of [`NumberTheory::rank`].
    fn unrank(&self, index: u64) -> Result<u64>;

    /// Ascending primes in `[lo, hi)`.
    fn primes_in_range(&self, lo: u64, hi: u64) -> Vec<u64>;
}

/// Sieve-backed provider covering every value up to `limit`.
#[derive(Debug, Clone)]
pub struct PrimeTable {
    limit: u64,
    composite: FixedBitSet,
    primes: Vec<u64>,
}

impl PrimeTable {
    /// Sieve every value in `0..=limit`.
    ///
    /// Fails with `OutOfTable` when `limit` exceeds [`MAX_SIEVE_LIMIT`].
    pub fn up_to(limit: u64) -> Result<Self> {
        if limit > MAX_SIEVE_LIMIT {
            return Err(PowersumError::OutOfTable {
                requested: limit,
                limit: MAX_SIEVE_LIMIT,
            });
        }
        let size = limit as usize + 1;
        let mut composite = FixedBitSet::with_capacity(size);
        composite.insert(0);
        if size > 1 {
            composite.insert(1);
        }

        let mut i = 2usize;
        while i * i < size {
            if !composite.contains(i) {
                let mut multiple = i * i;
                while multiple < size {
                    composite.insert(multiple);
                    multiple += i;
                }
            }
            i += 1;
        }

        let primes = (2..size)
            .filter(|&v| !composite.contains(v))
            .map(|v| v as u64)
            .collect();

        Ok(Self {
            limit,
            composite,
            primes,
        })
    }

    /// Smallest table guaranteed to contain the prime at `index`.
    ///
    /// Uses the Rosser bound `p_n < n (ln n + ln ln n)` for `n >= 6`.
    pub fn with_index_capacity(index: u64) -> Result<Self> {
        let n = index.saturating_add(1);
        let limit = if n < 6 {
            15
        } else {
            let nf = n as f64;
            // `as` saturates, so a huge index lands above the cap
            ((nf * (nf.ln() + nf.ln().ln())).ceil() as u64).saturating_add(1)
        };
        Self::up_to(limit)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.primes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primes.is_empty()
    }
}

impl NumberTheory for PrimeTable {
    fn is_prime(&self, v: u64) -> bool {
        if v <= self.limit {
            !self.composite.contains(v as usize)
        } else {
            miller_rabin(v)
        }
    }

    fn perfect_power(&self, v: u64) -> Option<(u64, u32)> {
        perfect_power(v)
    }

    fn rank(&self, prime: u64) -> Result<u64> {
        if prime > self.limit {
            return Err(PowersumError::OutOfTable {
                requested: prime,
                limit: self.limit,
            });
        }
        self.primes
            .binary_search(&prime)
            .map(|idx| idx as u64)
            .map_err(|_| PowersumError::NotPrime(prime))
    }

    fn unrank(&self, index: u64) -> Result<u64> {
        self.primes
            .get(index as usize)
            .copied()
            .ok_or(PowersumError::OutOfTable {
                requested: index,
                limit: self.primes.len() as u64,
            })
    }

    fn primes_in_range(&self, lo: u64, hi: u64) -> Vec<u64> {
        let from = self.primes.partition_point(|&p| p < lo);
        let to = self.primes.partition_point(|&p| p < hi);
        if from >= to {
            return Vec::new();
        }
        self.primes[from..to].to_vec()
    }
}

fn mul_mod(a: u64, b: u64, m: u64) -> u64 {
    ((a as u128 * b as u128) % m as u128) as u64
}

fn pow_mod(mut base: u64, mut exp: u64, m: u64) -> u64 {
    let mut acc = 1u64;
    base %= m;
    while exp > 0 {
        if exp & 1 == 1 {
            acc = mul_mod(acc, base, m);
        }
        base = mul_mod(base, base, m);
        exp >>= 1;
    }
    acc
}

/// Deterministic Miller-Rabin for the full `u64` range.
pub fn miller_rabin(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    for &p in MR_BASES.iter() {
        if n % p == 0 {
            return n == p;
        }
    }

    let s = (n - 1).trailing_zeros();
    let d = (n - 1) >> s;

    'witness: for &a in MR_BASES.iter() {
        let mut x = pow_mod(a, d, n);
        if x == 1 || x == n - 1 {
            continue;
        }
        for _ in 1..s {
            x = mul_mod(x, x, n);
            if x == n - 1 {
                continue 'witness;
            }
        }
        return false;
    }
    true
}

fn exceeds(r: u64, e: u32, v: u64) -> bool {
    r.checked_pow(e).is_none_or(|p| p > v)
}

/// Floor of the `e`-th root of `v`.
fn integer_root(v: u64, e: u32) -> u64 {
    let mut r = (v as f64).powf(1.0 / e as f64).round() as u64;
    while r > 0 && exceeds(r, e, v) {
        r -= 1;
    }
    while !exceeds(r + 1, e, v) {
        r += 1;
    }
    r
}

/// Perfect-power decomposition with the smallest possible base.
pub fn perfect_power(v: u64) -> Option<(u64, u32)> {
    if v < 4 {
        return None;
    }
    let max_exp = 63 - v.leading_zeros();
    for e in (2..=max_exp).rev() {
        let r = integer_root(v, e);
        if r >= 2 && r.checked_pow(e) == Some(v) {
            return Some((r, e));
        }
    }
    None
}
