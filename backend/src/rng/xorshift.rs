//! xorshift64* random number generator
//!
//! xorshift64* passes TestU01's BigCrush with 64 bits of state, which is
//! plenty for synthesizing test ledgers.
//!
//! # Determinism
//!
//! Same seed → same sequence → same ledger. Reconciliation fixtures are
//! regenerated from a seed, so this property is load-bearing.

use serde::{Deserialize, Serialize};

/// Deterministic random number generator using xorshift64*
///
/// # Example
/// ```
/// use txgen_core_rs::RngManager;
///
/// let mut rng = RngManager::new(42);
/// let cents = rng.range_inclusive(10_000, 200_000); // $100.00 ..= $2,000.00
/// assert!((10_000..=200_000).contains(&cents));
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RngManager {
    /// Internal state (64-bit, never zero)
    state: u64,
}

impl RngManager {
    /// Create a new RNG with given seed
    ///
    /// A zero seed is remapped to 1 because xorshift has a fixed point at zero.
    pub fn new(seed: u64) -> Self {
        let state = if seed == 0 { 1 } else { seed };
        Self { state }
    }

    /// Generate next random u64 value
    pub fn next(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    /// Generate random value in range [min, max)
    ///
    /// # Panics
    /// Panics if min >= max
    pub fn range(&mut self, min: i64, max: i64) -> i64 {
        assert!(min < max, "min must be less than max");

        let value = self.next();
        let range_size = (max as i128 - min as i128) as u64;
        (min as i128 + (value % range_size) as i128) as i64
    }

    /// Generate random value in range [min, max]
    ///
    /// Amount draws in the synthesizer are quoted as closed intervals
    /// ("between $100 and $2,000"), hence the inclusive variant.
    ///
    /// # Panics
    /// Panics if min > max
    pub fn range_inclusive(&mut self, min: i64, max: i64) -> i64 {
        assert!(min <= max, "min must not exceed max");
        if min == max {
            return min;
        }
        self.range(min, max + 1)
    }

    /// Random index into a collection of `len` items
    ///
    /// # Panics
    /// Panics if `len` is zero
    pub fn index(&mut self, len: usize) -> usize {
        assert!(len > 0, "cannot pick from an empty collection");
        (self.next() % len as u64) as usize
    }

    /// Get current RNG state
    ///
    /// `RngManager::new(rng.get_state())` resumes the exact same sequence.
    pub fn get_state(&self) -> u64 {
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_seed_converted_to_nonzero() {
        let rng = RngManager::new(0);
        assert_ne!(rng.get_state(), 0, "Zero seed should be converted to 1");
    }

    #[test]
    #[should_panic(expected = "min must be less than max")]
    fn test_range_invalid_bounds() {
        let mut rng = RngManager::new(12345);
        rng.range(100, 50);
    }

    #[test]
    #[should_panic(expected = "min must not exceed max")]
    fn test_range_inclusive_invalid_bounds() {
        let mut rng = RngManager::new(12345);
        rng.range_inclusive(10, 9);
    }

    #[test]
    fn test_range_inclusive_hits_both_ends() {
        let mut rng = RngManager::new(7);
        let mut saw_min = false;
        let mut saw_max = false;
        for _ in 0..1000 {
            match rng.range_inclusive(1, 3) {
                1 => saw_min = true,
                3 => saw_max = true,
                2 => {}
                other => panic!("value {} outside [1, 3]", other),
            }
        }
        assert!(saw_min && saw_max);
    }

    #[test]
    fn test_range_handles_negative_bounds() {
        let mut rng = RngManager::new(99);
        for _ in 0..500 {
            let v = rng.range(-200, 301);
            assert!((-200..301).contains(&v));
        }
    }

    #[test]
    fn test_state_resume_reproduces_sequence() {
        let mut rng = RngManager::new(2024);
        rng.next();
        let mut resumed = RngManager::new(rng.get_state());
        assert_eq!(rng.next(), resumed.next());
    }
}
