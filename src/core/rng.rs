//! Deterministic Random Number Generator
//!
//! Uses Xorshift128+ algorithm for fast, high-quality, deterministic randomness.
//! Given the same seed, produces identical sequence on all platforms.
//!
//! Every random draw the level makes (path bearings, segment lengths, wave
//! composition, portal threat spread) comes from one of these streams, so a
//! level replays exactly from its seed.

use serde::{Serialize, Deserialize};

/// Anything that can be selected by [`DeterministicRng::weighted_pick`].
pub trait Weighted {
    /// Relative selection weight. Zero means "never picked".
    fn weight(&self) -> u32;
}

/// Deterministic PRNG using Xorshift128+ algorithm.
///
/// # Determinism Guarantee
///
/// Given the same seed, this RNG will produce the exact same sequence
/// of random numbers on any platform.
///
/// # Example
///
/// ```
/// use branching_td::core::rng::DeterministicRng;
///
/// let mut a = DeterministicRng::new(12345);
/// let mut b = DeterministicRng::new(12345);
/// assert_eq!(a.next_u64(), b.next_u64());
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeterministicRng {
    state: [u64; 2],
}

impl Default for DeterministicRng {
    fn default() -> Self {
        Self::new(0)
    }
}

impl DeterministicRng {
    /// Create a new RNG from a 64-bit seed.
    ///
    /// Uses SplitMix64 to initialize the internal state, ensuring
    /// good distribution even from weak seeds.
    pub fn new(seed: u64) -> Self {
        let mut s = seed;
        let state0 = splitmix64(&mut s);
        let state1 = splitmix64(&mut s);

        // Ensure state is never all zeros
        let state = if state0 == 0 && state1 == 0 {
            [1, 1]
        } else {
            [state0, state1]
        };

        Self { state }
    }

    /// Derive an independent child stream.
    ///
    /// Consumes one value from this stream as the child's seed, so the
    /// parent advances deterministically and the two never share state.
    pub fn fork(&mut self) -> Self {
        Self::new(self.next_u64())
    }

    /// Generate the next 64-bit random value.
    #[inline]
    pub fn next_u64(&mut self) -> u64 {
        let s0 = self.state[0];
        let mut s1 = self.state[1];
        let result = s0.wrapping_add(s1);

        s1 ^= s0;
        self.state[0] = s0.rotate_left(24) ^ s1 ^ (s1 << 16);
        self.state[1] = s1.rotate_left(37);

        result
    }

    /// Generate a random integer in range [0, max).
    #[inline]
    pub fn next_int(&mut self, max: u64) -> u64 {
        if max == 0 {
            return 0;
        }
        // Simple modulo - slight bias for very large max, but acceptable
        self.next_u64() % max
    }

    /// Uniform float in [0, 1).
    ///
    /// Built from the top 53 bits so every value is exactly representable.
    #[inline]
    pub fn next_frac(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 * (1.0 / (1u64 << 53) as f64)
    }

    /// Uniform integer in [min, max], both inclusive.
    ///
    /// Inverted bounds are swapped rather than rejected.
    pub fn between(&mut self, min: u64, max: u64) -> u64 {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let span = hi - lo;
        if span == u64::MAX {
            return self.next_u64();
        }
        lo + self.next_int(span + 1)
    }

    /// Uniform float in [min, max).
    #[inline]
    pub fn real_in_range(&mut self, min: f64, max: f64) -> f64 {
        min + self.next_frac() * (max - min)
    }

    /// Pick one candidate with probability proportional to its weight.
    ///
    /// Returns `None` when the list is empty or every weight is zero.
    pub fn weighted_pick<'a, T: Weighted>(&mut self, candidates: &'a [T]) -> Option<&'a T> {
        let total: u64 = candidates.iter().map(|c| c.weight() as u64).sum();
        if total == 0 {
            return None;
        }

        let mut roll = self.next_int(total);
        for candidate in candidates {
            let weight = candidate.weight() as u64;
            if roll < weight {
                return Some(candidate);
            }
            roll -= weight;
        }

        // Unreachable while roll < total
        None
    }

    /// Get current state (for checkpointing/debugging).
    pub fn state(&self) -> [u64; 2] {
        self.state
    }

    /// Restore from saved state.
    pub fn set_state(&mut self, state: [u64; 2]) {
        self.state = state;
    }
}

/// SplitMix64 for seed initialization.
/// Produces well-distributed values from sequential seeds.
#[inline]
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Candidate(&'static str, u32);

    impl Weighted for Candidate {
        fn weight(&self) -> u32 {
            self.1
        }
    }

    #[test]
    fn test_rng_determinism() {
        // Same seed must produce same sequence
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(12345);

        for _ in 0..1000 {
            assert_eq!(rng1.next_u64(), rng2.next_u64());
        }
    }

    #[test]
    fn test_rng_different_seeds() {
        let mut rng1 = DeterministicRng::new(12345);
        let mut rng2 = DeterministicRng::new(54321);

        // Very unlikely to match
        assert_ne!(rng1.next_u64(), rng2.next_u64());
    }

    #[test]
    fn test_next_frac_range() {
        let mut rng = DeterministicRng::new(7);
        for _ in 0..10_000 {
            let f = rng.next_frac();
            assert!((0.0..1.0).contains(&f));
        }
    }

    #[test]
    fn test_between_inclusive() {
        let mut rng = DeterministicRng::new(99);
        let mut seen_min = false;
        let mut seen_max = false;

        for _ in 0..2000 {
            let v = rng.between(3, 6);
            assert!((3..=6).contains(&v));
            seen_min |= v == 3;
            seen_max |= v == 6;
        }

        assert!(seen_min && seen_max);
        assert_eq!(rng.between(5, 5), 5);
    }

    #[test]
    fn test_between_inverted_bounds() {
        let mut rng = DeterministicRng::new(3);
        for _ in 0..500 {
            let v = rng.between(200, 160);
            assert!((160..=200).contains(&v));
        }
    }

    #[test]
    fn test_weighted_pick_single_candidate() {
        let mut rng = DeterministicRng::new(11);
        let only = [Candidate("only", 4)];

        for _ in 0..100 {
            assert_eq!(rng.weighted_pick(&only).map(|c| c.0), Some("only"));
        }
    }

    #[test]
    fn test_weighted_pick_skips_zero_weight() {
        let mut rng = DeterministicRng::new(12);
        let candidates = [Candidate("never", 0), Candidate("always", 1)];

        for _ in 0..100 {
            assert_eq!(rng.weighted_pick(&candidates).map(|c| c.0), Some("always"));
        }
    }

    #[test]
    fn test_weighted_pick_rejects_degenerate_lists() {
        let mut rng = DeterministicRng::new(13);
        let empty: [Candidate; 0] = [];
        let zeros = [Candidate("a", 0), Candidate("b", 0)];

        assert!(rng.weighted_pick(&empty).is_none());
        assert!(rng.weighted_pick(&zeros).is_none());
    }

    #[test]
    fn test_fork_is_independent_and_deterministic() {
        let mut parent1 = DeterministicRng::new(500);
        let mut parent2 = DeterministicRng::new(500);

        let mut child1 = parent1.fork();
        let mut child2 = parent2.fork();

        assert_eq!(child1.next_u64(), child2.next_u64());
        assert_eq!(parent1.next_u64(), parent2.next_u64());
        assert_ne!(parent1.state(), child1.state());
    }

    #[test]
    fn test_state_checkpoint() {
        let mut rng = DeterministicRng::new(1234);
        rng.next_u64();

        let saved = rng.state();
        let expected = rng.next_u64();

        rng.set_state(saved);
        assert_eq!(rng.next_u64(), expected);
    }
}
