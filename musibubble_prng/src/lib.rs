// Seeded 32-bit linear congruential generator for reward composition.
//
// `state' = state * 1664525 + 1013904223 (mod 2^32)`, the Numerical Recipes
// constants. An LCG is enough here: the composer needs a modest number of
// draws per reward (template pick, style choices, the mixed-style melody
// walk, counter-melody gating) and no statistical strength beyond that. In
// exchange the whole state is one `u32`, so the seed printed in a
// sequence's metadata is all it takes to replay a reward exactly.
//
// `musibubble_reward` threads a single `Lcg32` through the pipeline by
// `&mut`; there is no global generator. The step is wrapping integer
// arithmetic only, and floats are derived from the state but never fed
// back into it, so streams match bit for bit across platforms and builds.

use serde::{Deserialize, Serialize};

/// LCG multiplier (Numerical Recipes).
const MULTIPLIER: u32 = 1_664_525;

/// LCG increment (Numerical Recipes).
const INCREMENT: u32 = 1_013_904_223;

/// 2^32 as a float, the divisor that maps the state into [0, 1).
const STATE_SPAN: f64 = 4_294_967_296.0;

/// Seeded 32-bit linear congruential generator.
///
/// Two generators created from the same seed produce identical streams.
/// `seed()` reports the value the generator was created (or last reseeded)
/// with, which is what callers record for reproduction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lcg32 {
    seed: u32,
    state: u32,
}

impl Lcg32 {
    /// Create a new generator from a `u32` seed.
    pub fn new(seed: u32) -> Self {
        Self { seed, state: seed }
    }

    /// The seed this generator started from.
    pub fn seed(&self) -> u32 {
        self.seed
    }

    /// Restart the stream from a new seed.
    pub fn reseed(&mut self, seed: u32) {
        self.seed = seed;
        self.state = seed;
    }

    /// Advance the state and return it.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self
            .state
            .wrapping_mul(MULTIPLIER)
            .wrapping_add(INCREMENT);
        self.state
    }

    /// Generate a uniform `f64` in [0, 1).
    pub fn next_f64(&mut self) -> f64 {
        self.next_u32() as f64 / STATE_SPAN
    }

    /// Generate a uniform value in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    pub fn range_f64(&mut self, low: f64, high: f64) -> f64 {
        assert!(low < high, "range_f64: low must be less than high");
        low + self.next_f64() * (high - low)
    }

    /// Generate a uniform integer in `[low, high]` (inclusive on both ends).
    ///
    /// Computed as `floor(r * (high - low + 1)) + low`, so every value in the
    /// range is reachable. Panics if `low > high`.
    pub fn range_i32_inclusive(&mut self, low: i32, high: i32) -> i32 {
        assert!(low <= high, "range_i32_inclusive: low must be <= high");
        let span = (high as i64 - low as i64 + 1) as f64;
        let offset = (self.next_f64() * span).floor() as i64;
        (low as i64 + offset) as i32
    }

    /// Generate a uniform `usize` in `[low, high]` (inclusive on both ends).
    ///
    /// Panics if `low > high`.
    pub fn range_usize_inclusive(&mut self, low: usize, high: usize) -> usize {
        assert!(low <= high, "range_usize_inclusive: low must be <= high");
        let span = (high - low + 1) as f64;
        low + (self.next_f64() * span).floor() as usize
    }

    /// Pick one element uniformly. Returns `None` for an empty slice and
    /// does not advance the state in that case.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.range_usize_inclusive(0, items.len() - 1);
        items.get(idx)
    }

    /// Shuffle a slice in place (Fisher–Yates, from the back).
    pub fn shuffle<T>(&mut self, items: &mut [T]) {
        for i in (1..items.len()).rev() {
            let j = self.range_usize_inclusive(0, i);
            items.swap(i, j);
        }
    }

    /// Return `true` with probability `p`.
    ///
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }
}
