//! Random source for the simulation
//!
//! Every random draw the engine makes (phase durations, density drift, flow
//! samples, demo population) goes through one [`SimRng`]. Seed it for
//! reproducible runs; use OS entropy in production.

use std::ops::Range;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

#[derive(Debug, Clone)]
pub struct SimRng(StdRng);

impl SimRng {
    /// Create a deterministic RNG; the same seed always yields the same run
    pub fn seeded(seed: u64) -> Self {
        SimRng(StdRng::seed_from_u64(seed))
    }

    /// Create an RNG seeded from operating system entropy
    pub fn from_entropy() -> Self {
        SimRng(StdRng::from_os_rng())
    }

    /// Uniform draw from a half-open range. An empty range yields its start.
    pub fn random_range(&mut self, range: Range<f32>) -> f32 {
        if range.start >= range.end {
            return range.start;
        }
        self.0.random_range(range)
    }

    /// Uniform draw from a closed range `[-magnitude, magnitude]`
    pub fn symmetric(&mut self, magnitude: f32) -> f32 {
        if magnitude <= 0.0 {
            return 0.0;
        }
        self.0.random_range(-magnitude..=magnitude)
    }

    /// Uniform integer draw from a half-open range
    pub fn random_count(&mut self, range: Range<u32>) -> u32 {
        if range.start >= range.end {
            return range.start;
        }
        self.0.random_range(range)
    }

    /// Choose a random element from a slice
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        slice.choose(&mut self.0)
    }
}
