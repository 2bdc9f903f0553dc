//! Randomized allocate/free decisions.
//!
//! The generator borrows a caller-owned RNG and draws one sample per call.
//! Nothing is materialized up front; the caller pulls as many samples as it
//! has iterations. Reproducibility comes entirely from how the caller seeds
//! (and re-seeds) the RNG.

use crate::size_class::{self, NUM_SIZE_CLASSES};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Seed used by the default run.
pub const DEFAULT_SEED: u64 = 0x5eed_a110c;

/// One iteration's worth of decisions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WorkloadSample {
    /// Request size, always one of the workload size classes.
    pub size: usize,
    /// Free the block in the same iteration it was allocated.
    pub free_now: bool,
}

/// Build the workload RNG from a seed.
pub fn seeded_rng(seed: u64) -> SmallRng {
    SmallRng::seed_from_u64(seed)
}

/// Lazy stream of [`WorkloadSample`]s over a borrowed RNG.
pub struct WorkloadGenerator<'r, R: Rng> {
    rng: &'r mut R,
}

impl<'r, R: Rng> WorkloadGenerator<'r, R> {
    pub fn new(rng: &'r mut R) -> Self {
        Self { rng }
    }

    /// Draw the next sample: a uniform size class and an independent coin flip.
    #[inline]
    pub fn sample(&mut self) -> WorkloadSample {
        let cls = self.rng.gen_range(0..NUM_SIZE_CLASSES);
        let free_now = self.rng.gen_bool(0.5);
        WorkloadSample {
            size: size_class::class_to_size(cls),
            free_now,
        }
    }
}

impl<R: Rng> Iterator for WorkloadGenerator<'_, R> {
    type Item = WorkloadSample;

    #[inline]
    fn next(&mut self) -> Option<WorkloadSample> {
        Some(self.sample())
    }
}
