//! Seeded random-walk tracks for demos, benches and tests

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use crate::core::geodesy;
use crate::core::types::{Coordinate, LocationFix};

/// Parameters for a reproducible walk
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomWalk {
    pub seed: u64,
    pub start: Coordinate,
    pub steps: usize,
    pub step_m: f64,
    /// Chance that a fix is unusable (negative or very wide accuracy)
    pub bad_fix_rate: f64,
    pub interval_ms: i64,
}

impl RandomWalk {
    pub fn new(seed: u64, start: Coordinate, steps: usize, step_m: f64) -> Self {
        Self {
            seed,
            start,
            steps,
            step_m,
            bad_fix_rate: 0.05,
            interval_ms: 1_000,
        }
    }

    pub fn with_bad_fix_rate(mut self, rate: f64) -> Self {
        self.bad_fix_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn generate(&self) -> Vec<LocationFix> {
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut here = self.start;
        let mut bearing: f64 = rng.gen_range(0.0..360.0);
        let mut fixes = Vec::with_capacity(self.steps);

        for i in 0..self.steps {
            let accuracy = if rng.gen_bool(self.bad_fix_rate) {
                if rng.gen_bool(0.5) {
                    -1.0
                } else {
                    rng.gen_range(600.0..1500.0)
                }
            } else {
                rng.gen_range(3.0..30.0)
            };
            fixes.push(LocationFix::new(here.lat, here.lon, accuracy, i as i64 * self.interval_ms));

            // Gentle heading drift so the track wanders instead of zigzagging
            bearing = (bearing + rng.gen_range(-30.0..30.0)).rem_euclid(360.0);
            let next = geodesy::destination(here, bearing, self.step_m);
            here = Coordinate::new(next.lat.clamp(-89.9, 89.9), next.lon);
        }

        tracing::debug!("Generated {} fixes from seed {}", fixes.len(), self.seed);
        fixes
    }
}

/// Default walk: 5% bad fixes, one fix per second
pub fn random_walk(seed: u64, start: Coordinate, steps: usize, step_m: f64) -> Vec<LocationFix> {
    RandomWalk::new(seed, start, steps, step_m).generate()
}
