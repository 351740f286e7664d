use rand::distr::Distribution;
use rand::distr::uniform::SampleRange;
use rand::distr::uniform::SampleUniform;
use rand::distr::weighted::WeightedIndex;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use std::sync::{Mutex, MutexGuard};

/// Shared random source.
///
/// Every method locks, draws and unlocks, so no guard can be held across an
/// `.await`. Tests seed it for repeatable draws.
pub struct Dice {
    rng: Mutex<StdRng>,
}

impl Dice {
    pub fn from_os_rng() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn range<T, R>(&self, range: R) -> T
    where
        T: SampleUniform,
        R: SampleRange<T>,
    {
        self.rng().random_range(range)
    }

    // `p` must already be within 0..=1
    pub fn chance(&self, p: f64) -> bool {
        self.rng().random_bool(p)
    }

    pub fn pick<'a, T>(&self, items: &'a [T]) -> Option<&'a T> {
        items.choose(&mut *self.rng())
    }

    pub fn weighted(&self, index: &WeightedIndex<u32>) -> usize {
        index.sample(&mut *self.rng())
    }
}
