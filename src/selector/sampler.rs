use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pool::CandidateIndex;

/// Source of random candidate indices for the search.
pub trait IndexSampler {
    /// `amount` distinct indices drawn uniformly from `0..pool_len`.
    fn sample_distinct(&mut self, pool_len: usize, amount: usize) -> Vec<CandidateIndex>;

    /// One index drawn uniformly from `0..pool_len`.
    fn draw(&mut self, pool_len: usize) -> CandidateIndex;
}

/// Reproducible sampler seeded from the run configuration.
#[derive(Debug, Clone)]
pub struct SeededSampler {
    rng: StdRng,
}

impl SeededSampler {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl IndexSampler for SeededSampler {
    fn sample_distinct(&mut self, pool_len: usize, amount: usize) -> Vec<CandidateIndex> {
        rand::seq::index::sample(&mut self.rng, pool_len, amount.min(pool_len)).into_vec()
    }

    fn draw(&mut self, pool_len: usize) -> CandidateIndex {
        self.rng.random_range(0..pool_len.max(1))
    }
}
