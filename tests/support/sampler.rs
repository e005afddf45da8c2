use std::collections::VecDeque;

use maxspread::selector::IndexSampler;

/// Replays a fixed initial subset and a fixed sequence of draws.
pub struct ScriptedSampler {
    initial: Vec<usize>,
    draws: VecDeque<usize>,
}

impl ScriptedSampler {
    pub fn new(initial: &[usize], draws: &[usize]) -> Self {
        Self {
            initial: initial.to_vec(),
            draws: draws.iter().copied().collect(),
        }
    }
}

impl IndexSampler for ScriptedSampler {
    fn sample_distinct(&mut self, _pool_len: usize, amount: usize) -> Vec<usize> {
        self.initial.iter().copied().take(amount).collect()
    }

    fn draw(&mut self, _pool_len: usize) -> usize {
        self.draws.pop_front().expect("script ran out of draws")
    }
}
