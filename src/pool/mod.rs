//! Candidate pools addressed by dense integer indices.
//!
//! A pool never changes during a run. The selector only ever sees the pool
//! size; labels are used when logging and persisting results.

mod combinations;
mod files;

pub use combinations::{
    COMBINATION_BASE, COMBINATION_LENGTH, Combination, CombinationError, DigitCombinations,
    PARAMETER_TABLE, parameters_for_digit,
};
pub use files::{FRAME_EXTENSIONS, FilePool, FilePoolError};

pub(crate) use files::has_extension;

/// Dense index into a candidate pool, `0..pool_len`.
pub type CandidateIndex = usize;

/// An enumerable, immutable set of candidates.
pub trait CandidatePool {
    /// Number of candidates in the pool.
    fn len(&self) -> usize;

    /// Human-readable identifier for a candidate, or `None` when out of range.
    fn label(&self, index: CandidateIndex) -> Option<String>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
