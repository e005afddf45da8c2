use crate::pool::CandidateIndex;

use super::{DistanceMatrix, DistanceOracle, ProviderError, pairwise_distances};

/// Oracle backed by a full `N × N` distance matrix computed up front.
#[derive(Debug, Clone)]
pub struct PrecomputedDistances {
    full: DistanceMatrix,
}

impl PrecomputedDistances {
    pub fn new(full: DistanceMatrix) -> Self {
        Self { full }
    }

    /// Full Euclidean matrix over every embedding.
    pub fn from_embeddings<V: AsRef<[f32]>>(embeddings: &[V]) -> Self {
        Self::new(pairwise_distances(embeddings))
    }

    pub fn full(&self) -> &DistanceMatrix {
        &self.full
    }
}

impl DistanceOracle for PrecomputedDistances {
    fn pool_len(&self) -> usize {
        self.full.len()
    }

    fn working_matrix(&self, subset: &[CandidateIndex]) -> Result<DistanceMatrix, ProviderError> {
        let pool_len = self.full.len();
        if let Some(&index) = subset.iter().find(|&&index| index >= pool_len) {
            return Err(ProviderError::InvalidIndex { index, pool_len });
        }
        Ok(self.full.submatrix(subset))
    }
}
