//! Feature vectors and pairwise distances for candidate subsets.

mod cache;
mod matrix;
mod precomputed;
mod warmup;

use std::collections::BTreeMap;
use std::sync::Arc;

use thiserror::Error;

use crate::pool::CandidateIndex;

pub use matrix::{DIAGONAL_SENTINEL, DistanceMatrix, euclidean, pairwise_distances};
pub use precomputed::PrecomputedDistances;
pub use warmup::default_workers;

pub(crate) use warmup::parallel_map;

pub(crate) use cache::OnceCache;

/// Immutable feature vector shared between the cache and its readers.
pub type FeatureVector = Arc<[f32]>;

/// Errors surfaced by distance providers.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    /// A requested index lies outside the pool.
    #[error("Candidate index {index} is outside the pool of {pool_len} candidates")]
    InvalidIndex {
        index: CandidateIndex,
        pool_len: usize,
    },
    /// The extractor could not produce a feature vector for a candidate.
    #[error("Feature extraction failed for candidate {candidate}: {reason}")]
    FeatureExtraction {
        candidate: CandidateIndex,
        reason: String,
    },
}

/// Produces the feature vector of a single candidate.
///
/// Implementations must be pure functions of the index so results can be
/// cached and computed from several threads.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, index: CandidateIndex) -> Result<Vec<f32>, String>;
}

impl<F> FeatureExtractor for F
where
    F: Fn(CandidateIndex) -> Result<Vec<f32>, String> + Send + Sync,
{
    fn extract(&self, index: CandidateIndex) -> Result<Vec<f32>, String> {
        self(index)
    }
}

/// Distances among the members of a working subset.
pub trait DistanceOracle {
    fn pool_len(&self) -> usize;

    /// Unmasked `k × k` matrix for `subset`, in subset order.
    fn working_matrix(&self, subset: &[CandidateIndex]) -> Result<DistanceMatrix, ProviderError>;
}

/// Outcome of a cache warm-up pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WarmUpReport {
    pub computed: usize,
    pub failed: Vec<(CandidateIndex, String)>,
}

/// Lazily extracted, cached feature vectors with Euclidean distances.
pub struct DistanceProvider<E> {
    extractor: E,
    pool_len: usize,
    cache: OnceCache<CandidateIndex, FeatureVector>,
}

impl<E: FeatureExtractor> DistanceProvider<E> {
    pub fn new(extractor: E, pool_len: usize) -> Self {
        Self {
            extractor,
            pool_len,
            cache: OnceCache::default(),
        }
    }

    pub fn extractor(&self) -> &E {
        &self.extractor
    }

    /// Feature vector of one candidate, computed on first request.
    pub fn feature(&self, index: CandidateIndex) -> Result<FeatureVector, ProviderError> {
        self.check_index(index)?;
        self.cache
            .get_or_compute(&index, || {
                let vector = self.extractor.extract(index)?;
                if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
                    return Err(format!(
                        "non-finite value {} at position {position}",
                        vector[position]
                    ));
                }
                Ok(FeatureVector::from(vector))
            })
            .map_err(|reason| ProviderError::FeatureExtraction {
                candidate: index,
                reason,
            })
    }

    /// Feature vectors for a set of candidates.
    pub fn features_for(
        &self,
        indices: &[CandidateIndex],
    ) -> Result<BTreeMap<CandidateIndex, FeatureVector>, ProviderError> {
        indices
            .iter()
            .map(|&index| self.feature(index).map(|vector| (index, vector)))
            .collect()
    }

    /// Populate the cache for `indices` on `workers` threads.
    ///
    /// Extraction failures are collected rather than returned so a warm-up
    /// never aborts halfway; out-of-range indices still fail fast.
    pub fn warm_up(
        &self,
        indices: &[CandidateIndex],
        workers: usize,
    ) -> Result<WarmUpReport, ProviderError> {
        for &index in indices {
            self.check_index(index)?;
        }
        let started = std::time::Instant::now();
        let results = parallel_map(indices.to_vec(), workers, |&index| {
            (index, self.feature(index))
        });
        let mut report = WarmUpReport::default();
        for (index, result) in results {
            match result {
                Ok(_) => report.computed += 1,
                Err(err) => report.failed.push((index, err.to_string())),
            }
        }
        tracing::info!(
            "Warmed {} feature vectors ({} failed) in {:.2?}",
            report.computed,
            report.failed.len(),
            started.elapsed()
        );
        Ok(report)
    }

    /// Number of candidates whose extraction has completed (successfully or not).
    pub fn cached_len(&self) -> usize {
        self.cache.len()
    }

    fn check_index(&self, index: CandidateIndex) -> Result<(), ProviderError> {
        if index >= self.pool_len {
            return Err(ProviderError::InvalidIndex {
                index,
                pool_len: self.pool_len,
            });
        }
        Ok(())
    }
}

impl<E: FeatureExtractor> DistanceOracle for DistanceProvider<E> {
    fn pool_len(&self) -> usize {
        self.pool_len
    }

    fn working_matrix(&self, subset: &[CandidateIndex]) -> Result<DistanceMatrix, ProviderError> {
        let mut vectors = Vec::with_capacity(subset.len());
        for &index in subset {
            let vector = self.feature(index)?;
            if let Some(first) = vectors.first().map(|v: &FeatureVector| v.len()) {
                if vector.len() != first {
                    return Err(ProviderError::FeatureExtraction {
                        candidate: index,
                        reason: format!(
                            "feature length mismatch: expected {first}, got {}",
                            vector.len()
                        ),
                    });
                }
            }
            vectors.push(vector);
        }
        Ok(pairwise_distances(&vectors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn position(index: CandidateIndex) -> Result<Vec<f32>, String> {
        Ok(vec![index as f32])
    }

    #[test]
    fn features_are_extracted_once() {
        let calls = AtomicUsize::new(0);
        let provider = DistanceProvider::new(
            |index: CandidateIndex| {
                calls.fetch_add(1, Ordering::SeqCst);
                position(index)
            },
            10,
        );
        let first = provider.feature(4).unwrap();
        let second = provider.feature(4).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn features_for_maps_each_requested_index() {
        let provider = DistanceProvider::new(position, 10);
        let features = provider.features_for(&[7, 2]).unwrap();
        assert_eq!(features.keys().copied().collect::<Vec<_>>(), vec![2, 7]);
        assert_eq!(&features[&7][..], &[7.0]);
    }

    #[test]
    fn out_of_range_index_is_rejected() {
        let provider = DistanceProvider::new(position, 10);
        assert_eq!(
            provider.feature(10).unwrap_err(),
            ProviderError::InvalidIndex {
                index: 10,
                pool_len: 10
            }
        );
        assert!(provider.warm_up(&[1, 12], 2).is_err());
    }

    #[test]
    fn extraction_failure_names_the_candidate() {
        let provider = DistanceProvider::new(
            |index: CandidateIndex| {
                if index == 3 {
                    Err("missing file".to_string())
                } else {
                    position(index)
                }
            },
            10,
        );
        let err = provider.working_matrix(&[1, 3]).unwrap_err();
        assert_eq!(
            err,
            ProviderError::FeatureExtraction {
                candidate: 3,
                reason: "missing file".to_string()
            }
        );
    }

    #[test]
    fn non_finite_features_are_an_extraction_error() {
        let provider = DistanceProvider::new(
            |index: CandidateIndex| {
                if index == 2 {
                    Ok(vec![f32::NAN])
                } else {
                    position(index)
                }
            },
            10,
        );
        let err = provider.working_matrix(&[0, 2]).unwrap_err();
        assert_eq!(
            err,
            ProviderError::FeatureExtraction {
                candidate: 2,
                reason: "non-finite value NaN at position 0".to_string()
            }
        );
        assert_eq!(provider.feature(2).unwrap_err(), err);
    }

    #[test]
    fn working_matrix_is_metric_pure() {
        let provider = DistanceProvider::new(position, 10);
        let matrix = provider.working_matrix(&[2, 9, 4]).unwrap();
        assert_eq!(matrix.get(0, 0), 0.0);
        assert_eq!(matrix.get(0, 1), 7.0);
        assert_eq!(matrix.get(2, 1), 5.0);
    }

    #[test]
    fn mismatched_feature_lengths_are_an_extraction_error() {
        let provider = DistanceProvider::new(
            |index: CandidateIndex| Ok(vec![0.0; 1 + index % 2]),
            10,
        );
        let err = provider.working_matrix(&[0, 1]).unwrap_err();
        assert!(matches!(
            err,
            ProviderError::FeatureExtraction { candidate: 1, .. }
        ));
    }

    #[test]
    fn warm_up_collects_failures() {
        let provider = DistanceProvider::new(
            |index: CandidateIndex| {
                if index % 3 == 0 {
                    Err(format!("bad {index}"))
                } else {
                    position(index)
                }
            },
            12,
        );
        let indices: Vec<_> = (0..12).collect();
        let report = provider.warm_up(&indices, 4).unwrap();
        assert_eq!(report.computed, 8);
        assert_eq!(report.failed.len(), 4);
        assert_eq!(provider.cached_len(), 12);
    }
}
