//! Greedy eject-and-replace search for a maximally spread-out subset.
//!
//! The search keeps a working subset of `k` candidates and its masked distance
//! matrix. Each step evicts one member of the closest pair, draws a
//! replacement from the whole pool and keeps the proposal only when the
//! minimum pairwise distance strictly improves.

mod sampler;

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::pool::CandidateIndex;
use crate::provider::{DistanceMatrix, DistanceOracle, ProviderError};

pub use sampler::{IndexSampler, SeededSampler};

/// Default number of draws per step before extraction failures become fatal.
pub const DEFAULT_MAX_DRAW_ATTEMPTS: usize = 16;

/// Search parameters. Every value is explicit; nothing is read from globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SelectorConfig {
    /// Target subset size `k`.
    pub subset_size: usize,
    /// Attempted improvement steps, accepted or not.
    pub max_steps: usize,
    /// Draws allowed within one step while the provider keeps failing.
    pub max_draw_attempts: usize,
    /// Stop after this many consecutive steps without an accepted move.
    pub patience: Option<usize>,
}

impl SelectorConfig {
    pub fn new(subset_size: usize, max_steps: usize) -> Self {
        Self {
            subset_size,
            max_steps,
            max_draw_attempts: DEFAULT_MAX_DRAW_ATTEMPTS,
            patience: None,
        }
    }

    pub fn with_patience(mut self, patience: Option<usize>) -> Self {
        self.patience = patience;
        self
    }

    pub fn with_max_draw_attempts(mut self, attempts: usize) -> Self {
        self.max_draw_attempts = attempts.max(1);
        self
    }
}

/// Phase of a search run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectorState {
    Initializing,
    Improving { step: usize },
    Terminated,
}

/// Stage a selector failure happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStage {
    Initialization,
    Improvement,
}

impl fmt::Display for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchStage::Initialization => f.write_str("initialization"),
            SearchStage::Improvement => f.write_str("improvement"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectorError {
    #[error("Subset size must be at least 1")]
    EmptySubset,
    #[error("Pool of {pool_len} candidates is smaller than the requested subset of {requested}")]
    InsufficientPoolSize { pool_len: usize, requested: usize },
    #[error("Candidate index {index} is outside the pool of {pool_len} during {stage}")]
    InvalidIndex {
        stage: SearchStage,
        index: CandidateIndex,
        pool_len: usize,
    },
    #[error("Sampler returned candidate {index} twice for the initial subset")]
    DuplicateInitialIndex { index: CandidateIndex },
    #[error("Feature extraction failed for candidate {candidate} during initialization: {reason}")]
    Initialization {
        candidate: CandidateIndex,
        reason: String,
    },
    #[error(
        "Feature extraction failed {attempts} times during improvement step {step}; last candidate {candidate}: {reason}"
    )]
    DrawAttemptsExhausted {
        step: usize,
        attempts: usize,
        candidate: CandidateIndex,
        reason: String,
    },
}

impl SelectorError {
    pub fn stage(&self) -> SearchStage {
        match self {
            SelectorError::InvalidIndex { stage, .. } => *stage,
            SelectorError::DrawAttemptsExhausted { .. } => SearchStage::Improvement,
            _ => SearchStage::Initialization,
        }
    }
}

/// What happened to a proposal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepOutcome {
    Accepted,
    Rejected,
    /// The draw was already a member; nothing was evaluated.
    Duplicate,
}

/// One attempted improvement step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepRecord {
    pub step: usize,
    pub evicted_slot: usize,
    pub evicted: CandidateIndex,
    pub candidate: CandidateIndex,
    pub proposed_score: Option<f32>,
    pub outcome: StepOutcome,
    /// Best score after this step.
    pub best_score: f32,
    /// Draws discarded because the provider failed on them.
    pub retries: usize,
}

/// Result of a completed search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelectionOutcome {
    pub initial_subset: Vec<CandidateIndex>,
    pub initial_score: f32,
    /// Final subset in slot order.
    pub subset: Vec<CandidateIndex>,
    /// Final subset, best-separated member first.
    pub ordered: Vec<CandidateIndex>,
    /// Own minimum distance of each entry of `ordered`.
    pub ordered_min_distances: Vec<f32>,
    pub best_score: f32,
    pub steps_run: usize,
    pub stopped_early: bool,
    pub trajectory: Vec<StepRecord>,
    /// Candidates the provider failed on during improvement.
    pub failed_candidates: Vec<CandidateIndex>,
}

impl SelectionOutcome {
    pub fn accepted_steps(&self) -> usize {
        self.trajectory
            .iter()
            .filter(|record| record.outcome == StepOutcome::Accepted)
            .count()
    }
}

/// Runs the search against any distance oracle.
#[derive(Debug, Clone, Copy)]
pub struct DiversitySelector {
    config: SelectorConfig,
}

impl DiversitySelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    pub fn select<O, S>(&self, oracle: &O, sampler: &mut S) -> Result<SelectionOutcome, SelectorError>
    where
        O: DistanceOracle + ?Sized,
        S: IndexSampler + ?Sized,
    {
        let pool_len = oracle.pool_len();
        let k = self.config.subset_size;
        if k == 0 {
            return Err(SelectorError::EmptySubset);
        }
        if pool_len < k {
            return Err(SelectorError::InsufficientPoolSize {
                pool_len,
                requested: k,
            });
        }

        let mut search = Search {
            config: &self.config,
            oracle,
            sampler,
            pool_len,
            subset: Vec::new(),
            matrix: empty_matrix(),
            best_score: 0.0,
            initial_subset: Vec::new(),
            initial_score: 0.0,
            trajectory: Vec::new(),
            failed_candidates: Vec::new(),
            stale_steps: 0,
        };

        let mut state = SelectorState::Initializing;
        let mut stopped_early = false;
        loop {
            state = match state {
                SelectorState::Initializing => {
                    search.initialize()?;
                    if k < 2 {
                        tracing::info!("Subset of one candidate has no pairs to improve");
                        SelectorState::Terminated
                    } else {
                        SelectorState::Improving { step: 0 }
                    }
                }
                SelectorState::Improving { step } if step >= self.config.max_steps => {
                    SelectorState::Terminated
                }
                SelectorState::Improving { step } => {
                    search.step(step)?;
                    if self
                        .config
                        .patience
                        .is_some_and(|patience| search.stale_steps >= patience)
                    {
                        tracing::info!(
                            "Stopping after step {step}: {} consecutive steps without improvement",
                            search.stale_steps
                        );
                        stopped_early = true;
                        SelectorState::Terminated
                    } else {
                        SelectorState::Improving { step: step + 1 }
                    }
                }
                SelectorState::Terminated => break,
            };
        }
        Ok(search.finish(stopped_early))
    }
}

fn empty_matrix() -> DistanceMatrix {
    crate::provider::pairwise_distances::<Vec<f32>>(&[])
}

/// Slot to evict from the closest pair of a masked matrix.
///
/// The pair is the first minimum in row-major order. The second member is
/// evicted only when its own row minimum is strictly smaller.
pub fn eviction_slot(masked: &DistanceMatrix) -> Option<usize> {
    let (a, b) = masked.argmin()?;
    if masked.row_min(b) < masked.row_min(a) {
        Some(b)
    } else {
        Some(a)
    }
}

/// Slots ordered by descending own minimum distance.
///
/// Equal distances keep the higher slot first.
pub fn presentation_order(masked: &DistanceMatrix) -> Vec<usize> {
    let mins: Vec<f32> = (0..masked.len()).map(|slot| masked.row_min(slot)).collect();
    let mut order: Vec<usize> = (0..masked.len()).collect();
    order.sort_by(|&a, &b| mins[a].total_cmp(&mins[b]).then(a.cmp(&b)));
    order.reverse();
    order
}

struct Search<'a, O: ?Sized, S: ?Sized> {
    config: &'a SelectorConfig,
    oracle: &'a O,
    sampler: &'a mut S,
    pool_len: usize,
    subset: Vec<CandidateIndex>,
    matrix: DistanceMatrix,
    best_score: f32,
    initial_subset: Vec<CandidateIndex>,
    initial_score: f32,
    trajectory: Vec<StepRecord>,
    failed_candidates: Vec<CandidateIndex>,
    stale_steps: usize,
}

impl<O, S> Search<'_, O, S>
where
    O: DistanceOracle + ?Sized,
    S: IndexSampler + ?Sized,
{
    fn initialize(&mut self) -> Result<(), SelectorError> {
        let subset = self
            .sampler
            .sample_distinct(self.pool_len, self.config.subset_size);
        for (position, &index) in subset.iter().enumerate() {
            self.check_index(index, SearchStage::Initialization)?;
            if subset[..position].contains(&index) {
                return Err(SelectorError::DuplicateInitialIndex { index });
            }
        }
        if subset.len() != self.config.subset_size {
            return Err(SelectorError::InsufficientPoolSize {
                pool_len: subset.len(),
                requested: self.config.subset_size,
            });
        }
        let matrix = self
            .oracle
            .working_matrix(&subset)
            .map_err(|err| match err {
                ProviderError::InvalidIndex { index, pool_len } => SelectorError::InvalidIndex {
                    stage: SearchStage::Initialization,
                    index,
                    pool_len,
                },
                ProviderError::FeatureExtraction { candidate, reason } => {
                    SelectorError::Initialization { candidate, reason }
                }
            })?
            .with_masked_diagonal();
        self.best_score = matrix.min_value();
        self.initial_score = self.best_score;
        self.initial_subset = subset.clone();
        self.subset = subset;
        self.matrix = matrix;
        tracing::info!(
            "Initial subset {:?} with min distance {}",
            self.subset,
            self.best_score
        );
        Ok(())
    }

    fn step(&mut self, step: usize) -> Result<(), SelectorError> {
        let Some(evicted_slot) = eviction_slot(&self.matrix) else {
            return Ok(());
        };
        let evicted = self.subset[evicted_slot];
        let mut retries = 0usize;
        loop {
            let candidate = self.sampler.draw(self.pool_len);
            self.check_index(candidate, SearchStage::Improvement)?;

            if self.subset.contains(&candidate) {
                tracing::debug!("Step {step}: candidate {candidate} is already selected");
                let outcome = StepOutcome::Duplicate;
                self.record(step, evicted_slot, evicted, candidate, None, outcome, retries);
                return Ok(());
            }

            let mut proposal = self.subset.clone();
            proposal[evicted_slot] = candidate;
            match self.oracle.working_matrix(&proposal) {
                Ok(matrix) => {
                    let matrix = matrix.with_masked_diagonal();
                    let score = matrix.min_value();
                    let outcome = if score > self.best_score {
                        tracing::info!(
                            "Step {step}: replaced {evicted} with {candidate}; min distance {} -> {score}",
                            self.best_score
                        );
                        self.subset = proposal;
                        self.matrix = matrix;
                        self.best_score = score;
                        StepOutcome::Accepted
                    } else {
                        tracing::debug!(
                            "Step {step}: rejected {candidate} (min distance {score} <= {})",
                            self.best_score
                        );
                        StepOutcome::Rejected
                    };
                    let proposed = Some(score);
                    self.record(step, evicted_slot, evicted, candidate, proposed, outcome, retries);
                    return Ok(());
                }
                Err(ProviderError::FeatureExtraction {
                    candidate: failed,
                    reason,
                }) => {
                    retries += 1;
                    self.failed_candidates.push(failed);
                    tracing::warn!(
                        "Step {step}: feature extraction failed for candidate {failed} ({reason}); drawing again"
                    );
                    if retries >= self.config.max_draw_attempts {
                        return Err(SelectorError::DrawAttemptsExhausted {
                            step,
                            attempts: retries,
                            candidate: failed,
                            reason,
                        });
                    }
                }
                Err(ProviderError::InvalidIndex { index, pool_len }) => {
                    return Err(SelectorError::InvalidIndex {
                        stage: SearchStage::Improvement,
                        index,
                        pool_len,
                    });
                }
            }
        }
    }

    fn record(
        &mut self,
        step: usize,
        evicted_slot: usize,
        evicted: CandidateIndex,
        candidate: CandidateIndex,
        proposed_score: Option<f32>,
        outcome: StepOutcome,
        retries: usize,
    ) {
        if outcome == StepOutcome::Accepted {
            self.stale_steps = 0;
        } else {
            self.stale_steps += 1;
        }
        self.trajectory.push(StepRecord {
            step,
            evicted_slot,
            evicted,
            candidate,
            proposed_score,
            outcome,
            best_score: self.best_score,
            retries,
        });
    }

    fn check_index(&self, index: CandidateIndex, stage: SearchStage) -> Result<(), SelectorError> {
        if index >= self.pool_len {
            return Err(SelectorError::InvalidIndex {
                stage,
                index,
                pool_len: self.pool_len,
            });
        }
        Ok(())
    }

    fn finish(self, stopped_early: bool) -> SelectionOutcome {
        let order = presentation_order(&self.matrix);
        let ordered = order.iter().map(|&slot| self.subset[slot]).collect();
        let ordered_min_distances = order
            .iter()
            .map(|&slot| self.matrix.row_min(slot))
            .collect();
        tracing::info!(
            "Final subset {:?} with min distance {} after {} steps",
            self.subset,
            self.best_score,
            self.trajectory.len()
        );
        SelectionOutcome {
            initial_subset: self.initial_subset,
            initial_score: self.initial_score,
            subset: self.subset,
            ordered,
            ordered_min_distances,
            best_score: self.best_score,
            steps_run: self.trajectory.len(),
            stopped_early,
            trajectory: self.trajectory,
            failed_candidates: self.failed_candidates,
        }
    }
}
