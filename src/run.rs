//! End-to-end runs: discover a pool, search it, persist the selection.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use thiserror::Error;

use crate::config::{ConfigError, RunSettings};
use crate::features::audio::{
    FluteMixExtractor, MIX_SAMPLE_RATE, VoiceBank, VoiceBankError, write_wav_pcm24,
};
use crate::features::{EmbeddingTable, EmbeddingTableError, ThumbnailExtractor};
use crate::output::{self, OutputError, RunSummary};
use crate::pool::{
    CandidateIndex, CandidatePool, Combination, CombinationError, DigitCombinations,
    FRAME_EXTENSIONS, FilePool, FilePoolError,
};
use crate::provider::{
    DistanceMatrix, DistanceOracle, DistanceProvider, PrecomputedDistances, ProviderError,
};
use crate::selector::{
    DiversitySelector, SearchStage, SeededSampler, SelectionOutcome, SelectorError,
};

/// Phase of a run an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Configuration,
    PoolDiscovery,
    Initialization,
    Improvement,
    OutputPersistence,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RunStage::Configuration => "configuration",
            RunStage::PoolDiscovery => "pool discovery",
            RunStage::Initialization => "initialization",
            RunStage::Improvement => "improvement",
            RunStage::OutputPersistence => "output persistence",
        })
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Voices(#[from] VoiceBankError),
    #[error(transparent)]
    Frames(#[from] FilePoolError),
    #[error(transparent)]
    Embeddings(#[from] EmbeddingTableError),
    #[error("Embedding table has {rows} rows for {frames} frames")]
    EmbeddingCount { rows: usize, frames: usize },
    #[error("Feature extraction failed for frame {frame}: {reason}")]
    FrameFeatures { frame: String, reason: String },
    #[error("Selected index {index} has no frame in a pool of {pool_len}")]
    MissingFrame { index: CandidateIndex, pool_len: usize },
    #[error(transparent)]
    Selection(#[from] SelectorError),
    #[error(transparent)]
    Combination(#[from] CombinationError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

impl RunError {
    pub fn stage(&self) -> RunStage {
        match self {
            RunError::Config(_) => RunStage::Configuration,
            RunError::Voices(_)
            | RunError::Frames(_)
            | RunError::Embeddings(_)
            | RunError::EmbeddingCount { .. } => RunStage::PoolDiscovery,
            RunError::FrameFeatures { .. } => RunStage::Initialization,
            RunError::Selection(err) => match err.stage() {
                SearchStage::Initialization => RunStage::Initialization,
                SearchStage::Improvement => RunStage::Improvement,
            },
            RunError::MissingFrame { .. } | RunError::Combination(_) | RunError::Output(_) => {
                RunStage::OutputPersistence
            }
        }
    }
}

/// What a finished run produced.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_dir: PathBuf,
    pub outcome: SelectionOutcome,
    /// Labels of the selection, best-separated first.
    pub selected: Vec<String>,
    /// Files written by the run.
    pub files: Vec<PathBuf>,
}

/// Select `k` six-voice mixes from the flute recordings in `settings.source`.
pub fn run_combinations(settings: &RunSettings) -> Result<RunReport, RunError> {
    let started = Instant::now();
    let bank = VoiceBank::discover(&settings.source)?;
    let pool = DigitCombinations;
    tracing::info!("There are {} combinations possible", pool.len());
    let provider = DistanceProvider::new(FluteMixExtractor::new(bank), pool.len());

    let outcome = select(settings, &provider)?;
    let ordered: Vec<Combination> = outcome
        .ordered
        .iter()
        .map(|&index| pool.combination(index))
        .collect::<Result<_, _>>()?;
    let selected: Vec<String> = ordered.iter().map(Combination::to_line).collect();
    tracing::info!("Ordered final combinations are: {selected:?}");

    let run_dir = output::combinations_run_dir(&settings.results, settings.k, settings.seed);
    output::ensure_dir(&run_dir)?;
    let mut files = Vec::new();

    let combinations_path = run_dir.join(output::COMBINATIONS_FILE);
    output::write_combinations(&combinations_path, &ordered)?;
    tracing::info!("Final combinations saved at {}", combinations_path.display());
    files.push(combinations_path);

    let parameters_path = run_dir.join(output::PARAMETERS_FILE);
    output::write_parameters(&parameters_path, &ordered)?;
    tracing::info!("Final parameters saved at {}", parameters_path.display());
    files.push(parameters_path);

    let sound_dir = run_dir.join(output::SELECTED_SOUND_DIR);
    output::ensure_dir(&sound_dir)?;
    for (n, combination) in ordered.iter().enumerate() {
        let path = sound_dir.join(output::selected_sound_name(n, combination));
        provider
            .extractor()
            .mix(combination)
            .and_then(|mix| write_wav_pcm24(&path, &mix, MIX_SAMPLE_RATE))
            .map_err(|reason| OutputError::Audio {
                path: path.clone(),
                reason,
            })?;
        files.push(path);
    }

    let final_matrix = provider
        .working_matrix(&outcome.ordered)
        .map_err(|err| OutputError::Matrix {
            path: run_dir.join(output::FINAL_MATRIX_STEM),
            reason: err.to_string(),
        })?;
    files.extend(write_matrix_pair(&run_dir, output::FINAL_MATRIX_STEM, &final_matrix)?);

    finish(
        settings,
        "combinations",
        pool.len(),
        run_dir,
        outcome,
        selected,
        files,
        started,
    )
}

/// Select `k` frames from the images in `settings.source`.
pub fn run_frames(settings: &RunSettings) -> Result<RunReport, RunError> {
    let started = Instant::now();
    let pool = FilePool::discover(&settings.source, FRAME_EXTENSIONS)?;
    tracing::info!(
        "Found {} frames in {}",
        pool.len(),
        settings.source.display()
    );
    output::ensure_dir(&settings.results)?;

    let (table, reused) = frame_embeddings(settings, &pool)?;
    tracing::info!(
        "Embeddings are {} x {}",
        table.len(),
        table.dims()
    );
    let oracle = full_distances(&settings.results, &table, reused)?;

    let outcome = select(settings, &oracle)?;
    let frames = frame_paths(&pool, &outcome.subset)?;
    let selected = frame_paths(&pool, &outcome.ordered)?
        .iter()
        .map(|frame| frame.display().to_string())
        .collect();
    for frame in &frames {
        tracing::info!("{}", frame.display());
    }

    let run_dir = output::frames_run_dir(
        &settings.results,
        settings.k,
        settings.max_steps,
        settings.seed,
    );
    let mut files = output::copy_frames(&run_dir, &frames)?;
    let list_path = run_dir.join(output::SELECTED_FRAMES_FILE);
    output::write_selected_frames(&list_path, &frames)?;
    files.push(list_path);

    finish(
        settings,
        "frames",
        pool.len(),
        run_dir,
        outcome,
        selected,
        files,
        started,
    )
}

fn frame_paths(pool: &FilePool, indices: &[CandidateIndex]) -> Result<Vec<PathBuf>, RunError> {
    indices
        .iter()
        .map(|&index| {
            pool.path(index)
                .map(Path::to_path_buf)
                .ok_or(RunError::MissingFrame {
                    index,
                    pool_len: pool.len(),
                })
        })
        .collect()
}

fn select<O: DistanceOracle>(
    settings: &RunSettings,
    oracle: &O,
) -> Result<SelectionOutcome, SelectorError> {
    let selector = DiversitySelector::new(settings.selector_config());
    let mut sampler = SeededSampler::new(settings.seed);
    selector.select(oracle, &mut sampler)
}

/// Embeddings of every frame: supplied table, cached table, or thumbnails.
///
/// The flag is true when a cached table from an earlier run was reused.
fn frame_embeddings(
    settings: &RunSettings,
    pool: &FilePool,
) -> Result<(EmbeddingTable, bool), RunError> {
    if let Some(path) = &settings.embeddings {
        tracing::info!("Loading embeddings from {}", path.display());
        let table = EmbeddingTable::read_csv(path)?;
        if table.len() != pool.len() {
            return Err(RunError::EmbeddingCount {
                rows: table.len(),
                frames: pool.len(),
            });
        }
        if !table.matches_pool(pool) {
            tracing::warn!("Embedding labels differ from frame names; rows are used in frame order");
        }
        return Ok((table, false));
    }

    let cache_path = settings.results.join(output::FRAME_EMBEDDINGS_FILE);
    if cache_path.is_file() {
        match EmbeddingTable::read_csv(&cache_path) {
            Ok(table) if table.matches_pool(pool) => {
                tracing::info!("Loading embeddings from {}", cache_path.display());
                return Ok((table, true));
            }
            Ok(_) => tracing::info!("Cached embeddings belong to other frames; recomputing"),
            Err(err) => tracing::warn!("Ignoring unreadable embedding cache: {err}"),
        }
    }

    let provider = DistanceProvider::new(ThumbnailExtractor::new(pool), pool.len());
    let all: Vec<CandidateIndex> = (0..pool.len()).collect();
    let frame_error = |index: CandidateIndex, reason: String| RunError::FrameFeatures {
        frame: pool.label(index).unwrap_or_else(|| index.to_string()),
        reason,
    };
    let provider_error = |err: ProviderError| match err {
        ProviderError::InvalidIndex { index, .. } => frame_error(index, err.to_string()),
        ProviderError::FeatureExtraction { candidate, reason } => frame_error(candidate, reason),
    };
    let report = provider
        .warm_up(&all, settings.workers)
        .map_err(provider_error)?;
    if let Some((index, reason)) = report.failed.into_iter().next() {
        return Err(frame_error(index, reason));
    }
    let features = provider.features_for(&all).map_err(provider_error)?;
    let vectors = features.into_values().map(|v| v.to_vec()).collect();
    let table = EmbeddingTable::new(EmbeddingTable::pool_labels(pool), vectors)?;
    tracing::info!("Saving embeddings to {}", cache_path.display());
    table.write_csv(&cache_path)?;
    Ok((table, false))
}

/// Full-pool distances, read back from the results folder when still valid.
fn full_distances(
    results: &Path,
    table: &EmbeddingTable,
    reuse: bool,
) -> Result<PrecomputedDistances, RunError> {
    let blob_path = results.join(format!("{}.f32", output::FULL_MATRIX_STEM));
    if reuse && blob_path.is_file() {
        match output::read_matrix_blob(&blob_path) {
            Ok(full) if full.len() == table.len() => {
                tracing::info!("Loading distance matrix from {}", blob_path.display());
                return Ok(PrecomputedDistances::new(full));
            }
            Ok(_) => tracing::info!("Cached distance matrix has the wrong size; recomputing"),
            Err(err) => tracing::warn!("Ignoring unreadable distance matrix: {err}"),
        }
    }
    let oracle = PrecomputedDistances::from_embeddings(table.vectors());
    write_matrix_pair(results, output::FULL_MATRIX_STEM, oracle.full())?;
    Ok(oracle)
}

fn write_matrix_pair(
    dir: &Path,
    stem: &str,
    matrix: &DistanceMatrix,
) -> Result<[PathBuf; 2], OutputError> {
    let csv = dir.join(format!("{stem}.csv"));
    let blob = dir.join(format!("{stem}.f32"));
    output::write_matrix_csv(&csv, matrix)?;
    output::write_matrix_blob(&blob, matrix)?;
    tracing::info!("Distance matrix saved at {} and {}", csv.display(), blob.display());
    Ok([csv, blob])
}

#[allow(clippy::too_many_arguments)]
fn finish(
    settings: &RunSettings,
    pool_kind: &'static str,
    pool_len: usize,
    run_dir: PathBuf,
    outcome: SelectionOutcome,
    selected: Vec<String>,
    mut files: Vec<PathBuf>,
    started: Instant,
) -> Result<RunReport, RunError> {
    let summary_path = run_dir.join(output::RUN_SUMMARY_FILE);
    files.push(summary_path.clone());
    let selector = settings.selector_config();
    let summary = RunSummary {
        pool: pool_kind,
        source: &settings.source,
        pool_len,
        seed: settings.seed,
        selector: &selector,
        selected: selected.clone(),
        accepted_steps: outcome.accepted_steps(),
        outcome: &outcome,
        files: files.clone(),
    };
    output::write_run_summary(&summary_path, &summary)?;
    tracing::info!(
        "Run finished in {:.2?}: min distance {} -> {} ({} of {} steps accepted), results in {}",
        started.elapsed(),
        outcome.initial_score,
        outcome.best_score,
        outcome.accepted_steps(),
        outcome.steps_run,
        run_dir.display()
    );
    Ok(RunReport {
        run_dir,
        outcome,
        selected,
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_render_as_words() {
        assert_eq!(RunStage::PoolDiscovery.to_string(), "pool discovery");
        assert_eq!(RunStage::OutputPersistence.to_string(), "output persistence");
    }

    #[test]
    fn errors_map_to_their_stage() {
        let missing: RunError = ConfigError::Missing("seed").into();
        assert_eq!(missing.stage(), RunStage::Configuration);
        let voices: RunError = VoiceBankError::MissingVoice { voice: 4 }.into();
        assert_eq!(voices.stage(), RunStage::PoolDiscovery);
        let init: RunError = SelectorError::Initialization {
            candidate: 3,
            reason: "corrupt".into(),
        }
        .into();
        assert_eq!(init.stage(), RunStage::Initialization);
        let exhausted: RunError = SelectorError::DrawAttemptsExhausted {
            step: 2,
            attempts: 16,
            candidate: 5,
            reason: "corrupt".into(),
        }
        .into();
        assert_eq!(exhausted.stage(), RunStage::Improvement);
        let output: RunError = OutputError::Combination {
            path: "x".into(),
            line: 1,
            source: CombinationError::OutOfRange {
                index: 1,
                space: 1,
            },
        }
        .into();
        assert_eq!(output.stage(), RunStage::OutputPersistence);
    }

    #[test]
    fn frame_paths_follow_the_given_indices() {
        let pool = FilePool::from_paths(vec!["f/b.png".into(), "f/a.png".into(), "f/c.png".into()]);
        let paths = frame_paths(&pool, &[2, 0]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("f/c.png"), PathBuf::from("f/a.png")]);

        let err = frame_paths(&pool, &[1, 3]).unwrap_err();
        assert!(matches!(err, RunError::MissingFrame { index: 3, pool_len: 3 }));
        assert_eq!(err.stage(), RunStage::OutputPersistence);
    }
}
