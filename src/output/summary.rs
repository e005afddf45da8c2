use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::selector::{SelectionOutcome, SelectorConfig};

use super::{OutputError, io_error};

/// Machine-readable record of one run, written as `run.json`.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    /// `"combinations"` or `"frames"`.
    pub pool: &'static str,
    pub source: &'a Path,
    pub pool_len: usize,
    pub seed: u64,
    pub selector: &'a SelectorConfig,
    /// Labels of the selection, best-separated first.
    pub selected: Vec<String>,
    pub accepted_steps: usize,
    pub outcome: &'a SelectionOutcome,
    pub files: Vec<PathBuf>,
}

pub fn write_run_summary(path: &Path, summary: &RunSummary<'_>) -> Result<(), OutputError> {
    let json = serde_json::to_string_pretty(summary).map_err(|source| OutputError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    std::fs::write(path, json).map_err(io_error(path))
}
