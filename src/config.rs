//! Run configuration: TOML file values overlaid with command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::provider::default_workers;
use crate::selector::{DEFAULT_MAX_DRAW_ATTEMPTS, SelectorConfig};

/// Config file looked up in the application directory when no `--config` is given.
pub const CONFIG_FILE_NAME: &str = "maxspread.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Missing required setting `{0}`")]
    Missing(&'static str),
    #[error("Setting `{name}` must be at least 1, got {value}")]
    Zero { name: &'static str, value: usize },
}

/// Partially specified run settings, as read from a file or flags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Folder of recordings or frames.
    pub source: Option<PathBuf>,
    /// Root folder that receives the run folder.
    pub results: Option<PathBuf>,
    /// Subset size.
    pub k: Option<usize>,
    pub max_steps: Option<usize>,
    pub seed: Option<u64>,
    pub patience: Option<usize>,
    pub workers: Option<usize>,
    pub max_draw_attempts: Option<usize>,
    /// Precomputed frame embeddings (CSV) used instead of thumbnails.
    pub embeddings: Option<PathBuf>,
}

impl RunConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Load `maxspread.toml` from the application directory when it exists.
    pub fn load_default() -> Result<Option<Self>, ConfigError> {
        let Ok(dir) = crate::app_dirs::app_root_dir() else {
            return Ok(None);
        };
        let path = dir.join(CONFIG_FILE_NAME);
        if !path.is_file() {
            return Ok(None);
        }
        Self::load(&path).map(Some)
    }

    /// Values set in `overrides` replace the ones in `self`.
    pub fn overlay(self, overrides: RunConfig) -> Self {
        Self {
            source: overrides.source.or(self.source),
            results: overrides.results.or(self.results),
            k: overrides.k.or(self.k),
            max_steps: overrides.max_steps.or(self.max_steps),
            seed: overrides.seed.or(self.seed),
            patience: overrides.patience.or(self.patience),
            workers: overrides.workers.or(self.workers),
            max_draw_attempts: overrides.max_draw_attempts.or(self.max_draw_attempts),
            embeddings: overrides.embeddings.or(self.embeddings),
        }
    }

    pub fn validate(self) -> Result<RunSettings, ConfigError> {
        let source = self.source.ok_or(ConfigError::Missing("source"))?;
        let results = self.results.ok_or(ConfigError::Missing("results"))?;
        let k = self.k.ok_or(ConfigError::Missing("k"))?;
        let max_steps = self.max_steps.ok_or(ConfigError::Missing("max_steps"))?;
        let seed = self.seed.ok_or(ConfigError::Missing("seed"))?;
        let workers = self.workers.unwrap_or_else(default_workers);
        let max_draw_attempts = self.max_draw_attempts.unwrap_or(DEFAULT_MAX_DRAW_ATTEMPTS);
        for (name, value) in [
            ("k", k),
            ("workers", workers),
            ("max_draw_attempts", max_draw_attempts),
        ] {
            if value == 0 {
                return Err(ConfigError::Zero { name, value });
            }
        }
        if let Some(0) = self.patience {
            return Err(ConfigError::Zero {
                name: "patience",
                value: 0,
            });
        }
        Ok(RunSettings {
            source,
            results,
            k,
            max_steps,
            seed,
            patience: self.patience,
            workers,
            max_draw_attempts,
            embeddings: self.embeddings,
        })
    }
}

/// Fully resolved settings of one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunSettings {
    pub source: PathBuf,
    pub results: PathBuf,
    pub k: usize,
    pub max_steps: usize,
    pub seed: u64,
    pub patience: Option<usize>,
    pub workers: usize,
    pub max_draw_attempts: usize,
    pub embeddings: Option<PathBuf>,
}

impl RunSettings {
    pub fn selector_config(&self) -> SelectorConfig {
        SelectorConfig::new(self.k, self.max_steps)
            .with_patience(self.patience)
            .with_max_draw_attempts(self.max_draw_attempts)
    }
}
