//! Frame embeddings stored as a CSV table.
//!
//! One row per frame, in pool order: the frame's file name followed by its
//! embedding values. The first line is a header (`frame,e0,e1,...`).

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::pool::{CandidateIndex, FilePool};
use crate::provider::FeatureExtractor;

#[derive(Debug, Error)]
pub enum EmbeddingTableError {
    #[error("Failed to access embedding table {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid embedding table {path} at line {line}: {reason}")]
    Parse {
        path: PathBuf,
        line: usize,
        reason: String,
    },
    #[error("Embedding row {row} has {found} values, expected {expected}")]
    Inconsistent {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("Embedding row {row} ({label}) holds a non-finite value at position {position}")]
    NonFinite {
        row: usize,
        label: String,
        position: usize,
    },
    #[error("{labels} labels for {rows} embedding rows")]
    LabelCount { labels: usize, rows: usize },
    #[error("Frame label {0:?} cannot be stored in a CSV row")]
    UnsupportedLabel(String),
}

/// Embeddings of every frame of a pool, addressable by candidate index.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingTable {
    labels: Vec<String>,
    vectors: Vec<Vec<f32>>,
}

impl EmbeddingTable {
    pub fn new(labels: Vec<String>, vectors: Vec<Vec<f32>>) -> Result<Self, EmbeddingTableError> {
        if labels.len() != vectors.len() {
            return Err(EmbeddingTableError::LabelCount {
                labels: labels.len(),
                rows: vectors.len(),
            });
        }
        if let Some(label) = labels.iter().find(|l| l.contains([',', '\n', '\r'])) {
            return Err(EmbeddingTableError::UnsupportedLabel(label.clone()));
        }
        let expected = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some((row, vector)) = vectors
            .iter()
            .enumerate()
            .find(|(_, v)| v.len() != expected)
        {
            return Err(EmbeddingTableError::Inconsistent {
                row,
                expected,
                found: vector.len(),
            });
        }
        for (row, vector) in vectors.iter().enumerate() {
            if let Some(position) = vector.iter().position(|v| !v.is_finite()) {
                return Err(EmbeddingTableError::NonFinite {
                    row,
                    label: labels[row].clone(),
                    position,
                });
            }
        }
        Ok(Self { labels, vectors })
    }

    /// Labels used for a pool's frames: their file names.
    pub fn pool_labels(pool: &FilePool) -> Vec<String> {
        pool.paths()
            .iter()
            .map(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            })
            .collect()
    }

    /// Whether the table was computed for exactly this pool, in this order.
    pub fn matches_pool(&self, pool: &FilePool) -> bool {
        self.labels == Self::pool_labels(pool)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.vectors.first().map(Vec::len).unwrap_or(0)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn vectors(&self) -> &[Vec<f32>] {
        &self.vectors
    }

    pub fn write_csv(&self, path: &Path) -> Result<(), EmbeddingTableError> {
        let mut out = String::from("frame");
        for dim in 0..self.dims() {
            let _ = write!(out, ",e{dim}");
        }
        out.push('\n');
        for (label, vector) in self.labels.iter().zip(&self.vectors) {
            out.push_str(label);
            for value in vector {
                let _ = write!(out, ",{value}");
            }
            out.push('\n');
        }
        std::fs::write(path, out).map_err(|source| EmbeddingTableError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read_csv(path: &Path) -> Result<Self, EmbeddingTableError> {
        let text = std::fs::read_to_string(path).map_err(|source| EmbeddingTableError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let parse_err = |line: usize, reason: String| EmbeddingTableError::Parse {
            path: path.to_path_buf(),
            line,
            reason,
        };
        let mut lines = text.lines().enumerate();
        match lines.next() {
            Some((_, header)) if header.starts_with("frame") => {}
            _ => return Err(parse_err(1, "missing header".to_string())),
        }
        let mut labels = Vec::new();
        let mut vectors = Vec::new();
        for (number, line) in lines {
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split(',');
            let label = fields.next().unwrap_or_default().to_string();
            let vector = fields
                .map(|field| {
                    field
                        .trim()
                        .parse::<f32>()
                        .map_err(|err| parse_err(number + 1, format!("{field:?}: {err}")))
                })
                .collect::<Result<Vec<_>, _>>()?;
            labels.push(label);
            vectors.push(vector);
        }
        Self::new(labels, vectors)
    }
}

impl FeatureExtractor for EmbeddingTable {
    fn extract(&self, index: CandidateIndex) -> Result<Vec<f32>, String> {
        self.vectors
            .get(index)
            .cloned()
            .ok_or_else(|| format!("no embedding row for index {index}"))
    }
}
