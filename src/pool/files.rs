use std::path::{Path, PathBuf};

use thiserror::Error;

use super::{CandidateIndex, CandidatePool};

/// Image extensions accepted as video frames.
pub const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];

#[derive(Debug, Error)]
pub enum FilePoolError {
    #[error("Failed to read folder {path}: {source}")]
    ReadDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("No files with extensions {extensions:?} found in {path}")]
    Empty {
        path: PathBuf,
        extensions: Vec<String>,
    },
}

/// Files discovered in a folder, sorted by path so indices are stable.
#[derive(Debug, Clone)]
pub struct FilePool {
    paths: Vec<PathBuf>,
}

impl FilePool {
    pub fn from_paths(mut paths: Vec<PathBuf>) -> Self {
        paths.sort();
        Self { paths }
    }

    /// Collect files directly inside `dir` whose extension matches (case-insensitive).
    pub fn discover(dir: &Path, extensions: &[&str]) -> Result<Self, FilePoolError> {
        let entries = std::fs::read_dir(dir).map_err(|source| FilePoolError::ReadDir {
            path: dir.to_path_buf(),
            source,
        })?;
        let paths = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_extension(path, extensions))
            .collect::<Vec<_>>();
        if paths.is_empty() {
            return Err(FilePoolError::Empty {
                path: dir.to_path_buf(),
                extensions: extensions.iter().map(|ext| ext.to_string()).collect(),
            });
        }
        Ok(Self::from_paths(paths))
    }

    pub fn path(&self, index: CandidateIndex) -> Option<&Path> {
        self.paths.get(index).map(PathBuf::as_path)
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl CandidatePool for FilePool {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn label(&self, index: CandidateIndex) -> Option<String> {
        self.path(index).map(|path| path.display().to_string())
    }
}

pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.iter().any(|e| ext.eq_ignore_ascii_case(e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn discover_sorts_and_filters_by_extension() {
        let dir = tempdir().unwrap();
        for name in ["b.png", "a.PNG", "c.jpg", "notes.txt"] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }
        std::fs::create_dir(dir.path().join("nested.png")).unwrap();

        let pool = FilePool::discover(dir.path(), FRAME_EXTENSIONS).unwrap();
        let names: Vec<_> = pool
            .paths()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.PNG", "b.png", "c.jpg"]);
        assert_eq!(pool.len(), 3);
        assert!(pool.label(3).is_none());
    }

    #[test]
    fn discover_reports_empty_folder() {
        let dir = tempdir().unwrap();
        let err = FilePool::discover(dir.path(), &["wav"]).unwrap_err();
        assert!(matches!(err, FilePoolError::Empty { .. }));
    }
}
