//! Result folders and the files written into them.

mod matrix;
mod summary;

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::pool::{Combination, CombinationError};

pub use matrix::{read_matrix_blob, write_matrix_blob, write_matrix_csv};
pub use summary::{RunSummary, write_run_summary};

/// Selected combinations, best-separated first.
pub const COMBINATIONS_FILE: &str = "ordered_final_combinations.txt";
/// Parameter recipes of the selected combinations, same order.
pub const PARAMETERS_FILE: &str = "ordered_final_parameters.txt";
/// Folder of rendered mixes inside a combinations run.
pub const SELECTED_SOUND_DIR: &str = "selected_sound";
/// Selected frame paths, one per line.
pub const SELECTED_FRAMES_FILE: &str = "selected_frames.txt";
/// Working matrix of the final subset, without extension.
pub const FINAL_MATRIX_STEM: &str = "final_distance_matrix";
/// Full-pool embedding cache of a frames run.
pub const FRAME_EMBEDDINGS_FILE: &str = "frame_embeddings.csv";
/// Full-pool distance matrix of a frames run, without extension.
pub const FULL_MATRIX_STEM: &str = "emb_distance_matrix";
pub const RUN_SUMMARY_FILE: &str = "run.json";

#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid line {line} in {path}: {source}")]
    Combination {
        path: PathBuf,
        line: usize,
        source: CombinationError,
    },
    #[error("Invalid matrix file {path}: {reason}")]
    Matrix { path: PathBuf, reason: String },
    #[error("Failed to serialize {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to render {path}: {reason}")]
    Audio { path: PathBuf, reason: String },
}

pub(crate) fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> OutputError + '_ {
    move |source| OutputError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// `<results>/NBFINALCOMBS_{k}_SEED_{seed}`
pub fn combinations_run_dir(results: &Path, k: usize, seed: u64) -> PathBuf {
    results.join(format!("NBFINALCOMBS_{k}_SEED_{seed}"))
}

/// `<results>/selected_images_NBIMAGES_{k}_MAXNBSTEPS_{steps}_SEED_{seed}`
pub fn frames_run_dir(results: &Path, k: usize, max_steps: usize, seed: u64) -> PathBuf {
    results.join(format!(
        "selected_images_NBIMAGES_{k}_MAXNBSTEPS_{max_steps}_SEED_{seed}"
    ))
}

/// File name of the `n`-th rendered mix.
pub fn selected_sound_name(n: usize, combination: &Combination) -> String {
    format!(
        "selected_sound_nb_{n}_combination_{}.wav",
        combination.compact()
    )
}

pub fn ensure_dir(dir: &Path) -> Result<(), OutputError> {
    fs::create_dir_all(dir).map_err(io_error(dir))
}

pub fn write_combinations(path: &Path, combinations: &[Combination]) -> Result<(), OutputError> {
    write_lines(path, combinations.iter().map(Combination::to_line))
}

pub fn read_combinations(path: &Path) -> Result<Vec<Combination>, OutputError> {
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(number, line)| {
            Combination::parse_line(line).map_err(|source| OutputError::Combination {
                path: path.to_path_buf(),
                line: number + 1,
                source,
            })
        })
        .collect()
}

pub fn write_parameters(path: &Path, combinations: &[Combination]) -> Result<(), OutputError> {
    write_lines(path, combinations.iter().map(Combination::parameters))
}

pub fn write_selected_frames(path: &Path, frames: &[PathBuf]) -> Result<(), OutputError> {
    write_lines(path, frames.iter().map(|frame| frame.display().to_string()))
}

pub fn read_selected_frames(path: &Path) -> Result<Vec<PathBuf>, OutputError> {
    let text = fs::read_to_string(path).map_err(io_error(path))?;
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(PathBuf::from)
        .collect())
}

/// Copy `frames` into `dir`, keeping their file names.
pub fn copy_frames(dir: &Path, frames: &[PathBuf]) -> Result<Vec<PathBuf>, OutputError> {
    ensure_dir(dir)?;
    let mut copied = Vec::with_capacity(frames.len());
    for frame in frames {
        let name = frame.file_name().ok_or_else(|| OutputError::Io {
            path: frame.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "no file name"),
        })?;
        let target = dir.join(name);
        fs::copy(frame, &target).map_err(io_error(frame))?;
        copied.push(target);
    }
    Ok(copied)
}

fn write_lines<I>(path: &Path, lines: I) -> Result<(), OutputError>
where
    I: IntoIterator<Item = String>,
{
    let mut text = String::new();
    for line in lines {
        text.push_str(&line);
        text.push('\n');
    }
    fs::write(path, text).map_err(io_error(path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn combos() -> Vec<Combination> {
        vec![
            Combination::from_digits([9, 0, 7, 1, 5, 3]).unwrap(),
            Combination::from_digits([0, 0, 0, 0, 0, 1]).unwrap(),
        ]
    }

    #[test]
    fn run_dirs_follow_naming_scheme() {
        let root = Path::new("results");
        assert_eq!(
            combinations_run_dir(root, 10, 42),
            Path::new("results/NBFINALCOMBS_10_SEED_42")
        );
        assert_eq!(
            frames_run_dir(root, 5, 1000, 7),
            Path::new("results/selected_images_NBIMAGES_5_MAXNBSTEPS_1000_SEED_7")
        );
    }

    #[test]
    fn sound_name_uses_compact_digits() {
        assert_eq!(
            selected_sound_name(3, &combos()[0]),
            "selected_sound_nb_3_combination_907153.wav"
        );
    }

    #[test]
    fn combinations_file_is_comma_joined_lines() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(COMBINATIONS_FILE);
        write_combinations(&path, &combos()).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "9,0,7,1,5,3\n0,0,0,0,0,1\n"
        );
        assert_eq!(read_combinations(&path).unwrap(), combos());
    }

    #[test]
    fn malformed_combination_line_is_located() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(COMBINATIONS_FILE);
        fs::write(&path, "1,2,3,4,5,6\n1,2,3\n").unwrap();
        let err = read_combinations(&path).unwrap_err();
        assert!(matches!(err, OutputError::Combination { line: 2, .. }));
    }

    #[test]
    fn parameters_follow_digit_table() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(PARAMETERS_FILE);
        write_parameters(&path, &combos()[1..]).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "0.05 0 0.05 0 0.05 0 0.05 0 0.05 0 0.05 0.25\n"
        );
    }

    #[test]
    fn frames_are_copied_and_listed() {
        let source = tempdir().unwrap();
        let target = tempdir().unwrap();
        let frames: Vec<PathBuf> = ["f_2.png", "f_1.png"]
            .iter()
            .map(|name| {
                let path = source.path().join(name);
                fs::write(&path, name.as_bytes()).unwrap();
                path
            })
            .collect();
        let out_dir = target.path().join("selected");
        let copied = copy_frames(&out_dir, &frames).unwrap();
        assert_eq!(fs::read(&copied[0]).unwrap(), b"f_2.png");

        let list = out_dir.join(SELECTED_FRAMES_FILE);
        write_selected_frames(&list, &frames).unwrap();
        assert_eq!(read_selected_frames(&list).unwrap(), frames);
    }
}
