use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::provider::DistanceMatrix;

use super::{OutputError, io_error};

/// Write a matrix as CSV with an index header row and an index column.
pub fn write_matrix_csv(path: &Path, matrix: &DistanceMatrix) -> Result<(), OutputError> {
    let n = matrix.len();
    let mut out = String::new();
    for col in 0..n {
        let _ = write!(out, ",{col}");
    }
    out.push('\n');
    for row in 0..n {
        let _ = write!(out, "{row}");
        for col in 0..n {
            let _ = write!(out, ",{}", matrix.get(row, col));
        }
        out.push('\n');
    }
    fs::write(path, out).map_err(io_error(path))
}

/// Write a matrix as raw row-major little-endian `f32` values.
pub fn write_matrix_blob(path: &Path, matrix: &DistanceMatrix) -> Result<(), OutputError> {
    fs::write(path, encode_f32_le_blob(&matrix.to_flat())).map_err(io_error(path))
}

/// Read a square matrix written by [`write_matrix_blob`].
pub fn read_matrix_blob(path: &Path) -> Result<DistanceMatrix, OutputError> {
    let blob = fs::read(path).map_err(io_error(path))?;
    let invalid = |reason: String| OutputError::Matrix {
        path: path.to_path_buf(),
        reason,
    };
    let values = decode_f32_le_blob(&blob).map_err(invalid)?;
    let side = (values.len() as f64).sqrt().round() as usize;
    if side * side != values.len() {
        return Err(invalid(format!("{} values do not form a square", values.len())));
    }
    DistanceMatrix::from_flat(side, values).ok_or_else(|| invalid("shape mismatch".to_string()))
}

fn encode_f32_le_blob(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len().saturating_mul(4));
    for &v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

fn decode_f32_le_blob(blob: &[u8]) -> Result<Vec<f32>, String> {
    if blob.len() % 4 != 0 {
        return Err("blob length is not a multiple of 4 bytes".to_string());
    }
    Ok(blob
        .chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::pairwise_distances;
    use tempfile::tempdir;

    fn matrix() -> DistanceMatrix {
        pairwise_distances(&[vec![0.0_f32], vec![3.0], vec![7.5]])
    }

    #[test]
    fn csv_has_index_header_and_column() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.csv");
        write_matrix_csv(&path, &matrix()).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines[0], ",0,1,2");
        assert_eq!(lines[1], "0,0,3,7.5");
        assert_eq!(lines[3], "2,7.5,4.5,0");
    }

    #[test]
    fn blob_reads_back_exactly() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.f32");
        write_matrix_blob(&path, &matrix()).unwrap();
        assert_eq!(fs::metadata(&path).unwrap().len(), 9 * 4);
        assert_eq!(read_matrix_blob(&path).unwrap(), matrix());
    }

    #[test]
    fn non_square_blob_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("m.f32");
        fs::write(&path, encode_f32_le_blob(&[1.0, 2.0, 3.0])).unwrap();
        assert!(matches!(
            read_matrix_blob(&path),
            Err(OutputError::Matrix { .. })
        ));
        fs::write(&path, [0u8; 5]).unwrap();
        assert!(read_matrix_blob(&path).is_err());
    }
}
