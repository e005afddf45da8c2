//! Square distance matrices and the minimum searches the selector runs on them.

use ndarray::Array2;

use crate::pool::CandidateIndex;

/// Value written on the diagonal so self-distance never wins a minimum search.
pub const DIAGONAL_SENTINEL: f32 = 1e9;

/// Square, row-major matrix of pairwise distances.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    values: Array2<f32>,
}

impl DistanceMatrix {
    /// Wrap a square array; returns `None` for non-square input.
    pub fn from_array(values: Array2<f32>) -> Option<Self> {
        let (rows, cols) = values.dim();
        (rows == cols).then_some(Self { values })
    }

    /// Build from a flat row-major buffer of `len * len` values.
    pub fn from_flat(len: usize, flat: Vec<f32>) -> Option<Self> {
        Array2::from_shape_vec((len, len), flat)
            .ok()
            .map(|values| Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        self.values[[row, col]]
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.values
    }

    /// Row-major copy of every entry.
    pub fn to_flat(&self) -> Vec<f32> {
        self.values.iter().copied().collect()
    }

    /// Copy with the diagonal replaced by [`DIAGONAL_SENTINEL`].
    pub fn with_masked_diagonal(&self) -> Self {
        let mut values = self.values.clone();
        values.diag_mut().fill(DIAGONAL_SENTINEL);
        Self { values }
    }

    /// Smallest entry, or the sentinel for an empty matrix. NaN if any entry is NaN.
    pub fn min_value(&self) -> f32 {
        self.argmin()
            .map(|(row, col)| self.get(row, col))
            .unwrap_or(DIAGONAL_SENTINEL)
    }

    /// Position of the first minimum in row-major scan order.
    ///
    /// A NaN entry wins outright so the score it yields is never an improvement.
    pub fn argmin(&self) -> Option<(usize, usize)> {
        let mut best: Option<((usize, usize), f32)> = None;
        for ((row, col), &value) in self.values.indexed_iter() {
            if value.is_nan() {
                return Some((row, col));
            }
            if best.is_none_or(|(_, current)| value < current) {
                best = Some(((row, col), value));
            }
        }
        best.map(|(pos, _)| pos)
    }

    /// Smallest entry of one row, NaN if the row holds one.
    pub fn row_min(&self, row: usize) -> f32 {
        self.values
            .row(row)
            .iter()
            .copied()
            .fold(f32::INFINITY, |min, v| if v.is_nan() || v < min { v } else { min })
    }

    /// Rows and columns of `indices`, in that order.
    pub fn submatrix(&self, indices: &[CandidateIndex]) -> Self {
        let len = indices.len();
        let values = Array2::from_shape_fn((len, len), |(i, j)| {
            self.values[[indices[i], indices[j]]]
        });
        Self { values }
    }
}

/// Euclidean distance between two equally long vectors.
pub fn euclidean(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut sum = 0.0_f64;
    for (x, y) in a.iter().zip(b) {
        let diff = (*x - *y) as f64;
        sum += diff * diff;
    }
    sum.sqrt() as f32
}

/// `D[i][j] = ||v_i - v_j||_2` with a zero diagonal.
pub fn pairwise_distances<V: AsRef<[f32]>>(vectors: &[V]) -> DistanceMatrix {
    let len = vectors.len();
    let mut values = Array2::<f32>::zeros((len, len));
    for i in 0..len {
        for j in (i + 1)..len {
            let d = euclidean(vectors[i].as_ref(), vectors[j].as_ref());
            values[[i, j]] = d;
            values[[j, i]] = d;
        }
    }
    DistanceMatrix { values }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn pairwise_distances_are_symmetric_with_zero_diagonal() {
        let vectors = vec![vec![0.0_f32, 0.0], vec![3.0, 4.0], vec![6.0, 8.0]];
        let matrix = pairwise_distances(&vectors);
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix.get(0, 1), 5.0);
        assert_eq!(matrix.get(1, 0), 5.0);
        assert_eq!(matrix.get(0, 2), 10.0);
        for i in 0..3 {
            assert_eq!(matrix.get(i, i), 0.0);
        }
    }

    #[test]
    fn masked_minimum_ignores_self_distance() {
        let matrix = pairwise_distances(&[vec![0.0_f32], vec![2.0], vec![7.0]]);
        assert_eq!(matrix.min_value(), 0.0);
        let masked = matrix.with_masked_diagonal();
        assert_eq!(masked.get(1, 1), DIAGONAL_SENTINEL);
        assert_eq!(masked.min_value(), 2.0);
    }

    #[test]
    fn argmin_takes_first_minimum_in_row_major_order() {
        let matrix = DistanceMatrix::from_array(array![
            [9.0_f32, 4.0, 1.0],
            [4.0, 9.0, 1.0],
            [1.0, 1.0, 9.0]
        ])
        .unwrap();
        assert_eq!(matrix.argmin(), Some((0, 2)));
    }

    #[test]
    fn nan_entries_poison_the_minimum() {
        let matrix = DistanceMatrix::from_array(array![
            [DIAGONAL_SENTINEL, 1.0, 4.0],
            [1.0, DIAGONAL_SENTINEL, f32::NAN],
            [4.0, f32::NAN, DIAGONAL_SENTINEL]
        ])
        .unwrap();
        assert_eq!(matrix.argmin(), Some((1, 2)));
        assert!(matrix.min_value().is_nan());
        assert!(matrix.row_min(1).is_nan());
        assert!(matrix.row_min(2).is_nan());
        assert_eq!(matrix.row_min(0), 1.0);
    }

    #[test]
    fn submatrix_follows_index_order() {
        let full = pairwise_distances(&[vec![0.0_f32], vec![1.0], vec![3.0], vec![6.0]]);
        let sub = full.submatrix(&[3, 1]);
        assert_eq!(sub.to_flat(), vec![0.0, 5.0, 5.0, 0.0]);
    }

    #[test]
    fn empty_matrix_minimum_is_sentinel() {
        let matrix = pairwise_distances::<Vec<f32>>(&[]);
        assert!(matrix.is_empty());
        assert_eq!(matrix.min_value(), DIAGONAL_SENTINEL);
        assert_eq!(matrix.argmin(), None);
    }

    #[test]
    fn from_array_rejects_non_square() {
        assert!(DistanceMatrix::from_array(Array2::zeros((2, 3))).is_none());
        assert!(DistanceMatrix::from_flat(2, vec![0.0; 3]).is_none());
    }
}
