//! Dense kernels for the small (m × m, m ≤ 5) systems in the factor fit.

use crate::error::{SegError, SegResult};
use nalgebra::{linalg::Cholesky, DMatrix};
use ndarray::{Array2, ArrayView1};

fn to_dmatrix(a: &Array2<f64>) -> DMatrix<f64> {
    DMatrix::from_fn(a.nrows(), a.ncols(), |i, j| a[[i, j]])
}

fn from_dmatrix(m: &DMatrix<f64>) -> Array2<f64> {
    Array2::from_shape_fn((m.nrows(), m.ncols()), |(i, j)| m[(i, j)])
}

/// Inverse of a square matrix.
pub fn invert(a: &Array2<f64>) -> SegResult<Array2<f64>> {
    let n = a.nrows();
    if a.ncols() != n {
        return Err(SegError::ShapeMismatch { expected: n * n, actual: a.len() });
    }
    let inv = to_dmatrix(a)
        .try_inverse()
        .filter(|m| m.iter().all(|v| v.is_finite()))
        .ok_or(SegError::SingularMatrix { order: n })?;
    Ok(from_dmatrix(&inv))
}

/// log |det A| for a symmetric positive-definite A, via Cholesky.
pub fn log_det_spd(a: &Array2<f64>) -> SegResult<f64> {
    let n = a.nrows();
    let chol = Cholesky::new(to_dmatrix(a)).ok_or(SegError::SingularMatrix { order: n })?;
    let log_det = 2.0 * chol.l().diagonal().iter().map(|d| d.ln()).sum::<f64>();
    if log_det.is_finite() {
        Ok(log_det)
    } else {
        Err(SegError::SingularMatrix { order: n })
    }
}

/// Squared Euclidean distance between two rows.
pub fn squared_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Euclidean distance between two rows.
pub fn euclidean_distance(a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
    squared_distance(a, b).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn inverse_times_matrix_is_identity() {
        let a = array![[4.0, 7.0, 2.0], [3.0, 6.0, 1.0], [2.0, 5.0, 3.0]];
        let inv = invert(&a).unwrap();
        let product = a.dot(&inv);
        for i in 0..3 {
            for j in 0..3 {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((product[[i, j]] - expected).abs() < 1e-10);
            }
        }
    }

    #[test]
    fn inverse_of_non_square_is_a_shape_error() {
        let a = Array2::<f64>::zeros((2, 3));
        assert!(matches!(invert(&a), Err(SegError::ShapeMismatch { expected: 4, actual: 6 })));
    }

    #[test]
    fn log_det_matches_inverse_on_a_dense_matrix() {
        // det = 4·3 − 2·2 = 8
        let a = array![[4.0, 2.0], [2.0, 3.0]];
        assert!((log_det_spd(&a).unwrap() - 8.0f64.ln()).abs() < 1e-12);
        let inv = invert(&a).unwrap();
        assert!((inv[[0, 0]] - 3.0 / 8.0).abs() < 1e-12);
        assert!((inv[[0, 1]] + 2.0 / 8.0).abs() < 1e-12);
    }

    #[test]
    fn inverse_needs_pivoting() {
        let a = array![[0.0, 1.0], [1.0, 0.0]];
        let inv = invert(&a).unwrap();
        assert_eq!(inv, a);
    }

    #[test]
    fn singular_matrix_is_an_error() {
        let a = array![[1.0, 2.0], [2.0, 4.0]];
        assert!(matches!(invert(&a), Err(SegError::SingularMatrix { order: 2 })));
    }

    #[test]
    fn log_det_of_diagonal() {
        let a = array![[2.0, 0.0], [0.0, 8.0]];
        assert!((log_det_spd(&a).unwrap() - 16.0f64.ln()).abs() < 1e-12);
    }

    #[test]
    fn log_det_rejects_indefinite() {
        let a = array![[1.0, 2.0], [2.0, 1.0]];
        assert!(log_det_spd(&a).is_err());
    }

    #[test]
    fn distances() {
        let a = array![0.0, 3.0];
        let b = array![4.0, 0.0];
        assert_eq!(squared_distance(a.view(), b.view()), 25.0);
        assert_eq!(euclidean_distance(a.view(), b.view()), 5.0);
    }
}
