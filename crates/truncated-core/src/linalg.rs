//! Small dense linear algebra helpers over `nalgebra`

use nalgebra::{DMatrix, DVector};

/// Smallest Cholesky pivot accepted as positive definite
const PIVOT_TOLERANCE: f64 = 1e-12;

/// Lower Cholesky factor of a symmetric positive definite matrix
///
/// Returns `None` when the matrix is not square, not finite, or not
/// numerically positive definite.
pub fn spd_cholesky(matrix: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    if !matrix.is_square() || matrix.iter().any(|v| !v.is_finite()) {
        return None;
    }
    let chol = matrix.clone().cholesky()?;
    let l = chol.l();
    let scale = matrix.diagonal().amax().max(1.0);
    if l.diagonal().iter().all(|&pivot| pivot > PIVOT_TOLERANCE * scale.sqrt()) {
        Some(l)
    } else {
        None
    }
}

/// Inverse of a symmetric positive definite matrix, symmetrized
pub fn spd_inverse(matrix: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let l = spd_cholesky(matrix)?;
    let n = matrix.nrows();
    let l_inv = l.solve_lower_triangular(&DMatrix::identity(n, n))?;
    Some(symmetrize(&(l_inv.transpose() * l_inv)))
}

/// Nearest symmetric matrix with every eigenvalue at least `floor`
///
/// Returns `None` for a non-square or non-finite matrix, a non-positive
/// floor, or if the rebuilt matrix still fails [`spd_cholesky`].
pub fn spd_repair(matrix: &DMatrix<f64>, floor: f64) -> Option<DMatrix<f64>> {
    if !matrix.is_square()
        || matrix.is_empty()
        || !(floor.is_finite() && floor > 0.0)
        || matrix.iter().any(|v| !v.is_finite())
    {
        return None;
    }
    let mut eigen = symmetrize(matrix).symmetric_eigen();
    for value in eigen.eigenvalues.iter_mut() {
        *value = value.max(floor);
    }
    let repaired = symmetrize(&eigen.recompose());
    spd_cholesky(&repaired).map(|_| repaired)
}

/// `(A + Aᵀ) / 2`
pub fn symmetrize(matrix: &DMatrix<f64>) -> DMatrix<f64> {
    (matrix + matrix.transpose()) * 0.5
}

/// Column means of an `n x d` sample matrix
pub fn column_means(samples: &DMatrix<f64>) -> DVector<f64> {
    DVector::from_fn(samples.ncols(), |j, _| samples.column(j).mean())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_spd_inverse() {
        let m = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        let inv = spd_inverse(&m).unwrap();
        let identity = &m * &inv;
        assert_relative_eq!(identity, DMatrix::identity(2, 2), epsilon = 1e-12);
        assert_eq!(inv, inv.transpose());
    }

    #[test]
    fn test_rejects_indefinite_and_singular() {
        let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(spd_cholesky(&indefinite).is_none());

        let singular = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, 1.0]);
        assert!(spd_inverse(&singular).is_none());

        let non_finite = DMatrix::from_row_slice(1, 1, &[f64::NAN]);
        assert!(spd_cholesky(&non_finite).is_none());

        let rectangular = DMatrix::<f64>::zeros(2, 3);
        assert!(spd_cholesky(&rectangular).is_none());
    }

    #[test]
    fn test_repair_lifts_negative_eigenvalue() {
        // eigenvalues 3 and -1 along (1, 1) and (1, -1)
        let indefinite = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        let repaired = spd_repair(&indefinite, 0.5).unwrap();
        assert_relative_eq!(
            repaired,
            DMatrix::from_row_slice(2, 2, &[1.75, 1.25, 1.25, 1.75]),
            epsilon = 1e-12
        );
        assert!(spd_cholesky(&repaired).is_some());

        let spd = DMatrix::from_row_slice(2, 2, &[4.0, 1.0, 1.0, 3.0]);
        assert_relative_eq!(spd_repair(&spd, 0.5).unwrap(), spd, epsilon = 1e-12);

        assert!(spd_repair(&indefinite, 0.0).is_none());
        assert!(spd_repair(&DMatrix::from_row_slice(1, 1, &[f64::NAN]), 0.5).is_none());
    }

    #[test]
    fn test_column_means() {
        let samples = DMatrix::from_row_slice(3, 2, &[1.0, 10.0, 2.0, 20.0, 3.0, 30.0]);
        assert_relative_eq!(column_means(&samples), DVector::from_vec(vec![2.0, 20.0]));
    }
}
