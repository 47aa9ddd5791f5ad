use nalgebra::{DMatrix, RealField};

pub mod mvn;
pub mod plot;
pub mod state;

/// Inverse and log-determinant of a symmetric positive definite matrix.
///
/// Returns `None` when the smallest eigenvalue is not above
/// `tolerance * max(1, largest eigenvalue)`.
pub fn spd_inverse<T: RealField + Copy>(m: &DMatrix<T>, tolerance: f64) -> Option<(DMatrix<T>, T)> {
    let eigenvalues = m.clone().symmetric_eigenvalues();
    let largest = eigenvalues.max().max(T::one());
    if eigenvalues.min() <= nalgebra::convert::<f64, T>(tolerance) * largest {
        return None;
    }
    let cholesky = m.clone().cholesky()?;
    let log_det = cholesky
        .l_dirty()
        .diagonal()
        .iter()
        .fold(T::zero(), |acc, v| acc + (*v).ln())
        * nalgebra::convert::<f64, T>(2.0);
    Some((cholesky.inverse(), log_det))
}
