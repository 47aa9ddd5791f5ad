use nalgebra::{DMatrix, DVector, RealField};

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct GaussianState<T: RealField> {
    /// State Vector
    pub x: DVector<T>,
    /// Covariance Matrix
    pub cov: DMatrix<T>,
}

impl<T: RealField + Copy> GaussianState<T> {
    pub fn new(x: DVector<T>, cov: DMatrix<T>) -> Result<GaussianState<T>> {
        let d = x.len();
        if cov.shape() != (d, d) {
            return Err(Error::mismatch("belief covariance", (d, d), cov.shape()));
        }
        Ok(GaussianState { x, cov })
    }

    pub fn dim(&self) -> usize {
        self.x.len()
    }

    /// Marginal variance of every state component
    pub fn variances(&self) -> DVector<T> {
        self.cov.diagonal()
    }

    pub fn std_devs(&self) -> DVector<T> {
        self.variances().map(|v| v.max(T::zero()).sqrt())
    }

    /// Replaces the covariance by its symmetric part and returns the largest
    /// absolute asymmetry that was removed.
    pub fn symmetrize(&mut self) -> T {
        let transposed = self.cov.transpose();
        let asymmetry = (&self.cov - &transposed).amax();
        let half: T = nalgebra::convert(0.5);
        self.cov = (&self.cov + transposed) * half;
        asymmetry
    }

    pub fn min_eigenvalue(&self) -> T {
        self.cov.clone().symmetric_eigenvalues().min()
    }

    /// Smallest eigenvalue, when it is below `-tolerance * max(1, largest
    /// diagonal entry, reference)`.
    fn negative_eigenvalue(&self, tolerance: f64, reference: T) -> Option<f64> {
        let scale = self.cov.diagonal().amax().max(reference).max(T::one());
        let min_eigenvalue = self.min_eigenvalue();
        if min_eigenvalue < -(nalgebra::convert::<f64, T>(tolerance) * scale) {
            return Some(nalgebra::try_convert(min_eigenvalue).unwrap_or(f64::NAN));
        }
        None
    }

    /// Checks a covariance produced at `step`. `reference` is the magnitude
    /// of the covariance it was computed from, rounding error scales with it.
    pub fn check_psd(&self, tolerance: f64, reference: T, step: usize) -> Result<()> {
        match self.negative_eigenvalue(tolerance, reference) {
            Some(min_eigenvalue) => Err(Error::NotPositiveSemiDefinite {
                step,
                min_eigenvalue,
            }),
            None => Ok(()),
        }
    }

    /// Checks a covariance supplied by the caller.
    pub fn check_covariance(&self, tolerance: f64, what: &str) -> Result<()> {
        match self.negative_eigenvalue(tolerance, T::zero()) {
            Some(min_eigenvalue) => Err(Error::InvalidCovariance {
                what: what.to_string(),
                min_eigenvalue,
            }),
            None => Ok(()),
        }
    }
}
