use nalgebra::{DVector, RealField};

use crate::error::Result;
use crate::utils::state::GaussianState;

/// Recursive estimator consuming one observation at a time
pub trait BayesianFilter<T: RealField> {
    fn update_estimate(&mut self, z: &DVector<T>) -> Result<()>;

    fn gaussian_estimate(&self) -> GaussianState<T>;
}
