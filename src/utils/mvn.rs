use nalgebra::{DMatrix, DVector, RealField};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};

use crate::error::{Error, Result};

/// Eigenvalues below `-PSD_TOLERANCE * max(1, largest eigenvalue)` are rejected.
const PSD_TOLERANCE: f64 = 1e-9;

pub struct MultiVariateNormal<T: RealField> {
    mean: DVector<T>,
    /// L such that L * L^T = covariance
    sqrt_cov: DMatrix<T>,
    /// only available when the covariance is positive definite
    precision: Option<DMatrix<T>>,
    log_factor: Option<T>,
}

impl<T: RealField + Copy> MultiVariateNormal<T> {
    pub fn new(mean: &DVector<T>, covariance: &DMatrix<T>) -> Result<Self> {
        let d = mean.len();
        if covariance.shape() != (d, d) {
            return Err(Error::mismatch("covariance", (d, d), covariance.shape()));
        }

        if let Some(covariance_cholesky) = covariance.clone().cholesky() {
            let l = covariance_cholesky.l();
            let log_det = l
                .diagonal()
                .iter()
                .fold(T::zero(), |acc, v| acc + (*v).ln())
                * nalgebra::convert::<f64, T>(2.0);
            let dim: T = nalgebra::convert(d as f64);
            let log_factor = -(dim * T::two_pi().ln() + log_det) * nalgebra::convert::<f64, T>(0.5);
            return Ok(MultiVariateNormal {
                mean: mean.clone(),
                precision: Some(covariance_cholesky.inverse()),
                sqrt_cov: l,
                log_factor: Some(log_factor),
            });
        }

        // semi-definite: matrix square root from the eigen decomposition
        let eigen = covariance.clone().symmetric_eigen();
        let largest = eigen.eigenvalues.max().max(T::one());
        let smallest = eigen.eigenvalues.min();
        if smallest < -(nalgebra::convert::<f64, T>(PSD_TOLERANCE) * largest) {
            return Err(Error::InvalidCovariance {
                what: "covariance".to_string(),
                min_eigenvalue: nalgebra::try_convert(smallest).unwrap_or(f64::NAN),
            });
        }
        let roots = eigen.eigenvalues.map(|v| v.max(T::zero()).sqrt());
        let sqrt_cov = eigen.eigenvectors * DMatrix::from_diagonal(&roots);
        Ok(MultiVariateNormal {
            mean: mean.clone(),
            sqrt_cov,
            precision: None,
            log_factor: None,
        })
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> &DVector<T> {
        &self.mean
    }

    /// Draws exactly `dim` standard normals from `rng`.
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> DVector<T>
    where
        StandardNormal: Distribution<T>,
    {
        let xi = DVector::from_fn(self.dim(), |_, _| rng.sample(StandardNormal));
        &self.mean + &self.sqrt_cov * xi
    }

    /// Log probability density function, `None` for a degenerate covariance
    pub fn log_pdf(&self, x: &DVector<T>) -> Option<T> {
        let precision = self.precision.as_ref()?;
        let log_factor = self.log_factor?;
        let dx = x - &self.mean;
        let interior = (dx.transpose() * precision * &dx)[(0, 0)];
        Some(log_factor - interior * nalgebra::convert::<f64, T>(0.5))
    }

    /// Probability density function
    pub fn pdf(&self, x: &DVector<T>) -> Option<T> {
        self.log_pdf(x).map(|v| v.exp())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::{dmatrix, dvector};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn standard_normal_log_pdf_at_mean() {
        let mvn = MultiVariateNormal::new(&dvector![0.0, 0.0], &DMatrix::identity(2, 2)).unwrap();
        let expected = -(2.0 * std::f64::consts::PI).ln();
        approx::assert_abs_diff_eq!(expected, mvn.log_pdf(&dvector![0.0, 0.0]).unwrap(), epsilon = 1e-12);
        approx::assert_abs_diff_eq!(
            expected - 0.5 * 2.0,
            mvn.log_pdf(&dvector![1.0, 1.0]).unwrap(),
            epsilon = 1e-12
        );
        approx::assert_abs_diff_eq!(
            1.0 / (2.0 * std::f64::consts::PI),
            mvn.pdf(&dvector![0.0, 0.0]).unwrap(),
            epsilon = 1e-12
        );
        assert_eq!(&dvector![0.0, 0.0], mvn.mean());
    }

    #[test]
    fn sample_moments_match_covariance() {
        let mean = dvector![1.0, -2.0];
        let cov = dmatrix![2.0, 0.6; 0.6, 1.0];
        let mvn = MultiVariateNormal::new(&mean, &cov).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        let n = 20_000;
        let samples: Vec<DVector<f64>> = (0..n).map(|_| mvn.sample(&mut rng)).collect();
        let sample_mean = samples.iter().sum::<DVector<f64>>() / n as f64;
        let sample_cov = samples
            .iter()
            .map(|s| (s - &sample_mean) * (s - &sample_mean).transpose())
            .sum::<DMatrix<f64>>()
            / (n - 1) as f64;

        approx::assert_abs_diff_eq!(mean, sample_mean, epsilon = 0.05);
        approx::assert_abs_diff_eq!(cov, sample_cov, epsilon = 0.08);
    }

    #[test]
    fn zero_covariance_samples_the_mean() {
        let mean = dvector![10.0, -10.0];
        let mvn = MultiVariateNormal::new(&mean, &DMatrix::zeros(2, 2)).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(mean, mvn.sample(&mut rng));
        assert!(mvn.log_pdf(&mean).is_none());
        assert!(mvn.pdf(&mean).is_none());
    }

    #[test]
    fn rank_deficient_covariance_stays_in_its_range() {
        // all mass on the line x = y
        let mvn =
            MultiVariateNormal::new(&dvector![0.0, 0.0], &dmatrix![1.0, 1.0; 1.0, 1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let s = mvn.sample(&mut rng);
            approx::assert_abs_diff_eq!(s[0], s[1], epsilon = 1e-9);
        }
    }

    #[test]
    fn indefinite_covariance_is_rejected() {
        let result = MultiVariateNormal::new(&dvector![0.0, 0.0], &dmatrix![1.0, 2.0; 2.0, 1.0]);
        assert!(matches!(result, Err(Error::InvalidCovariance { .. })));
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let result = MultiVariateNormal::new(&dvector![0.0, 0.0], &DMatrix::<f64>::identity(3, 3));
        assert!(matches!(result, Err(Error::DimensionMismatch { .. })));
    }
}
