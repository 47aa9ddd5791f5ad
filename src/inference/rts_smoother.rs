use nalgebra::{DMatrix, RealField};

use crate::error::{Error, Result};
use crate::inference::{FilterConfig, FilterResult};
use crate::models::LinearGaussianModel;
use crate::utils::spd_inverse;
use crate::utils::state::GaussianState;

/// Rauch-Tung-Striebel fixed-interval smoother
///
/// Refines the beliefs of a forward pass with all later observations,
/// walking backwards from the last step:
///
/// G_i = P_{i|i} * A^T * P_{i+1|i}^-1
///
/// x_{i|n} = x_{i|i} + G_i * (x_{i+1|n} - x_{i+1|i})
///
/// P_{i|n} = P_{i|i} + G_i * (P_{i+1|n} - P_{i+1|i}) * G_i^T
pub fn smooth<T: RealField + Copy>(
    model: &LinearGaussianModel<T>,
    filter_result: &FilterResult<T>,
    config: &FilterConfig,
) -> Result<Vec<GaussianState<T>>> {
    let filtered = filter_result.filtered();
    let predicted = filter_result.predicted();
    let Some(last) = filtered.last() else {
        return Err(Error::EmptySequence);
    };
    let n = filtered.len();
    let at = model.a().transpose();

    let mut smoothed = Vec::with_capacity(n);
    let mut next = last.clone();
    smoothed.push(last.clone());
    for i in (0..n - 1).rev() {
        let step = i + 1;
        let next_predicted = &predicted[i + 1];
        let predicted_inverse = invert_predicted(&next_predicted.cov, config, step)?;

        let gain = &filtered[i].cov * &at * predicted_inverse;
        let x = &filtered[i].x + &gain * (&next.x - &next_predicted.x);
        let cov = &filtered[i].cov + &gain * (&next.cov - &next_predicted.cov) * gain.transpose();

        let mut belief = GaussianState { x, cov };
        if config.symmetrize {
            belief.symmetrize();
        }
        belief.check_psd(config.psd_tolerance, filtered[i].cov.amax(), step)?;
        smoothed.push(belief.clone());
        next = belief;
    }
    smoothed.reverse();
    log::debug!("smoothed {n} steps");
    Ok(smoothed)
}

/// Predicted covariances can be singular (Q = 0 and a collapsed posterior),
/// those fall back to the pseudo-inverse.
fn invert_predicted<T: RealField + Copy>(
    cov: &DMatrix<T>,
    config: &FilterConfig,
    step: usize,
) -> Result<DMatrix<T>> {
    if let Some((inverse, _)) = spd_inverse(cov, config.singular_tolerance) {
        return Ok(inverse);
    }
    log::debug!("step {step}: predicted covariance is singular, using pseudo-inverse");
    cov.clone()
        .pseudo_inverse(nalgebra::convert(config.singular_tolerance))
        .map_err(|_| Error::SingularMatrix { step })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::filter;
    use nalgebra::{dmatrix, dvector, DVector};

    fn random_walk() -> LinearGaussianModel<f64> {
        LinearGaussianModel::new(dmatrix![1.0], dmatrix![1.0], dmatrix![1.0], dmatrix![1.0]).unwrap()
    }

    #[test]
    fn random_walk_two_steps() {
        let model = random_walk();
        let prior = GaussianState::new(dvector![0.0], dmatrix![1.0]).unwrap();
        let config = FilterConfig::default();
        let result = filter(&[dvector![1.0], dvector![1.0]], &model, &prior, &config).unwrap();

        let smoothed = smooth(&model, &result, &config).unwrap();
        assert_eq!(2, smoothed.len());
        approx::assert_abs_diff_eq!(0.75, smoothed[0].x[0], epsilon = 1e-12);
        approx::assert_abs_diff_eq!(0.5, smoothed[0].cov[(0, 0)], epsilon = 1e-12);
        assert_eq!(result.filtered()[1], smoothed[1]);
    }

    #[test]
    fn empty_result_is_rejected() {
        let model = random_walk();
        let prior = GaussianState::new(dvector![0.0], dmatrix![1.0]).unwrap();
        let config = FilterConfig::default();
        let result = filter(&[], &model, &prior, &config).unwrap();
        assert!(matches!(
            smooth(&model, &result, &config),
            Err(Error::EmptySequence)
        ));
    }

    #[test]
    fn smoothing_does_not_increase_variance() {
        let model = LinearGaussianModel::rotation(0.3, 0.5, 2.0);
        let prior = GaussianState::new(dvector![0.0, 0.0], DMatrix::identity(2, 2) * 10.0).unwrap();
        let observations: Vec<DVector<f64>> = (0..50)
            .map(|i| {
                let t = i as f64 * 0.3;
                dvector![5.0 * t.cos() + (i % 3) as f64, 5.0 * t.sin() - (i % 2) as f64]
            })
            .collect();
        let config = FilterConfig::default();
        let result = filter(&observations, &model, &prior, &config).unwrap();
        let smoothed = smooth(&model, &result, &config).unwrap();

        for (f, s) in result.filtered().iter().zip(smoothed.iter()) {
            for (vf, vs) in f.variances().iter().zip(s.variances().iter()) {
                assert!(vs <= &(vf + 1e-12), "smoothed {vs} > filtered {vf}");
            }
            assert!(s.check_psd(1e-9, 0.0, 0).is_ok());
            approx::assert_abs_diff_eq!(s.cov.clone(), s.cov.transpose(), epsilon = 1e-12);
        }
    }

    #[test]
    fn singular_predictions_fall_back_to_pseudo_inverse() {
        let model = LinearGaussianModel::new(
            DMatrix::identity(2, 2),
            DMatrix::identity(2, 2),
            DMatrix::zeros(2, 2),
            DMatrix::zeros(2, 2),
        )
        .unwrap();
        let prior = GaussianState::new(dvector![0.0, 0.0], DMatrix::identity(2, 2)).unwrap();
        let config = FilterConfig::default();
        let observations = vec![dvector![3.0, 4.0]; 3];
        let result = filter(&observations, &model, &prior, &config).unwrap();

        let smoothed = smooth(&model, &result, &config).unwrap();
        for (f, s) in result.filtered().iter().zip(smoothed.iter()) {
            approx::assert_abs_diff_eq!(f.x.clone(), s.x.clone(), epsilon = 1e-9);
            approx::assert_abs_diff_eq!(dvector![3.0, 4.0], s.x.clone(), epsilon = 1e-9);
        }
    }
}
