use nalgebra::{DMatrix, DVector, RealField};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::inference::BayesianFilter;
use crate::models::LinearGaussianModel;
use crate::utils::spd_inverse;
use crate::utils::state::GaussianState;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// S is singular when its smallest eigenvalue is below
    /// `singular_tolerance * max(1, largest eigenvalue)`.
    /// An S whose entries are all below it counts as zero.
    pub singular_tolerance: f64,
    /// Relative tolerance on negative eigenvalues of produced covariances
    pub psd_tolerance: f64,
    /// Relative tolerance on the innovation when S is zero
    pub innovation_tolerance: f64,
    /// Symmetrize every predicted and posterior covariance
    pub symmetrize: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        FilterConfig {
            singular_tolerance: 1e-12,
            psd_tolerance: 1e-9,
            innovation_tolerance: 1e-6,
            symmetrize: true,
        }
    }
}

/// Outcome of correcting one predicted belief with one observation
#[derive(Debug, Clone)]
pub struct Update<T: RealField> {
    pub posterior: GaussianState<T>,
    /// z - B * x_pred
    pub innovation: DVector<T>,
    /// S = B * P_pred * B^T + P
    pub innovation_cov: DMatrix<T>,
    pub gain: DMatrix<T>,
    /// Negative log marginal likelihood of the innovation under N(0, S)
    pub surprise: T,
}

/// Predicted and filtered beliefs of a forward pass, in time order
#[derive(Debug, Clone)]
pub struct FilterResult<T: RealField> {
    predicted: Vec<GaussianState<T>>,
    filtered: Vec<GaussianState<T>>,
    surprises: Vec<T>,
}

impl<T: RealField + Copy> FilterResult<T> {
    fn with_capacity(n: usize) -> FilterResult<T> {
        FilterResult {
            predicted: Vec::with_capacity(n),
            filtered: Vec::with_capacity(n),
            surprises: Vec::with_capacity(n),
        }
    }

    /// p(x_i | z_1..z_{i-1})
    pub fn predicted(&self) -> &[GaussianState<T>] {
        &self.predicted
    }

    /// p(x_i | z_1..z_i)
    pub fn filtered(&self) -> &[GaussianState<T>] {
        &self.filtered
    }

    pub fn surprises(&self) -> &[T] {
        &self.surprises
    }

    /// Sum of the per-step surprises, -ln p(z_1..z_n)
    pub fn free_energy(&self) -> T {
        self.surprises.iter().fold(T::zero(), |acc, s| acc + *s)
    }

    pub fn len(&self) -> usize {
        self.filtered.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filtered.is_empty()
    }

    pub fn into_filtered(self) -> Vec<GaussianState<T>> {
        self.filtered
    }
}

/// x_pred = A * x, P_pred = A * P * A^T + Q
pub fn predict<T: RealField + Copy>(
    model: &LinearGaussianModel<T>,
    belief: &GaussianState<T>,
) -> GaussianState<T> {
    let a = model.a();
    GaussianState {
        x: a * &belief.x,
        cov: a * &belief.cov * a.transpose() + model.q(),
    }
}

pub fn update<T: RealField + Copy>(
    model: &LinearGaussianModel<T>,
    predicted: &GaussianState<T>,
    z: &DVector<T>,
    config: &FilterConfig,
    step: usize,
) -> Result<Update<T>> {
    model.check_observation(z, step)?;
    let n = model.state_dim();
    let m = model.observation_dim();
    let half: T = nalgebra::convert(0.5);
    let b = model.b();

    let innovation = z - b * &predicted.x;
    let innovation_cov = b * &predicted.cov * b.transpose() + model.p();
    let innovation_cov = (&innovation_cov + innovation_cov.transpose()) * half;

    if innovation_cov.amax() <= nalgebra::convert(config.singular_tolerance) {
        // the predicted observation is certain, nothing to correct
        let scale = z.amax().max(T::one());
        if innovation.amax() > nalgebra::convert::<f64, T>(config.innovation_tolerance) * scale {
            return Err(Error::SingularMatrix { step });
        }
        return Ok(Update {
            posterior: predicted.clone(),
            innovation,
            innovation_cov,
            gain: DMatrix::zeros(n, m),
            surprise: T::zero(),
        });
    }

    let Some((s_inv, log_det)) = spd_inverse(&innovation_cov, config.singular_tolerance) else {
        return Err(Error::SingularMatrix { step });
    };
    let gain = &predicted.cov * b.transpose() * &s_inv;
    let x = &predicted.x + &gain * &innovation;
    // Joseph form, PSD up to rounding even when (I - K * B) nearly vanishes
    let residual = DMatrix::identity(n, n) - &gain * b;
    let cov = &residual * &predicted.cov * residual.transpose()
        + &gain * model.p() * gain.transpose();

    let mut posterior = GaussianState { x, cov };
    let reference = predicted.cov.amax();
    if config.symmetrize {
        let asymmetry = posterior.symmetrize();
        let scale = reference.max(T::one());
        if asymmetry > nalgebra::convert::<f64, T>(config.psd_tolerance) * scale {
            log::warn!("step {step}: removed covariance asymmetry of {asymmetry:?}");
        }
    }
    posterior.check_psd(config.psd_tolerance, reference, step)?;

    let mahalanobis = (innovation.transpose() * &s_inv * &innovation)[(0, 0)];
    let dim: T = nalgebra::convert(m as f64);
    let surprise = (dim * T::two_pi().ln() + log_det + mahalanobis) * half;
    log::trace!("step {step}: innovation {:?}, surprise {surprise:?}", innovation.as_slice());

    Ok(Update {
        posterior,
        innovation,
        innovation_cov,
        gain,
        surprise,
    })
}

fn check_prior<T: RealField + Copy>(
    model: &LinearGaussianModel<T>,
    prior: &GaussianState<T>,
    config: &FilterConfig,
) -> Result<()> {
    model.check_state(&prior.x, "prior mean")?;
    let n = model.state_dim();
    if prior.cov.shape() != (n, n) {
        return Err(Error::mismatch("prior covariance", (n, n), prior.cov.shape()));
    }
    prior.check_covariance(config.psd_tolerance, "prior covariance")
}

/// Forward pass over all observations starting from the belief `prior`
/// about the state before the first observation.
///
/// Shapes of the prior and of every observation are checked before the
/// first step is computed.
pub fn filter<T: RealField + Copy>(
    observations: &[DVector<T>],
    model: &LinearGaussianModel<T>,
    prior: &GaussianState<T>,
    config: &FilterConfig,
) -> Result<FilterResult<T>> {
    check_prior(model, prior, config)?;
    for (i, z) in observations.iter().enumerate() {
        model.check_observation(z, i + 1)?;
    }

    let mut result = FilterResult::with_capacity(observations.len());
    let mut belief = prior.clone();
    for (i, z) in observations.iter().enumerate() {
        let mut predicted = predict(model, &belief);
        if config.symmetrize {
            predicted.symmetrize();
        }
        let corrected = update(model, &predicted, z, config, i + 1)?;
        belief = corrected.posterior.clone();
        result.predicted.push(predicted);
        result.filtered.push(corrected.posterior);
        result.surprises.push(corrected.surprise);
    }
    log::debug!(
        "filtered {} steps, free energy {:?}",
        result.len(),
        result.free_energy()
    );
    Ok(result)
}

/// Streaming Kalman filter keeping only the current belief
pub struct KalmanFilter<T: RealField> {
    model: LinearGaussianModel<T>,
    config: FilterConfig,
    estimate: GaussianState<T>,
    step: usize,
    free_energy: T,
}

impl<T: RealField + Copy> KalmanFilter<T> {
    pub fn new(
        model: LinearGaussianModel<T>,
        prior: GaussianState<T>,
        config: FilterConfig,
    ) -> Result<KalmanFilter<T>> {
        check_prior(&model, &prior, &config)?;
        Ok(KalmanFilter {
            model,
            config,
            estimate: prior,
            step: 0,
            free_energy: T::zero(),
        })
    }

    /// Number of observations consumed so far
    pub fn step(&self) -> usize {
        self.step
    }

    pub fn free_energy(&self) -> T {
        self.free_energy
    }
}

impl<T: RealField + Copy> BayesianFilter<T> for KalmanFilter<T> {
    fn update_estimate(&mut self, z: &DVector<T>) -> Result<()> {
        let step = self.step + 1;
        let mut predicted = predict(&self.model, &self.estimate);
        if self.config.symmetrize {
            predicted.symmetrize();
        }
        let corrected = update(&self.model, &predicted, z, &self.config, step)?;
        self.estimate = corrected.posterior;
        self.free_energy += corrected.surprise;
        self.step = step;
        Ok(())
    }

    fn gaussian_estimate(&self) -> GaussianState<T> {
        self.estimate.clone()
    }
}
