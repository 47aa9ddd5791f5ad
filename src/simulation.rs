use nalgebra::{DMatrix, DVector, RealField};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, StandardNormal};

use crate::error::{Error, Result};
use crate::models::LinearGaussianModel;
use crate::utils::mvn::MultiVariateNormal;

/// Starting point of the hidden state in the 2-D rotation scenario
pub const DEFAULT_INITIAL_STATE: [f64; 2] = [10.0, -10.0];

/// Hidden states and their noisy observations, one pair per time step
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory<T: RealField> {
    states: Vec<DVector<T>>,
    observations: Vec<DVector<T>>,
}

impl<T: RealField> Trajectory<T> {
    pub fn states(&self) -> &[DVector<T>] {
        &self.states
    }

    pub fn observations(&self) -> &[DVector<T>] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DVector<T>, &DVector<T>)> {
        self.states.iter().zip(self.observations.iter())
    }
}

/// Samples `n` steps of `model` starting from `initial_state` with a
/// `StdRng` seeded from `seed`.
pub fn generate<T>(
    seed: u64,
    model: &LinearGaussianModel<T>,
    initial_state: &DVector<T>,
    n: usize,
) -> Result<Trajectory<T>>
where
    T: RealField + Copy,
    StandardNormal: Distribution<T>,
{
    let mut rng = StdRng::seed_from_u64(seed);
    generate_with_rng(&mut rng, model, initial_state, n)
}

/// Every shape is validated before the first draw from `rng`.
pub fn generate_with_rng<T, R>(
    rng: &mut R,
    model: &LinearGaussianModel<T>,
    initial_state: &DVector<T>,
    n: usize,
) -> Result<Trajectory<T>>
where
    T: RealField + Copy,
    R: Rng + ?Sized,
    StandardNormal: Distribution<T>,
{
    model.check_state(initial_state, "initial state")?;
    let process_noise = noise(model.q(), "process noise Q")?;
    let observation_noise = noise(model.p(), "observation noise P")?;

    let mut states = Vec::with_capacity(n);
    let mut observations = Vec::with_capacity(n);
    let mut previous = initial_state.clone();
    for _ in 0..n {
        let state = model.transition(&previous) + process_noise.sample(rng);
        let observation = model.observe(&state) + observation_noise.sample(rng);
        observations.push(observation);
        states.push(state.clone());
        previous = state;
    }
    log::debug!("generated trajectory with {n} steps");

    Ok(Trajectory {
        states,
        observations,
    })
}

/// Zero-mean sampler for `covariance`, errors name the operand
fn noise<T: RealField + Copy>(covariance: &DMatrix<T>, what: &str) -> Result<MultiVariateNormal<T>> {
    MultiVariateNormal::new(&DVector::zeros(covariance.nrows()), covariance).map_err(|e| match e {
        Error::InvalidCovariance { min_eigenvalue, .. } => Error::InvalidCovariance {
            what: what.to_string(),
            min_eigenvalue,
        },
        other => other,
    })
}
