use crate::config::Scenario;
use crate::error::Result;
use crate::inference::{filter, smooth, FilterResult};
use crate::report::RunReport;
use crate::simulation::{generate, Trajectory};
use crate::utils::state::GaussianState;

/// Everything produced by one scenario run
pub struct RunOutput {
    pub trajectory: Trajectory<f64>,
    pub filter_result: FilterResult<f64>,
    pub smoothed: Option<Vec<GaussianState<f64>>>,
}

impl RunOutput {
    /// Smoothed beliefs when available, filtered ones otherwise
    pub fn beliefs(&self) -> &[GaussianState<f64>] {
        match &self.smoothed {
            Some(smoothed) => smoothed.as_slice(),
            None => self.filter_result.filtered(),
        }
    }

    pub fn report(&self, seed: u64) -> RunReport {
        RunReport::new(
            seed,
            self.trajectory.states(),
            self.trajectory.observations(),
            &self.filter_result,
            self.smoothed.as_deref(),
        )
    }
}

/// Generates the scenario's trajectory, filters it and, when enabled,
/// smooths the filtered beliefs.
pub fn run(scenario: &Scenario) -> Result<RunOutput> {
    let model = scenario.model()?;
    let prior = scenario.prior()?;
    log::info!(
        "running scenario: seed {}, {} steps, state dim {}, observation dim {}",
        scenario.seed,
        scenario.steps,
        model.state_dim(),
        model.observation_dim()
    );

    let trajectory = generate(
        scenario.seed,
        &model,
        &scenario.initial_state(),
        scenario.steps,
    )?;
    let filter_result = filter(trajectory.observations(), &model, &prior, &scenario.filter)?;
    let smoothed = if scenario.output.smooth && !filter_result.is_empty() {
        Some(smooth(&model, &filter_result, &scenario.filter)?)
    } else {
        None
    };

    Ok(RunOutput {
        trajectory,
        filter_result,
        smoothed,
    })
}
