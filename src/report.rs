use std::path::Path;

use nalgebra::DVector;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::inference::FilterResult;
use crate::utils::state::GaussianState;

/// Summary of one generate / filter / smooth run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub seed: u64,
    pub steps: usize,
    /// -ln p(z_1..z_n) accumulated by the filter
    pub free_energy: f64,
    pub rmse_observations: f64,
    pub rmse_filtered: f64,
    pub rmse_smoothed: Option<f64>,
    pub final_mean: Vec<f64>,
    pub final_cov: Vec<Vec<f64>>,
}

impl RunReport {
    pub fn new(
        seed: u64,
        states: &[DVector<f64>],
        observations: &[DVector<f64>],
        filter_result: &FilterResult<f64>,
        smoothed: Option<&[GaussianState<f64>]>,
    ) -> RunReport {
        let filtered = filter_result.filtered();
        let last = smoothed.and_then(|s| s.last()).or(filtered.last());
        RunReport {
            seed,
            steps: filtered.len(),
            free_energy: filter_result.free_energy(),
            rmse_observations: rmse(states, observations.iter()),
            rmse_filtered: rmse(states, filtered.iter().map(|b| &b.x)),
            rmse_smoothed: smoothed.map(|s| rmse(states, s.iter().map(|b| &b.x))),
            final_mean: last.map(|b| b.x.iter().copied().collect()).unwrap_or_default(),
            final_cov: last
                .map(|b| b.cov.row_iter().map(|row| row.iter().copied().collect()).collect())
                .unwrap_or_default(),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

/// Root mean squared euclidean distance between hidden states and estimates.
/// Estimates whose dimension differs from the states are skipped.
pub fn rmse<'a, I>(states: &[DVector<f64>], estimates: I) -> f64
where
    I: IntoIterator<Item = &'a DVector<f64>>,
{
    let (sum, count) = states
        .iter()
        .zip(estimates)
        .filter(|(x, e)| x.len() == e.len())
        .fold((0.0, 0usize), |(sum, count), (x, e)| {
            (sum + (x - e).norm_squared(), count + 1)
        });
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::{filter, FilterConfig};
    use crate::models::LinearGaussianModel;
    use nalgebra::{dmatrix, dvector};

    #[test]
    fn rmse_of_known_errors() {
        let states = vec![dvector![0.0, 0.0], dvector![1.0, 1.0]];
        let estimates = vec![dvector![3.0, 4.0], dvector![1.0, 1.0]];
        // squared errors 25 and 0
        approx::assert_abs_diff_eq!(12.5_f64.sqrt(), rmse(&states, &estimates), epsilon = 1e-12);
        assert_eq!(0.0, rmse(&[], &estimates));
    }

    #[test]
    fn report_serializes_to_json() {
        let model =
            LinearGaussianModel::new(dmatrix![1.0], dmatrix![1.0], dmatrix![1.0], dmatrix![1.0])
                .unwrap();
        let prior = GaussianState::new(dvector![0.0], dmatrix![1.0]).unwrap();
        let states = vec![dvector![0.5], dvector![1.0]];
        let observations = vec![dvector![1.0], dvector![1.0]];
        let result = filter(&observations, &model, &prior, &FilterConfig::default()).unwrap();

        let report = RunReport::new(3, &states, &observations, &result, None);
        assert_eq!(2, report.steps);
        approx::assert_abs_diff_eq!(7.0 / 8.0, report.final_mean[0], epsilon = 1e-12);
        assert!(report.rmse_smoothed.is_none());

        let json = report.to_json().unwrap();
        assert!(json.contains("\"free_energy\""));
        let parsed: RunReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.steps, parsed.steps);
        assert_eq!(report.seed, parsed.seed);
    }
}
