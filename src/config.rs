use std::path::{Path, PathBuf};

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::inference::FilterConfig;
use crate::models::LinearGaussianModel;
use crate::simulation::DEFAULT_INITIAL_STATE;
use crate::utils::state::GaussianState;

/// Matrices are written row by row: `a = [[1.0, 0.0], [0.0, 1.0]]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub a: Vec<Vec<f64>>,
    pub b: Vec<Vec<f64>>,
    pub q: Vec<Vec<f64>>,
    pub p: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorConfig {
    pub mean: Vec<f64>,
    pub cov: Vec<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub smooth: bool,
    pub plot: Option<PathBuf>,
    pub report: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            smooth: true,
            plot: None,
            report: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub seed: u64,
    pub steps: usize,
    #[serde(default = "default_initial_state")]
    pub initial_state: Vec<f64>,
    pub model: ModelConfig,
    pub prior: PriorConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

fn default_initial_state() -> Vec<f64> {
    DEFAULT_INITIAL_STATE.to_vec()
}

impl Scenario {
    /// Hidden state rotating by pi/35 per step, observed with variance 25
    pub fn rotation() -> Scenario {
        let theta = std::f64::consts::PI / 35.0;
        let (s, c) = theta.sin_cos();
        Scenario {
            seed: 42,
            steps: 300,
            initial_state: default_initial_state(),
            model: ModelConfig {
                a: vec![vec![c, -s], vec![s, c]],
                b: identity_rows(2, 1.0),
                q: identity_rows(2, 1.0),
                p: identity_rows(2, 25.0),
            },
            prior: PriorConfig {
                mean: vec![0.0, 0.0],
                cov: identity_rows(2, 100.0),
            },
            filter: FilterConfig::default(),
            output: OutputConfig::default(),
        }
    }

    pub fn from_toml_str(s: &str) -> Result<Scenario> {
        toml::from_str(s).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Scenario> {
        let content = std::fs::read_to_string(path)?;
        Scenario::from_toml_str(&content)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn model(&self) -> Result<LinearGaussianModel<f64>> {
        LinearGaussianModel::new(
            matrix_from_rows("model.a", &self.model.a)?,
            matrix_from_rows("model.b", &self.model.b)?,
            matrix_from_rows("model.q", &self.model.q)?,
            matrix_from_rows("model.p", &self.model.p)?,
        )
    }

    pub fn prior(&self) -> Result<GaussianState<f64>> {
        GaussianState::new(
            DVector::from_column_slice(&self.prior.mean),
            matrix_from_rows("prior.cov", &self.prior.cov)?,
        )
    }

    pub fn initial_state(&self) -> DVector<f64> {
        DVector::from_column_slice(&self.initial_state)
    }
}

fn identity_rows(n: usize, scale: f64) -> Vec<Vec<f64>> {
    (0..n)
        .map(|i| (0..n).map(|j| if i == j { scale } else { 0.0 }).collect())
        .collect()
}

fn matrix_from_rows(name: &str, rows: &[Vec<f64>]) -> Result<DMatrix<f64>> {
    let ncols = rows.first().map(Vec::len).unwrap_or(0);
    if ncols == 0 {
        return Err(Error::Config(format!("{name} is empty")));
    }
    if let Some(i) = rows.iter().position(|row| row.len() != ncols) {
        return Err(Error::Config(format!(
            "{name}: row {i} has {} entries, expected {ncols}",
            rows[i].len()
        )));
    }
    Ok(DMatrix::from_fn(rows.len(), ncols, |i, j| rows[i][j]))
}
