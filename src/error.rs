use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("dimension mismatch for {what}: expected {expected}, found {found}")]
    DimensionMismatch {
        what: String,
        expected: String,
        found: String,
    },

    #[error("innovation covariance is singular at step {step}")]
    SingularMatrix { step: usize },

    #[error("covariance is not positive semi-definite at step {step} (min eigenvalue {min_eigenvalue})")]
    NotPositiveSemiDefinite { step: usize, min_eigenvalue: f64 },

    #[error("{what} is not positive semi-definite (min eigenvalue {min_eigenvalue})")]
    InvalidCovariance { what: String, min_eigenvalue: f64 },

    #[error("cannot smooth an empty sequence of beliefs")]
    EmptySequence,

    #[error("invalid scenario: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn mismatch(
        what: impl Into<String>,
        expected: (usize, usize),
        found: (usize, usize),
    ) -> Error {
        Error::DimensionMismatch {
            what: what.into(),
            expected: format!("{}x{}", expected.0, expected.1),
            found: format!("{}x{}", found.0, found.1),
        }
    }
}
