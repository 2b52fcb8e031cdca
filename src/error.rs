//! Error types shared by every layer of the training stack.

use thiserror::Error;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AeError>;

/// Failures surfaced while configuring or running a training job.
#[derive(Error, Debug)]
pub enum AeError {
    /// Unknown learning method or activation, or an out-of-range hyperparameter.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A matrix, vector or flat buffer does not have the declared dimensions.
    #[error("Shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Read or update on a key that was never published.
    #[error("Key not found in parameter store: {0}")]
    KeyNotFound(String),

    /// The parameter store (or a worker sharing it) can no longer serve requests.
    #[error("Parameter store unavailable: {0}")]
    StoreUnavailable(String),

    /// A sample field could not be parsed as a number.
    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AeError {
    pub(crate) fn shape(what: impl Into<String>, expected: &[usize], got: &[usize]) -> Self {
        AeError::ShapeMismatch {
            what: what.into(),
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }
}
