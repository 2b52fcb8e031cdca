//! Configuration structures for training
//!
//! This module parses the training configuration from JSON and resolves the
//! string selectors (learning method, activation) into closed enumerations once,
//! before any worker starts.

use crate::error::{AeError, Result};
use crate::layers::SparseObjective;
use crate::optimizers::TrainingState;
use crate::store::StalenessPolicy;
use crate::utils::Activation;
use serde::Deserialize;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Gradient-update strategy used to train each layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearningMethod {
    /// Distributed full-batch gradient descent ("dbgd").
    BatchGradientDescent,
    /// Downpour asynchronous per-sample descent ("dsgd").
    DownpourSgd,
    /// Downpour asynchronous mini-batch descent ("mbdsgd").
    MiniBatchDownpourSgd,
}

impl LearningMethod {
    pub const NAMES: [&'static str; 3] = ["dbgd", "dsgd", "mbdsgd"];

    pub fn name(self) -> &'static str {
        match self {
            LearningMethod::BatchGradientDescent => "dbgd",
            LearningMethod::DownpourSgd => "dsgd",
            LearningMethod::MiniBatchDownpourSgd => "mbdsgd",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            LearningMethod::BatchGradientDescent => "distributed batch gradient descent",
            LearningMethod::DownpourSgd => "downpour stochastic gradient descent",
            LearningMethod::MiniBatchDownpourSgd => {
                "mini-batch downpour stochastic gradient descent"
            }
        }
    }

    /// Read/update batch used when the configured value is unset (<= 0).
    pub fn default_batch(self) -> usize {
        match self {
            LearningMethod::MiniBatchDownpourSgd => 4,
            _ => 10,
        }
    }
}

impl FromStr for LearningMethod {
    type Err = AeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "dbgd" => Ok(LearningMethod::BatchGradientDescent),
            "dsgd" => Ok(LearningMethod::DownpourSgd),
            "mbdsgd" => Ok(LearningMethod::MiniBatchDownpourSgd),
            other => Err(AeError::Configuration(format!(
                "Invalid learning method '{}'. Must be one of: {}",
                other,
                LearningMethod::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for LearningMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Training configuration, deserialized from JSON.
///
/// # Example
///
/// ```json
/// {
///   "input": "data/train.txt",
///   "output": "out/",
///   "visible_size": 64,
///   "hidden_layer_sizes": [32, 16],
///   "learning_method": "mbdsgd",
///   "rounds": 5,
///   "learning_rate": 0.1,
///   "weight_decay": 0.0001,
///   "sparsity_target": 0.05,
///   "sparsity_weight": 3.0,
///   "mini_batch_size": 16,
///   "read_batch": 2,
///   "update_batch": 2,
///   "bounded_staleness_enabled": true,
///   "staleness_bound": 3,
///   "workers": 4
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct TrainingConfig {
    /// Sizes of the hidden layers, trained in order.
    pub hidden_layer_sizes: Vec<usize>,

    /// Input dimension of the first layer.
    pub visible_size: usize,

    /// "dbgd", "dsgd" or "mbdsgd"
    pub learning_method: String,

    #[serde(default = "default_rounds")]
    pub rounds: usize,

    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    /// λ
    #[serde(default)]
    pub weight_decay: f64,

    /// Target mean hidden activation, strictly inside (0, 1).
    #[serde(default = "default_sparsity_target")]
    pub sparsity_target: f64,

    /// β
    #[serde(default)]
    pub sparsity_weight: f64,

    #[serde(default = "default_mini_batch_size")]
    pub mini_batch_size: usize,

    /// Steps between parameter reads; <= 0 selects the method default.
    #[serde(default)]
    pub read_batch: i64,

    /// Steps between pushes; <= 0 selects the method default.
    #[serde(default)]
    pub update_batch: i64,

    #[serde(default)]
    pub staleness_bound: usize,

    #[serde(default)]
    pub bounded_staleness_enabled: bool,

    /// Records the loss history and logs at debug level.
    #[serde(default)]
    pub debug_logging: bool,

    /// "sigmoid" (default), "relu" or "tanh"
    pub activation: Option<String>,

    /// Raw sample file for the first layer.
    pub input: Option<String>,

    /// Directory receiving learned parameters and encoded samples.
    pub output: Option<String>,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Treat the last field of each sample line as a label and drop it.
    #[serde(default)]
    pub supervised: bool,

    /// Base seed for weight init and shuffling; time seeded when absent.
    pub seed: Option<u64>,

    /// Number of in-process workers.
    #[serde(default = "default_workers")]
    pub workers: usize,
}

fn default_rounds() -> usize {
    1
}

fn default_learning_rate() -> f64 {
    0.01
}

fn default_sparsity_target() -> f64 {
    0.05
}

fn default_mini_batch_size() -> usize {
    10
}

fn default_delimiter() -> char {
    ' '
}

fn default_workers() -> usize {
    1
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: Vec::new(),
            visible_size: 0,
            learning_method: "dbgd".to_string(),
            rounds: default_rounds(),
            learning_rate: default_learning_rate(),
            weight_decay: 0.0,
            sparsity_target: default_sparsity_target(),
            sparsity_weight: 0.0,
            mini_batch_size: default_mini_batch_size(),
            read_batch: 0,
            update_batch: 0,
            staleness_bound: 0,
            bounded_staleness_enabled: false,
            debug_logging: false,
            activation: None,
            input: None,
            output: None,
            delimiter: default_delimiter(),
            supervised: false,
            seed: None,
            workers: default_workers(),
        }
    }
}

impl TrainingConfig {
    pub fn method(&self) -> Result<LearningMethod> {
        self.learning_method.parse()
    }

    pub fn activation(&self) -> Result<Activation> {
        self.activation.as_deref().map_or(Ok(Activation::Sigmoid), str::parse)
    }

    pub fn objective(&self) -> Result<SparseObjective> {
        Ok(SparseObjective {
            activation: self.activation()?,
            weight_decay: self.weight_decay,
            sparsity_target: self.sparsity_target,
            sparsity_weight: self.sparsity_weight,
        })
    }

    /// Hyperparameters for one `train` invocation, with batch defaults resolved.
    pub fn training_state(&self) -> Result<TrainingState> {
        let method = self.method()?;
        let resolve = |value: i64| {
            if value <= 0 {
                method.default_batch()
            } else {
                value as usize
            }
        };
        Ok(TrainingState::new(
            self.learning_rate,
            self.rounds,
            self.mini_batch_size,
            resolve(self.read_batch),
            resolve(self.update_batch),
            self.debug_logging,
        ))
    }

    pub fn staleness_policy(&self) -> StalenessPolicy {
        StalenessPolicy::new(self.bounded_staleness_enabled, self.staleness_bound)
    }

    /// Rejects configurations that cannot train.
    pub fn validate(&self) -> Result<()> {
        let method = self.method()?;
        let activation = self.activation()?;

        if self.visible_size == 0 {
            return Err(invalid("visible_size must be positive"));
        }
        if self.hidden_layer_sizes.is_empty() {
            return Err(invalid("hidden_layer_sizes must name at least one layer"));
        }
        if self.hidden_layer_sizes.contains(&0) {
            return Err(invalid("hidden layer sizes must be positive"));
        }
        if self.rounds == 0 {
            return Err(invalid("rounds must be positive"));
        }
        if !(self.learning_rate.is_finite() && self.learning_rate > 0.0) {
            return Err(invalid("learning_rate must be positive"));
        }
        if !(self.weight_decay.is_finite() && self.weight_decay >= 0.0) {
            return Err(invalid("weight_decay must be non-negative"));
        }
        if !(self.sparsity_target > 0.0 && self.sparsity_target < 1.0) {
            return Err(invalid("sparsity_target must lie strictly between 0 and 1"));
        }
        if !(self.sparsity_weight.is_finite() && self.sparsity_weight >= 0.0) {
            return Err(invalid("sparsity_weight must be non-negative"));
        }
        if self.sparsity_weight > 0.0 && activation != Activation::Sigmoid {
            return Err(AeError::Configuration(format!(
                "the sparsity penalty needs hidden activations in (0, 1); \
                 use sigmoid or set sparsity_weight to 0 for {activation}"
            )));
        }
        if method == LearningMethod::MiniBatchDownpourSgd && self.mini_batch_size == 0 {
            return Err(invalid("mini_batch_size must be positive for mbdsgd"));
        }
        if self.workers == 0 {
            return Err(invalid("workers must be positive"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> AeError {
    AeError::Configuration(message.to_string())
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it into a `TrainingConfig` and
/// validates it.
///
/// # Examples
///
/// ```no_run
/// use rust_sparse_autoencoder::config::load_config;
///
/// let cfg = load_config("config/sparse_ae.json").unwrap();
/// assert!(!cfg.hidden_layer_sizes.is_empty());
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TrainingConfig> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
