//! Training orchestrators for a single autoencoder layer
//!
//! This module provides the Optimizer trait and the three strategies that
//! drive one layer's parameters to a trained state through the shared
//! parameter store.
//!
//! # Overview
//!
//! Every strategy follows the same per-layer state machine:
//!
//! ```text
//! PUBLISH_INITIAL → (READ → COMPUTE_GRADIENT → [LOCAL_APPLY] → MAYBE_PUSH → MAYBE_COMMIT)* → FINAL_READ
//! ```
//!
//! and they differ only in the granularity of a step:
//!
//! - [`DistributedBgd`]: one step is one round over the full local shard.
//! - [`DownpourSgd`]: one step is one shuffled sample.
//! - [`MiniBatchDownpourSgd`]: one step is one shuffled mini-batch.
//!
//! # Example
//!
//! ```ignore
//! use rust_sparse_autoencoder::optimizers::build_optimizer;
//!
//! let mut optimizer = build_optimizer(method, objective, state, rng);
//! let report = optimizer.train_layer(0, &mut params, &data, &client)?;
//! println!("{} -> {}", report.initial_cost, report.final_cost);
//! ```

pub mod batch;
pub mod downpour;
pub mod minibatch;

pub use batch::DistributedBgd;
pub use downpour::DownpourSgd;
pub use minibatch::MiniBatchDownpourSgd;

use crate::config::LearningMethod;
use crate::error::Result;
use crate::layers::{LayerParameters, SparseObjective};
use crate::store::ParamClient;
use crate::utils::SimpleRng;
use ndarray::Array2;

/// Hyperparameters of one `train` invocation plus the optional loss log.
///
/// Everything except `loss_history` stays fixed while a layer trains.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingState {
    pub learning_rate: f64,
    pub rounds: usize,
    pub mini_batch_size: usize,
    /// Steps between parameter reads (already resolved, always >= 1).
    pub read_batch: usize,
    /// Steps between pushes (already resolved, always >= 1).
    pub update_batch: usize,
    /// Record the cost after every step or round.
    pub debug: bool,
    pub loss_history: Vec<f64>,
}

impl TrainingState {
    pub fn new(
        learning_rate: f64,
        rounds: usize,
        mini_batch_size: usize,
        read_batch: usize,
        update_batch: usize,
        debug: bool,
    ) -> Self {
        Self {
            learning_rate,
            rounds,
            mini_batch_size,
            read_batch: read_batch.max(1),
            update_batch: update_batch.max(1),
            debug,
            loss_history: Vec::new(),
        }
    }

    /// Appends `cost` to the loss log when debugging is on.
    pub fn record(&mut self, cost: f64) {
        if self.debug {
            self.loss_history.push(cost);
        }
    }

    /// Moves the loss log out, leaving it empty for the next layer.
    pub fn take_history(&mut self) -> Vec<f64> {
        std::mem::take(&mut self.loss_history)
    }
}

/// Outcome of training one layer on one worker.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerReport {
    pub layer: usize,
    pub method: LearningMethod,
    /// Cost of the initial parameters on this worker's shard.
    pub initial_cost: f64,
    /// Cost of the final store parameters on this worker's shard.
    pub final_cost: f64,
    /// Iterations this worker committed.
    pub iterations: usize,
    /// Per-step (or per-round) costs; empty unless debugging.
    pub loss_history: Vec<f64>,
}

/// Core trait for the per-layer training strategies.
///
/// Implementations publish `params` as the layer's initial value, exchange
/// deltas through `client` and finally overwrite `params` with the store's
/// value, so every worker leaves with the same trained layer.
pub trait Optimizer: Send {
    fn method(&self) -> LearningMethod;

    /// Iterations this strategy commits for a shard of `sample_count` samples.
    ///
    /// The driver announces this to the store before training starts.
    fn total_iterations(&self, sample_count: usize) -> usize;

    /// Trains layer `layer` on `data` (one column per sample).
    fn train_layer(
        &mut self,
        layer: usize,
        params: &mut LayerParameters,
        data: &Array2<f64>,
        client: &ParamClient,
    ) -> Result<LayerReport>;
}

/// Builds the strategy selected by `method`.
///
/// `rng` drives the per-round shuffles of the asynchronous strategies.
pub fn build_optimizer(
    method: LearningMethod,
    objective: SparseObjective,
    state: TrainingState,
    rng: SimpleRng,
) -> Box<dyn Optimizer> {
    match method {
        LearningMethod::BatchGradientDescent => Box::new(DistributedBgd::new(objective, state)),
        LearningMethod::DownpourSgd => Box::new(DownpourSgd::new(objective, state, rng)),
        LearningMethod::MiniBatchDownpourSgd => {
            Box::new(MiniBatchDownpourSgd::new(objective, state, rng))
        }
    }
}

/// Splits `indices` into contiguous batches of `size`.
///
/// A trailing partial batch is kept when it holds at least two indices and
/// dropped otherwise.
pub fn partition_mini_batches(indices: &[usize], size: usize) -> Vec<Vec<usize>> {
    if size == 0 {
        return Vec::new();
    }
    indices
        .chunks(size)
        .filter(|chunk| chunk.len() == size || chunk.len() >= 2)
        .map(<[usize]>::to_vec)
        .collect()
}

/// Number of batches [`partition_mini_batches`] yields for `count` indices.
pub fn mini_batch_count(count: usize, size: usize) -> usize {
    if size == 0 {
        return 0;
    }
    let remainder = count % size;
    count / size + usize::from(remainder >= 2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partition_keeps_trailing_pair() {
        let indices: Vec<usize> = (0..7).collect();
        let batches = partition_mini_batches(&indices, 5);
        assert_eq!(batches, vec![vec![0, 1, 2, 3, 4], vec![5, 6]]);
        assert_eq!(mini_batch_count(7, 5), 2);
    }

    #[test]
    fn test_partition_drops_single_remainder() {
        let indices: Vec<usize> = (0..9).collect();
        let batches = partition_mini_batches(&indices, 4);
        assert_eq!(batches.len(), 2);
        assert!(batches.iter().all(|b| b.len() == 4));
        assert_eq!(mini_batch_count(9, 4), 2);
    }

    #[test]
    fn test_partition_of_size_one_keeps_everything() {
        let indices = vec![3, 1, 2];
        assert_eq!(
            partition_mini_batches(&indices, 1),
            vec![vec![3], vec![1], vec![2]]
        );
        assert_eq!(mini_batch_count(3, 1), 3);
    }

    #[test]
    fn test_history_only_recorded_when_debugging() {
        let mut quiet = TrainingState::new(0.1, 1, 4, 1, 1, false);
        quiet.record(1.0);
        assert!(quiet.take_history().is_empty());

        let mut loud = TrainingState::new(0.1, 1, 4, 1, 1, true);
        loud.record(1.0);
        loud.record(0.5);
        assert_eq!(loud.take_history(), vec![1.0, 0.5]);
        assert!(loud.loss_history.is_empty());
    }
}
