//! Distributed full-batch gradient descent.
//!
//! Each round every worker reads the shared layer, computes the gradient
//! averaged over its own shard and folds `-learning_rate * gradient` into the
//! store. The store therefore moves by the sum of the workers' shard steps.
//!
//! The loss history holds the cost of the parameters each round read, before
//! that round's push; the cost after the last push is the report's
//! `final_cost`.

use crate::config::LearningMethod;
use crate::error::Result;
use crate::layers::{LayerParameters, SparseObjective};
use crate::optimizers::{LayerReport, Optimizer, TrainingState};
use crate::store::ParamClient;
use ndarray::Array2;
use tracing::{debug, info, warn};

/// Batch strategy ("dbgd"): one committed iteration per round.
pub struct DistributedBgd {
    objective: SparseObjective,
    state: TrainingState,
}

impl DistributedBgd {
    pub fn new(objective: SparseObjective, state: TrainingState) -> Self {
        Self { objective, state }
    }
}

impl Optimizer for DistributedBgd {
    fn method(&self) -> LearningMethod {
        LearningMethod::BatchGradientDescent
    }

    fn total_iterations(&self, _sample_count: usize) -> usize {
        self.state.rounds
    }

    fn train_layer(
        &mut self,
        layer: usize,
        params: &mut LayerParameters,
        data: &Array2<f64>,
        client: &ParamClient,
    ) -> Result<LayerReport> {
        let worker = client.worker_rank();
        let shape = params.shape();
        let initial_cost = self.objective.cost(params, data);
        info!(worker, layer, cost = initial_cost, "starting batch gradient descent");

        client.write_layer(params)?;
        self.state.take_history();

        for round in 0..self.state.rounds {
            let current = client.read_layer(shape)?;
            let cost = self.objective.cost(&current, data);
            if !cost.is_finite() {
                warn!(worker, layer, round, "cost is not finite");
            }
            debug!(worker, layer, round, cost, "round started");
            self.state.record(cost);

            let gradient = self.objective.batch_gradient(&current, data);
            client.update_layer(&gradient.scaled(-self.state.learning_rate))?;
            client.commit_iteration()?;
        }

        client.sync()?;
        *params = client.read_layer(shape)?;
        let final_cost = self.objective.cost(params, data);
        info!(worker, layer, cost = final_cost, "batch gradient descent finished");

        Ok(LayerReport {
            layer,
            method: self.method(),
            initial_cost,
            final_cost,
            iterations: self.state.rounds,
            loss_history: self.state.take_history(),
        })
    }
}
