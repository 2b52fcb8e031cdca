//! Downpour-style asynchronous descent.
//!
//! A worker keeps a private working copy of the layer and takes local steps on
//! it. Every `read_batch` steps it refreshes from the store and every
//! `update_batch` steps it pushes the change accumulated since its last
//! snapshot. Both happen unconditionally on the last step of a round, and a
//! barrier closes each round.
//!
//! A refresh that lands while local steps are still unpushed re-bases them on
//! the fresh value instead of discarding them. Plain downpour resets the
//! working copy to the fresh value, which loses those steps when
//! `read_batch` does not divide `update_batch`:
//!
//! ```text
//! working  = fresh + (working - baseline)
//! baseline = fresh
//! ```

use crate::config::LearningMethod;
use crate::error::Result;
use crate::layers::{LayerParameters, SparseObjective};
use crate::optimizers::{LayerReport, Optimizer, TrainingState};
use crate::store::ParamClient;
use crate::utils::SimpleRng;
use ndarray::Array2;
use tracing::{debug, info, warn};

/// Per-sample strategy ("dsgd").
pub struct DownpourSgd {
    objective: SparseObjective,
    state: TrainingState,
    rng: SimpleRng,
}

impl DownpourSgd {
    pub fn new(objective: SparseObjective, state: TrainingState, rng: SimpleRng) -> Self {
        Self {
            objective,
            state,
            rng,
        }
    }
}

impl Optimizer for DownpourSgd {
    fn method(&self) -> LearningMethod {
        LearningMethod::DownpourSgd
    }

    fn total_iterations(&self, sample_count: usize) -> usize {
        self.state.rounds * sample_count.div_ceil(self.state.update_batch)
    }

    fn train_layer(
        &mut self,
        layer: usize,
        params: &mut LayerParameters,
        data: &Array2<f64>,
        client: &ParamClient,
    ) -> Result<LayerReport> {
        let schedule = |rng: &mut SimpleRng| -> Vec<Vec<usize>> {
            let mut indices: Vec<usize> = (0..data.ncols()).collect();
            rng.shuffle_usize(&mut indices);
            indices.into_iter().map(|i| vec![i]).collect()
        };
        let mut run = AsyncRun {
            method: self.method(),
            objective: &self.objective,
            state: &mut self.state,
            rng: &mut self.rng,
            client,
            data,
            layer,
        };
        run.train(params, schedule)
    }
}

/// One asynchronous training run over a layer; shared by the per-sample and
/// mini-batch strategies, which differ only in how a round is split into steps.
pub(crate) struct AsyncRun<'a, 'c> {
    pub method: LearningMethod,
    pub objective: &'a SparseObjective,
    pub state: &'a mut TrainingState,
    pub rng: &'a mut SimpleRng,
    pub client: &'a ParamClient<'c>,
    pub data: &'a Array2<f64>,
    pub layer: usize,
}

impl AsyncRun<'_, '_> {
    /// Runs every round. `schedule` yields the sample indices of each step of
    /// one round, already shuffled.
    pub fn train<F>(&mut self, params: &mut LayerParameters, mut schedule: F) -> Result<LayerReport>
    where
        F: FnMut(&mut SimpleRng) -> Vec<Vec<usize>>,
    {
        let worker = self.client.worker_rank();
        let layer = self.layer;
        let shape = params.shape();
        let initial_cost = self.objective.cost(params, self.data);
        info!(
            worker,
            layer,
            method = self.method.name(),
            cost = initial_cost,
            "starting asynchronous descent"
        );

        self.client.write_layer(params)?;
        self.state.take_history();

        let mut working = params.clone();
        let mut baseline = params.clone();
        let mut iterations = 0;

        for round in 0..self.state.rounds {
            let steps = schedule(&mut *self.rng);
            let last = steps.len().saturating_sub(1);

            for (cnt, step) in steps.iter().enumerate() {
                if cnt % self.state.read_batch == 0 || cnt == last {
                    let fresh = self.client.read_layer(shape)?;
                    let pending = working.delta_from(&baseline);
                    working = fresh.clone();
                    working.add_scaled(1.0, &pending);
                    baseline = fresh;
                }

                let gradient = self.objective.mini_batch_gradient(&working, self.data, step);
                working.add_scaled(-self.state.learning_rate, &gradient);

                if (cnt + 1) % self.state.update_batch == 0 || cnt == last {
                    self.client.update_layer(&working.delta_from(&baseline))?;
                    self.client.commit_iteration()?;
                    baseline = working.clone();
                    iterations += 1;
                }

                if self.state.debug {
                    let cost = self.objective.cost(&working, self.data);
                    debug!(worker, layer, round, step = cnt, cost, "local step");
                    self.state.record(cost);
                }
            }

            self.client.sync()?;
            debug!(worker, layer, round, "round finished");
        }

        *params = self.client.read_layer(shape)?;
        let final_cost = self.objective.cost(params, self.data);
        if !final_cost.is_finite() {
            warn!(worker, layer, "final cost is not finite");
        }
        info!(worker, layer, cost = final_cost, iterations, "asynchronous descent finished");

        Ok(LayerReport {
            layer,
            method: self.method,
            initial_cost,
            final_cost,
            iterations,
            loss_history: self.state.take_history(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::LayerShape;
    use crate::store::{InMemoryCluster, ParameterStore, StalenessPolicy};

    #[test]
    fn test_total_iterations_rounds_up() {
        let state = TrainingState::new(0.1, 3, 1, 10, 4, false);
        let sgd = DownpourSgd::new(SparseObjective::default(), state, SimpleRng::new(1));
        assert_eq!(sgd.total_iterations(10), 9);
        assert_eq!(sgd.total_iterations(0), 0);
    }

    #[test]
    fn test_single_worker_commits_expected_iterations() {
        let cluster = InMemoryCluster::new(1, StalenessPolicy::Unbounded);
        let store = cluster.handle(0).unwrap();
        let client = ParamClient::for_layer(&store, 0);

        let mut rng = SimpleRng::new(5);
        let mut params = LayerParameters::random(LayerShape::new(3, 2), &mut rng);
        let data = Array2::from_shape_fn((3, 7), |_| rng.next_f64());

        let state = TrainingState::new(0.05, 2, 1, 3, 3, false);
        let mut sgd = DownpourSgd::new(SparseObjective::default(), state, SimpleRng::new(9));
        let total = sgd.total_iterations(data.ncols());
        store.set_total_iterations(total).unwrap();

        let report = sgd.train_layer(0, &mut params, &data, &client).unwrap();
        assert_eq!(report.iterations, total);
        assert_eq!(store.committed_iterations(), total);
        assert_eq!(client.read_layer(params.shape()).unwrap(), params);
    }
}
