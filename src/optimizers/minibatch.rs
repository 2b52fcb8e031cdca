//! Mini-batch downpour descent ("mbdsgd").
//!
//! Same read/push cadence as [`DownpourSgd`](super::DownpourSgd), but each
//! step takes the averaged gradient of one mini-batch of the shuffled shard.

use crate::config::LearningMethod;
use crate::error::Result;
use crate::layers::{LayerParameters, SparseObjective};
use crate::optimizers::downpour::AsyncRun;
use crate::optimizers::{
    mini_batch_count, partition_mini_batches, LayerReport, Optimizer, TrainingState,
};
use crate::store::ParamClient;
use crate::utils::SimpleRng;
use ndarray::Array2;

pub struct MiniBatchDownpourSgd {
    objective: SparseObjective,
    state: TrainingState,
    rng: SimpleRng,
}

impl MiniBatchDownpourSgd {
    pub fn new(objective: SparseObjective, state: TrainingState, rng: SimpleRng) -> Self {
        Self {
            objective,
            state,
            rng,
        }
    }
}

impl Optimizer for MiniBatchDownpourSgd {
    fn method(&self) -> LearningMethod {
        LearningMethod::MiniBatchDownpourSgd
    }

    fn total_iterations(&self, sample_count: usize) -> usize {
        let batches = mini_batch_count(sample_count, self.state.mini_batch_size);
        self.state.rounds * batches.div_ceil(self.state.update_batch)
    }

    fn train_layer(
        &mut self,
        layer: usize,
        params: &mut LayerParameters,
        data: &Array2<f64>,
        client: &ParamClient,
    ) -> Result<LayerReport> {
        let size = self.state.mini_batch_size;
        let schedule = |rng: &mut SimpleRng| -> Vec<Vec<usize>> {
            let mut indices: Vec<usize> = (0..data.ncols()).collect();
            rng.shuffle_usize(&mut indices);
            partition_mini_batches(&indices, size)
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
