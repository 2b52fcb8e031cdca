//! Greedy layer-wise training of the autoencoder stack.
//!
//! Layers train one after another and an earlier layer is never revisited.
//! After layer `l` is trained its encoder (`W1·x + b1`, no activation) maps the
//! current samples to the input of layer `l + 1`.

use crate::config::{LearningMethod, TrainingConfig};
use crate::error::{AeError, Result};
use crate::io::{dump_matrix, dump_samples, dump_vector, load_samples};
use crate::layers::{Layer, LayerParameters, LayerStack};
use crate::optimizers::{build_optimizer, LayerReport, Optimizer};
use crate::store::{ParamClient, ParameterStore};
use crate::utils::SimpleRng;
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Drives one worker through every layer of the stack.
pub struct LayerwiseTrainer<'s> {
    store: &'s dyn ParameterStore,
    method: LearningMethod,
    optimizer: Box<dyn Optimizer>,
    stack: LayerStack,
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    delimiter: char,
    supervised: bool,
}

impl<'s> LayerwiseTrainer<'s> {
    /// Validates `config` and initializes the layer stack.
    ///
    /// With a configured seed every worker starts from the same weights and
    /// worker `rank` shuffles with `seed + rank + 1`.
    pub fn new(config: &TrainingConfig, store: &'s dyn ParameterStore) -> Result<Self> {
        config.validate()?;
        let method = config.method()?;
        let rank = store.worker_rank();

        let seed = config
            .seed
            .unwrap_or_else(|| u64::from(SimpleRng::from_time().next_u32()));
        let mut init_rng = SimpleRng::new(seed);
        let stack = LayerStack::new(config.visible_size, &config.hidden_layer_sizes, &mut init_rng);
        let shuffle_rng = SimpleRng::new(seed.wrapping_add(rank as u64 + 1));

        let optimizer = build_optimizer(
            method,
            config.objective()?,
            config.training_state()?,
            shuffle_rng,
        );

        debug!(worker = rank, sizes = ?stack.sizes(), method = %method, "trainer initialized");

        Ok(Self {
            store,
            method,
            optimizer,
            stack,
            input: config.input.as_ref().map(PathBuf::from),
            output: config.output.as_ref().map(PathBuf::from),
            delimiter: config.delimiter,
            supervised: config.supervised,
        })
    }

    pub fn method(&self) -> LearningMethod {
        self.method
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn into_stack(self) -> LayerStack {
        self.stack
    }

    /// Loads this worker's shard of the configured input and trains every layer.
    pub fn train(&mut self) -> Result<Vec<LayerReport>> {
        let input = self.input.clone().ok_or_else(|| {
            AeError::Configuration("no input file configured for layer 0".to_string())
        })?;
        let data = load_samples(
            &input,
            self.delimiter,
            self.supervised,
            self.store.worker_rank(),
            self.store.world_size(),
        )?;
        self.train_on(data)
    }

    /// Trains every layer starting from `data` (one column per sample).
    ///
    /// An empty shard of any shape is treated as zero samples of the visible
    /// width, so the worker still joins every barrier and encodes nothing.
    pub fn train_on(&mut self, data: Array2<f64>) -> Result<Vec<LayerReport>> {
        let worker = self.store.worker_rank();
        let mut data = if data.ncols() == 0 {
            Array2::zeros((self.stack.layer_shape(0).visible, 0))
        } else {
            data
        };
        let mut reports = Vec::with_capacity(self.stack.len());

        for layer in 0..self.stack.len() {
            reports.push(self.train_layer(layer, &data)?);
            data = self.stack.layer(layer).encode(&data);
            self.persist_encoded(layer, &data)?;
        }

        info!(worker, layers = reports.len(), "layer-wise training complete");
        Ok(reports)
    }

    /// Trains layer `layer` on `data` and persists its parameters.
    pub fn train_layer(&mut self, layer: usize, data: &Array2<f64>) -> Result<LayerReport> {
        let worker = self.store.worker_rank();
        let shape = self.stack.layer_shape(layer);
        let empty_shard;
        let data = if data.ncols() == 0 {
            empty_shard = Array2::zeros((shape.visible, 0));
            &empty_shard
        } else {
            data
        };
        if data.nrows() != shape.visible {
            return Err(AeError::shape(
                format!("samples of layer {layer}"),
                &[shape.visible],
                &[data.nrows()],
            ));
        }

        let client = ParamClient::for_layer(self.store, layer);
        client.sync()?;
        client.set_total_iterations(self.optimizer.total_iterations(data.ncols()))?;
        info!(
            worker,
            layer,
            visible = shape.visible,
            hidden = shape.hidden,
            samples = data.ncols(),
            method = self.method.description(),
            "training layer"
        );

        let report = self
            .optimizer
            .train_layer(layer, self.stack.layer_mut(layer), data, &client)?;
        client.sync()?;

        self.persist_parameters(layer, self.stack.layer(layer))?;
        Ok(report)
    }

    fn output_dir(&self) -> Result<Option<&Path>> {
        match &self.output {
            Some(dir) => {
                fs::create_dir_all(dir)?;
                Ok(Some(dir.as_path()))
            }
            None => Ok(None),
        }
    }

    /// Worker 0 writes `ae_layer_{l}_{W1,W2,b1,b2}`.
    fn persist_parameters(&self, layer: usize, params: &LayerParameters) -> Result<()> {
        if self.store.worker_rank() != 0 {
            return Ok(());
        }
        let Some(dir) = self.output_dir()? else {
            return Ok(());
        };
        let prefix = format!("ae_layer_{layer}");
        dump_matrix(dir.join(format!("{prefix}_W1")), params.w1.view(), ' ')?;
        dump_matrix(dir.join(format!("{prefix}_W2")), params.w2.view(), ' ')?;
        dump_vector(dir.join(format!("{prefix}_b1")), &params.b1)?;
        dump_vector(dir.join(format!("{prefix}_b2")), &params.b2)?;
        debug!(layer, dir = %dir.display(), "dumped layer parameters");
        Ok(())
    }

    /// Every worker writes its encoded shard as `data_{l+1}_worker{rank}.csv`.
    fn persist_encoded(&self, layer: usize, encoded: &Array2<f64>) -> Result<()> {
        let Some(dir) = self.output_dir()? else {
            return Ok(());
        };
        let rank = self.store.worker_rank();
        dump_samples(dir.join(format!("data_{}_worker{}.csv", layer + 1, rank)), encoded)
    }
}
