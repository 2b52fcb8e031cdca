//! In-process cluster: one thread per worker over a shared in-memory store.

use crate::config::TrainingConfig;
use crate::driver::LayerwiseTrainer;
use crate::error::{AeError, Result};
use crate::layers::LayerStack;
use crate::optimizers::LayerReport;
use crate::store::InMemoryCluster;
use ndarray::Array2;
use std::thread;
use tracing::{error, info};

/// Result of a whole cluster run.
#[derive(Debug, Clone)]
pub struct ClusterRun {
    /// Per-layer reports, indexed by worker rank.
    pub reports: Vec<Vec<LayerReport>>,
    /// Trained stack of each worker, indexed by rank.
    pub stacks: Vec<LayerStack>,
}

impl ClusterRun {
    /// Trained stack as seen by worker 0.
    pub fn stack(&self) -> &LayerStack {
        &self.stacks[0]
    }

    /// Worker-averaged (initial, final) cost of each layer.
    pub fn mean_costs(&self) -> Vec<(f64, f64)> {
        let layers = self.reports.first().map_or(0, Vec::len);
        let workers = self.reports.len().max(1) as f64;
        (0..layers)
            .map(|layer| {
                let (initial, last) = self.reports.iter().fold((0.0, 0.0), |(i, f), worker| {
                    (i + worker[layer].initial_cost, f + worker[layer].final_cost)
                });
                (initial / workers, last / workers)
            })
            .collect()
    }
}

/// Aborts the store when a worker thread unwinds, so peers blocked on a read
/// or barrier fail instead of waiting forever.
struct AbortOnPanic<'a> {
    cluster: &'a InMemoryCluster,
    rank: usize,
}

impl Drop for AbortOnPanic<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.cluster.abort(format!("worker {} panicked", self.rank));
        }
    }
}

/// Trains on `config.input` with `config.workers` threads, each loading its
/// own shard of the file.
pub fn run_local_cluster(config: &TrainingConfig) -> Result<ClusterRun> {
    run_workers(config, config.workers, |trainer, _rank| trainer.train())
}

/// Trains on pre-loaded shards, one worker per shard.
pub fn run_local_cluster_on(config: &TrainingConfig, shards: Vec<Array2<f64>>) -> Result<ClusterRun> {
    let world = shards.len();
    run_workers(config, world, |trainer, rank| trainer.train_on(shards[rank].clone()))
}

fn run_workers<F>(config: &TrainingConfig, world: usize, job: F) -> Result<ClusterRun>
where
    F: Fn(&mut LayerwiseTrainer, usize) -> Result<Vec<LayerReport>> + Sync,
{
    config.validate()?;
    if world == 0 {
        return Err(AeError::Configuration("a cluster needs at least one worker".to_string()));
    }

    let cluster = InMemoryCluster::new(world, config.staleness_policy());
    info!(workers = world, policy = ?config.staleness_policy(), "starting local cluster");

    let outcomes: Vec<Result<(Vec<LayerReport>, LayerStack)>> = thread::scope(|scope| {
        let handles: Vec<_> = cluster
            .handles()
            .into_iter()
            .enumerate()
            .map(|(rank, store)| {
                let cluster = &cluster;
                let job = &job;
                scope.spawn(move || {
                    let _guard = AbortOnPanic { cluster, rank };
                    let outcome = LayerwiseTrainer::new(config, &store).and_then(|mut trainer| {
                        let reports = job(&mut trainer, rank)?;
                        Ok((reports, trainer.into_stack()))
                    });
                    if let Err(e) = &outcome {
                        error!(worker = rank, error = %e, "worker failed");
                        cluster.abort(format!("worker {rank} failed: {e}"));
                    }
                    outcome
                })
            })
            .collect();

        handles
            .into_iter()
            .enumerate()
            .map(|(rank, handle)| {
                handle.join().unwrap_or_else(|_| {
                    Err(AeError::StoreUnavailable(format!("worker {rank} panicked")))
                })
            })
            .collect()
    });

    collect_outcomes(outcomes)
}

/// Keeps the root cause when one worker's failure made its peers fail too.
fn collect_outcomes(outcomes: Vec<Result<(Vec<LayerReport>, LayerStack)>>) -> Result<ClusterRun> {
    let mut reports = Vec::with_capacity(outcomes.len());
    let mut stacks = Vec::with_capacity(outcomes.len());
    let mut first_error: Option<AeError> = None;

    for outcome in outcomes {
        match outcome {
            Ok((worker_reports, worker_stack)) => {
                reports.push(worker_reports);
                stacks.push(worker_stack);
            }
            Err(e) => {
                let replace = match &first_error {
                    None => true,
                    Some(AeError::StoreUnavailable(_)) => !matches!(e, AeError::StoreUnavailable(_)),
                    Some(_) => false,
                };
                if replace {
                    first_error = Some(e);
                }
            }
        }
    }

    if let Some(e) = first_error {
        return Err(e);
    }
    Ok(ClusterRun { reports, stacks })
}
