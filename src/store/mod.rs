//! Parameter store abstraction shared by cooperating workers.
//!
//! Workers never talk to each other directly. Every exchange goes through a
//! key-value store holding flat `f64` sequences:
//!
//! * `write` publishes a key's initial value (first writer wins).
//! * `read` fetches the current value, possibly blocking until the caller is
//!   within the configured staleness bound.
//! * `atomic_update` folds a delta into the stored value with an associative
//!   combiner; concurrent updates are serialized and none is lost.
//! * `sync` is a full-cluster barrier and `commit_iteration` advances the
//!   caller's iteration clock.
//!
//! [`memory::InMemoryCluster`] provides an in-process implementation where each
//! worker is a thread. [`client::ParamClient`] adapts the flat protocol to
//! layer parameters.

pub mod client;
pub mod memory;

pub use client::ParamClient;
pub use memory::{Combiner, InMemoryCluster, InMemoryStore};

use crate::error::Result;

/// Interface to the external key-value parameter store.
///
/// All calls are blocking from the worker's point of view. An error from any
/// of them is fatal for the training run.
pub trait ParameterStore: Send + Sync {
    /// Rank of the calling worker.
    fn worker_rank(&self) -> usize;

    /// Number of workers sharing the store.
    fn world_size(&self) -> usize;

    /// Publishes `values` under `key` unless the key already holds a value.
    fn write(&self, key: &str, values: Vec<f64>) -> Result<()>;

    /// Returns the current flat value of `key`.
    fn read(&self, key: &str) -> Result<Vec<f64>>;

    /// Combines `delta` into the stored value as one indivisible operation.
    fn atomic_update(&self, key: &str, delta: &[f64]) -> Result<()>;

    /// Blocks until every worker has reached the barrier.
    fn sync(&self) -> Result<()>;

    /// Marks one more iteration as committed by the calling worker.
    fn commit_iteration(&self) -> Result<()>;

    /// Declares how many iterations the caller will commit in the current
    /// training run and restarts its iteration clock.
    fn set_total_iterations(&self, total: usize) -> Result<()>;
}

/// How far a worker's committed iterations may run ahead of the slowest
/// active worker before its reads block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalenessPolicy {
    /// Reads never wait.
    #[default]
    Unbounded,
    /// Reads wait while `own_clock > slowest_clock + bound`.
    Bounded(usize),
}

impl StalenessPolicy {
    pub fn new(enabled: bool, bound: usize) -> Self {
        if enabled {
            StalenessPolicy::Bounded(bound)
        } else {
            StalenessPolicy::Unbounded
        }
    }
}
