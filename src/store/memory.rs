//! In-process parameter store.
//!
//! One [`InMemoryCluster`] owns the shared state; every worker thread gets its
//! own [`InMemoryStore`] handle carrying its rank. A single mutex guards the
//! key-value map, the per-worker iteration clocks and the barrier, and a
//! condition variable wakes blocked readers and barrier waiters whenever any of
//! those change.

use super::{ParameterStore, StalenessPolicy};
use crate::error::{AeError, Result};
use parking_lot::{Condvar, Mutex};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

/// Associative operation folding a delta into a stored value.
pub type Combiner = Arc<dyn Fn(&mut [f64], &[f64]) + Send + Sync>;

/// Elementwise addition, the default combiner.
pub fn additive_combiner() -> Combiner {
    Arc::new(|stored: &mut [f64], delta: &[f64]| {
        for (value, d) in stored.iter_mut().zip(delta) {
            *value += d;
        }
    })
}

struct State {
    values: HashMap<String, Vec<f64>>,
    clocks: Vec<usize>,
    totals: Vec<Option<usize>>,
    at_barrier: Vec<bool>,
    arrived: usize,
    generation: u64,
    aborted: Option<String>,
}

impl State {
    /// A worker holds others back only while it is still committing
    /// iterations and not parked at a barrier.
    fn is_active(&self, worker: usize) -> bool {
        let finished = self.totals[worker].is_some_and(|total| self.clocks[worker] >= total);
        !finished && !self.at_barrier[worker]
    }

    fn within_bound(&self, rank: usize, policy: StalenessPolicy) -> bool {
        let bound = match policy {
            StalenessPolicy::Unbounded => return true,
            StalenessPolicy::Bounded(bound) => bound,
        };
        let slowest = (0..self.clocks.len())
            .filter(|&w| w != rank && self.is_active(w))
            .map(|w| self.clocks[w])
            .min();
        match slowest {
            Some(slowest) => self.clocks[rank] <= slowest + bound,
            None => true,
        }
    }

    fn check_alive(&self) -> Result<()> {
        match &self.aborted {
            Some(reason) => Err(AeError::StoreUnavailable(reason.clone())),
            None => Ok(()),
        }
    }
}

struct Shared {
    world_size: usize,
    policy: StalenessPolicy,
    combiner: Combiner,
    state: Mutex<State>,
    changed: Condvar,
}

/// Owner of the shared store state for a group of in-process workers.
#[derive(Clone)]
pub struct InMemoryCluster {
    shared: Arc<Shared>,
}

impl fmt::Debug for InMemoryCluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryCluster")
            .field("world_size", &self.shared.world_size)
            .field("policy", &self.shared.policy)
            .finish()
    }
}

impl InMemoryCluster {
    /// Cluster of `world_size` workers merging updates by elementwise addition.
    pub fn new(world_size: usize, policy: StalenessPolicy) -> Self {
        Self::with_combiner(world_size, policy, additive_combiner())
    }

    pub fn with_combiner(world_size: usize, policy: StalenessPolicy, combiner: Combiner) -> Self {
        let state = State {
            values: HashMap::new(),
            clocks: vec![0; world_size],
            totals: vec![None; world_size],
            at_barrier: vec![false; world_size],
            arrived: 0,
            generation: 0,
            aborted: None,
        };
        Self {
            shared: Arc::new(Shared {
                world_size,
                policy,
                combiner,
                state: Mutex::new(state),
                changed: Condvar::new(),
            }),
        }
    }

    pub fn world_size(&self) -> usize {
        self.shared.world_size
    }

    /// Store handle for worker `rank`.
    pub fn handle(&self, rank: usize) -> Result<InMemoryStore> {
        if rank >= self.shared.world_size {
            return Err(AeError::Configuration(format!(
                "worker rank {} out of range for a cluster of {}",
                rank, self.shared.world_size
            )));
        }
        Ok(InMemoryStore {
            rank,
            shared: Arc::clone(&self.shared),
        })
    }

    /// One handle per worker, in rank order.
    pub fn handles(&self) -> Vec<InMemoryStore> {
        (0..self.shared.world_size)
            .map(|rank| InMemoryStore {
                rank,
                shared: Arc::clone(&self.shared),
            })
            .collect()
    }

    /// Current value of `key`, bypassing staleness gating.
    pub fn snapshot(&self, key: &str) -> Option<Vec<f64>> {
        self.shared.state.lock().values.get(key).cloned()
    }

    /// Fails every pending and future call with `StoreUnavailable`.
    pub fn abort(&self, reason: impl Into<String>) {
        let mut state = self.shared.state.lock();
        if state.aborted.is_none() {
            state.aborted = Some(reason.into());
        }
        self.shared.changed.notify_all();
    }
}

/// A worker's view of an [`InMemoryCluster`].
#[derive(Clone)]
pub struct InMemoryStore {
    rank: usize,
    shared: Arc<Shared>,
}

impl fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryStore")
            .field("rank", &self.rank)
            .field("world_size", &self.shared.world_size)
            .finish()
    }
}

impl InMemoryStore {
    /// Iterations committed by this worker since its last `set_total_iterations`.
    pub fn committed_iterations(&self) -> usize {
        self.shared.state.lock().clocks[self.rank]
    }
}

impl ParameterStore for InMemoryStore {
    fn worker_rank(&self) -> usize {
        self.rank
    }

    fn world_size(&self) -> usize {
        self.shared.world_size
    }

    fn write(&self, key: &str, values: Vec<f64>) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.check_alive()?;
        if state.values.contains_key(key) {
            trace!(worker = self.rank, key, "key already published, write ignored");
        } else {
            debug!(worker = self.rank, key, len = values.len(), "published initial value");
            state.values.insert(key.to_string(), values);
        }
        Ok(())
    }

    fn read(&self, key: &str) -> Result<Vec<f64>> {
        let mut state = self.shared.state.lock();
        loop {
            state.check_alive()?;
            if state.within_bound(self.rank, self.shared.policy) {
                break;
            }
            trace!(worker = self.rank, key, "read waiting on staleness bound");
            self.shared.changed.wait(&mut state);
        }
        state
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| AeError::KeyNotFound(key.to_string()))
    }

    fn atomic_update(&self, key: &str, delta: &[f64]) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.check_alive()?;
        let stored = state
            .values
            .get_mut(key)
            .ok_or_else(|| AeError::KeyNotFound(key.to_string()))?;
        if stored.len() != delta.len() {
            return Err(AeError::shape(
                format!("update of '{key}'"),
                &[stored.len()],
                &[delta.len()],
            ));
        }
        (self.shared.combiner)(stored, delta);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.check_alive()?;
        let generation = state.generation;
        state.arrived += 1;
        state.at_barrier[self.rank] = true;

        if state.arrived == self.shared.world_size {
            state.arrived = 0;
            state.generation += 1;
            state.at_barrier.iter_mut().for_each(|b| *b = false);
            self.shared.changed.notify_all();
            return Ok(());
        }

        // Parked workers no longer gate readers, so wake them.
        self.shared.changed.notify_all();
        while state.generation == generation {
            state.check_alive()?;
            self.shared.changed.wait(&mut state);
        }
        Ok(())
    }

    fn commit_iteration(&self) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.check_alive()?;
        state.clocks[self.rank] += 1;
        self.shared.changed.notify_all();
        Ok(())
    }

    fn set_total_iterations(&self, total: usize) -> Result<()> {
        let mut state = self.shared.state.lock();
        state.check_alive()?;
        state.clocks[self.rank] = 0;
        state.totals[self.rank] = Some(total);
        self.shared.changed.notify_all();
        Ok(())
    }
}
