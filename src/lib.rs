//! Rust Sparse Autoencoder Library
//!
//! Greedy layer-wise training of a stacked sparse autoencoder by workers that
//! share parameters through a key-value parameter store.
//!
//! # Modules
//!
//! - `layers`: layer parameters, the layer stack and the sparse objective
//! - `optimizers`: batch, downpour and mini-batch downpour training strategies
//! - `store`: parameter store trait, in-memory cluster store and layer client
//! - `driver`: the layer-wise trainer run by each worker
//! - `cluster`: one thread per worker over a shared in-memory store
//! - `io`: sample loading and result dumps
//! - `utils`: activations, flat/matrix conversions and the RNG
//! - `config`: training configuration
//! - `error`: error type and result alias

pub mod cluster;
pub mod config;
pub mod driver;
pub mod error;
pub mod io;
pub mod layers;
pub mod optimizers;
pub mod store;
pub mod utils;

pub use error::{AeError, Result};
