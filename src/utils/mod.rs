//! Shared utilities for the autoencoder implementation
//!
//! This module provides random number generation, activation functions and the
//! flat-sequence/matrix conversions used by the parameter store adapter.

pub mod activations;
pub mod matrix;
pub mod rng;

pub use activations::{sigmoid, sigmoid_derivative, Activation};
pub use matrix::{flat_to_matrix, flat_to_vector, matrix_to_flat, rows_to_matrix, vector_to_flat};
pub use rng::SimpleRng;
