//! Layer abstractions for the stacked autoencoder
//!
//! This module provides the Layer trait, the per-layer parameter container and
//! the sparse autoencoder objective that computes cost and gradients.

mod r#trait;
pub mod parameters;
pub mod sparse;

pub use parameters::{LayerGradients, LayerParameters, LayerShape, LayerStack};
pub use r#trait::Layer;
pub use sparse::{ActivationCache, SparseObjective, RHO_EPSILON};
