//! Parameters of one autoencoder layer and the stack of layers.
//!
//! A layer with `visible` inputs and `hidden` units holds:
//!
//! * `w1` - encoder weights (hidden × visible)
//! * `w2` - decoder weights (visible × hidden)
//! * `b1` - encoder bias (hidden)
//! * `b2` - decoder bias (visible)
//!
//! Gradients and pushed deltas have exactly the same four-part shape, so they
//! reuse this type.

use crate::error::{AeError, Result};
use crate::layers::Layer;
use crate::utils::SimpleRng;
use ndarray::{Array1, Array2};

/// Declared `(visible, hidden)` dimensions of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerShape {
    pub visible: usize,
    pub hidden: usize,
}

impl LayerShape {
    pub fn new(visible: usize, hidden: usize) -> Self {
        Self { visible, hidden }
    }
}

/// Encoder/decoder weights and biases for a single layer.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerParameters {
    pub w1: Array2<f64>,
    pub w2: Array2<f64>,
    pub b1: Array1<f64>,
    pub b2: Array1<f64>,
}

/// Gradient set {dW1, dW2, db1, db2}.
pub type LayerGradients = LayerParameters;

impl LayerParameters {
    /// Weights sampled uniformly from [-1, 1), biases zero.
    pub fn random(shape: LayerShape, rng: &mut SimpleRng) -> Self {
        let LayerShape { visible, hidden } = shape;
        let w1 = Array2::from_shape_fn((hidden, visible), |_| rng.gen_range_f64(-1.0, 1.0));
        let w2 = Array2::from_shape_fn((visible, hidden), |_| rng.gen_range_f64(-1.0, 1.0));
        Self {
            w1,
            w2,
            b1: Array1::zeros(hidden),
            b2: Array1::zeros(visible),
        }
    }

    pub fn zeros(shape: LayerShape) -> Self {
        let LayerShape { visible, hidden } = shape;
        Self {
            w1: Array2::zeros((hidden, visible)),
            w2: Array2::zeros((visible, hidden)),
            b1: Array1::zeros(hidden),
            b2: Array1::zeros(visible),
        }
    }

    /// Assembles a layer from its parts, enforcing the shape invariant.
    pub fn from_parts(
        w1: Array2<f64>,
        w2: Array2<f64>,
        b1: Array1<f64>,
        b2: Array1<f64>,
    ) -> Result<Self> {
        let params = Self { w1, w2, b1, b2 };
        params.check_shape(params.shape())?;
        Ok(params)
    }

    pub fn shape(&self) -> LayerShape {
        LayerShape::new(self.w1.ncols(), self.w1.nrows())
    }

    /// Verifies every part against the declared `(visible, hidden)` pair.
    pub fn check_shape(&self, shape: LayerShape) -> Result<()> {
        let LayerShape { visible, hidden } = shape;
        if self.w1.dim() != (hidden, visible) {
            return Err(AeError::shape("W1", &[hidden, visible], self.w1.shape()));
        }
        if self.w2.dim() != (visible, hidden) {
            return Err(AeError::shape("W2", &[visible, hidden], self.w2.shape()));
        }
        if self.b1.len() != hidden {
            return Err(AeError::shape("b1", &[hidden], &[self.b1.len()]));
        }
        if self.b2.len() != visible {
            return Err(AeError::shape("b2", &[visible], &[self.b2.len()]));
        }
        Ok(())
    }

    pub fn zeros_like(&self) -> Self {
        Self::zeros(self.shape())
    }

    /// Multiplies every entry by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.w1 *= factor;
        self.w2 *= factor;
        self.b1 *= factor;
        self.b2 *= factor;
    }

    pub fn scaled(&self, factor: f64) -> Self {
        let mut out = self.clone();
        out.scale(factor);
        out
    }

    /// `self += alpha * other`.
    pub fn add_scaled(&mut self, alpha: f64, other: &Self) {
        self.w1.scaled_add(alpha, &other.w1);
        self.w2.scaled_add(alpha, &other.w2);
        self.b1.scaled_add(alpha, &other.b1);
        self.b2.scaled_add(alpha, &other.b2);
    }

    /// Entrywise `self - baseline`.
    pub fn delta_from(&self, baseline: &Self) -> Self {
        Self {
            w1: &self.w1 - &baseline.w1,
            w2: &self.w2 - &baseline.w2,
            b1: &self.b1 - &baseline.b1,
            b2: &self.b2 - &baseline.b2,
        }
    }

    /// Squared Frobenius norms of both weight matrices, summed.
    pub fn weight_norm_sq(&self) -> f64 {
        self.w1.iter().map(|w| w * w).sum::<f64>() + self.w2.iter().map(|w| w * w).sum::<f64>()
    }

    /// Largest absolute entrywise difference across all four parts.
    pub fn max_abs_diff(&self, other: &Self) -> f64 {
        fn part_max<'a>(a: impl Iterator<Item = &'a f64>, b: impl Iterator<Item = &'a f64>) -> f64 {
            a.zip(b).fold(0.0, |acc, (x, y)| acc.max((x - y).abs()))
        }
        part_max(self.w1.iter(), other.w1.iter())
            .max(part_max(self.w2.iter(), other.w2.iter()))
            .max(part_max(self.b1.iter(), other.b1.iter()))
            .max(part_max(self.b2.iter(), other.b2.iter()))
    }

    pub fn is_finite(&self) -> bool {
        self.w1
            .iter()
            .chain(self.w2.iter())
            .chain(self.b1.iter())
            .chain(self.b2.iter())
            .all(|v| v.is_finite())
    }
}

impl Layer for LayerParameters {
    fn input_size(&self) -> usize {
        self.w1.ncols()
    }

    fn output_size(&self) -> usize {
        self.w1.nrows()
    }

    fn parameter_count(&self) -> usize {
        self.w1.len() + self.w2.len() + self.b1.len() + self.b2.len()
    }

    fn encode(&self, data: &Array2<f64>) -> Array2<f64> {
        let mut encoded = self.w1.dot(data);
        for mut column in encoded.columns_mut() {
            column += &self.b1;
        }
        encoded
    }
}

/// Ordered layers of the stacked autoencoder with their size chain
/// `[visible, hidden_1, ..., hidden_k]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LayerStack {
    layers: Vec<LayerParameters>,
    sizes: Vec<usize>,
}

impl LayerStack {
    /// Random weights and zero biases for every layer.
    pub fn new(visible_size: usize, hidden_sizes: &[usize], rng: &mut SimpleRng) -> Self {
        let mut sizes = Vec::with_capacity(hidden_sizes.len() + 1);
        sizes.push(visible_size);
        sizes.extend_from_slice(hidden_sizes);

        let layers = sizes
            .windows(2)
            .map(|pair| LayerParameters::random(LayerShape::new(pair[0], pair[1]), rng))
            .collect();

        Self { layers, sizes }
    }

    /// Number of hidden layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    pub fn layer_shape(&self, index: usize) -> LayerShape {
        LayerShape::new(self.sizes[index], self.sizes[index + 1])
    }

    pub fn layer(&self, index: usize) -> &LayerParameters {
        &self.layers[index]
    }

    pub fn layer_mut(&mut self, index: usize) -> &mut LayerParameters {
        &mut self.layers[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerParameters> {
        self.layers.iter()
    }
}
