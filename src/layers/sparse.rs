//! Sparse autoencoder objective: reconstruction cost and its gradients.
//!
//! For a sample column `x` the two-stage forward pass is
//!
//! ```text
//! hidden         = f(W1·x + b1)
//! reconstruction = f(W2·hidden + b2)
//! ```
//!
//! and the cost over `n` samples is
//!
//! ```text
//! J = Σ‖x - reconstruction‖² / (2n)
//!   + λ/2 · (‖W1‖²_F + ‖W2‖²_F)
//!   + β · Σ_j KL(p ‖ ρ_j)
//! ```
//!
//! where `ρ` is the mean hidden activation and `p` the sparsity target.
//!
//! Backpropagation (shared by every gradient variant):
//!
//! ```text
//! δ_out    = -(x - reconstruction) ⊙ f'(reconstruction)
//! sparsity = -p/ρ + (1-p)/(1-ρ)
//! δ_hidden = (W2ᵗ·δ_out + β·sparsity) ⊙ f'(hidden)
//! dW1 += δ_hidden·xᵗ    dW2 += δ_out·hiddenᵗ
//! db1 += δ_hidden       db2 += δ_out
//! ```
//!
//! followed by `dW += λ·W` for both weight matrices (never the biases).
//!
//! # Numerical guard
//!
//! `ρ` is clamped into `[RHO_EPSILON, 1 - RHO_EPSILON]` before it enters the KL
//! term, so saturated hidden units produce a large but finite penalty instead
//! of `inf`/`NaN`. Outside that range the penalty is constant and its
//! derivative is zero.
//!
//! The KL term is only meaningful for sigmoid hidden units; configuration
//! rejects other activations combined with a positive sparsity weight.

use crate::layers::{LayerGradients, LayerParameters};
use crate::utils::Activation;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use tracing::debug;

/// Clamp applied to the mean hidden activation before the KL penalty.
pub const RHO_EPSILON: f64 = 1e-6;

/// Hyperparameters of the per-layer objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SparseObjective {
    pub activation: Activation,
    /// λ, the weight-decay coefficient.
    pub weight_decay: f64,
    /// p, the desired mean activation of each hidden unit.
    pub sparsity_target: f64,
    /// β, the weight of the KL sparsity penalty.
    pub sparsity_weight: f64,
}

/// Pre- and post-activation values of one forward pass.
#[derive(Debug, Clone)]
pub struct ActivationCache {
    pub input: Array1<f64>,
    pub hidden_pre: Array1<f64>,
    pub hidden: Array1<f64>,
    pub output_pre: Array1<f64>,
    pub reconstruction: Array1<f64>,
}

impl Default for SparseObjective {
    fn default() -> Self {
        Self {
            activation: Activation::Sigmoid,
            weight_decay: 0.0,
            sparsity_target: 0.05,
            sparsity_weight: 0.0,
        }
    }
}

impl SparseObjective {
    /// Runs the encoder and decoder on a single sample.
    pub fn forward(&self, params: &LayerParameters, x: ArrayView1<f64>) -> ActivationCache {
        let hidden_pre = params.w1.dot(&x) + &params.b1;
        let hidden = self.activation.apply(&hidden_pre);
        let output_pre = params.w2.dot(&hidden) + &params.b2;
        let reconstruction = self.activation.apply(&output_pre);
        ActivationCache {
            input: x.to_owned(),
            hidden_pre,
            hidden,
            output_pre,
            reconstruction,
        }
    }

    /// Hidden activation of a single sample (encoder stage only).
    fn encode_sample(&self, params: &LayerParameters, x: ArrayView1<f64>) -> Array1<f64> {
        self.activation.apply(&(params.w1.dot(&x) + &params.b1))
    }

    /// Mean hidden activation ρ over the selected sample columns.
    pub fn mean_activation(
        &self,
        params: &LayerParameters,
        data: &Array2<f64>,
        indices: &[usize],
    ) -> Array1<f64> {
        let mut rho = Array1::zeros(params.b1.len());
        for &i in indices {
            rho += &self.encode_sample(params, data.column(i));
        }
        if !indices.is_empty() {
            rho /= indices.len() as f64;
        }
        rho
    }

    /// Reconstruction cost over every column of `data`, including the weight
    /// decay and sparsity terms.
    pub fn cost(&self, params: &LayerParameters, data: &Array2<f64>) -> f64 {
        let n = data.ncols();
        let mut error = 0.0;
        let mut rho = Array1::<f64>::zeros(params.b1.len());

        for x in data.axis_iter(Axis(1)) {
            let cache = self.forward(params, x);
            error += (&cache.input - &cache.reconstruction)
                .mapv(|d| d * d / 2.0)
                .sum();
            rho += &cache.hidden;
        }

        if n > 0 {
            error /= n as f64;
            rho /= n as f64;
        }

        let rho = clamp_rho(&rho);
        let p = self.sparsity_target;
        let kl: f64 = rho
            .iter()
            .map(|&r| p * (p / r).ln() + (1.0 - p) * ((1.0 - p) / (1.0 - r)).ln())
            .sum();

        error + self.weight_decay / 2.0 * params.weight_norm_sq() + self.sparsity_weight * kl
    }

    /// Gradient averaged over every column of `data`, with ρ taken over the
    /// whole dataset.
    pub fn batch_gradient(&self, params: &LayerParameters, data: &Array2<f64>) -> LayerGradients {
        let indices: Vec<usize> = (0..data.ncols()).collect();
        let rho = self.mean_activation(params, data, &indices);
        self.averaged_gradient(params, data, &indices, &rho)
    }

    /// Unnormalized gradient of one sample; ρ is that sample's own hidden
    /// activation.
    pub fn stochastic_gradient(
        &self,
        params: &LayerParameters,
        data: &Array2<f64>,
        index: usize,
    ) -> LayerGradients {
        let cache = self.forward(params, data.column(index));
        let sparsity = self.sparsity_term(&cache.hidden);
        let mut grad = params.zeros_like();
        self.accumulate(params, &cache, &sparsity, &mut grad);
        self.add_weight_decay(params, &mut grad);
        grad
    }

    /// Gradient averaged over a mini-batch, with ρ computed from that
    /// mini-batch in a forward-only pass first.
    ///
    /// A subset of exactly one sample takes the stochastic path.
    pub fn mini_batch_gradient(
        &self,
        params: &LayerParameters,
        data: &Array2<f64>,
        indices: &[usize],
    ) -> LayerGradients {
        if let [single] = indices {
            return self.stochastic_gradient(params, data, *single);
        }
        let rho = self.mean_activation(params, data, indices);
        self.averaged_gradient(params, data, indices, &rho)
    }

    fn averaged_gradient(
        &self,
        params: &LayerParameters,
        data: &Array2<f64>,
        indices: &[usize],
        rho: &Array1<f64>,
    ) -> LayerGradients {
        let sparsity = self.sparsity_term(rho);
        let mut grad = params.zeros_like();
        for &i in indices {
            let cache = self.forward(params, data.column(i));
            self.accumulate(params, &cache, &sparsity, &mut grad);
        }
        if !indices.is_empty() {
            grad.scale(1.0 / indices.len() as f64);
        }
        self.add_weight_decay(params, &mut grad);
        grad
    }

    /// Derivative of the KL penalty with respect to ρ: `-p/ρ + (1-p)/(1-ρ)`.
    /// Zero where ρ falls outside the clamp range, since the clamped cost is
    /// flat there.
    fn sparsity_term(&self, rho: &Array1<f64>) -> Array1<f64> {
        let p = self.sparsity_target;
        let upper = 1.0 - RHO_EPSILON;
        rho.mapv(|r| {
            if (RHO_EPSILON..=upper).contains(&r) {
                -p / r + (1.0 - p) / (1.0 - r)
            } else {
                0.0
            }
        })
    }

    /// Adds one sample's backpropagated contribution to `grad`.
    fn accumulate(
        &self,
        params: &LayerParameters,
        cache: &ActivationCache,
        sparsity: &Array1<f64>,
        grad: &mut LayerGradients,
    ) {
        let delta_out = -(&cache.input - &cache.reconstruction)
            * self.activation.derivative(&cache.reconstruction);

        let delta_hidden = (params.w2.t().dot(&delta_out) + self.sparsity_weight * sparsity)
            * self.activation.derivative(&cache.hidden);

        grad.w1 += &outer(&delta_hidden, &cache.input);
        grad.w2 += &outer(&delta_out, &cache.hidden);
        grad.b1 += &delta_hidden;
        grad.b2 += &delta_out;
    }

    fn add_weight_decay(&self, params: &LayerParameters, grad: &mut LayerGradients) {
        if self.weight_decay != 0.0 {
            grad.w1.scaled_add(self.weight_decay, &params.w1);
            grad.w2.scaled_add(self.weight_decay, &params.w2);
        }
    }
}

fn clamp_rho(rho: &Array1<f64>) -> Array1<f64> {
    let upper = 1.0 - RHO_EPSILON;
    if rho.iter().any(|&r| !(RHO_EPSILON..=upper).contains(&r)) {
        debug!("clamping saturated mean activation into [{RHO_EPSILON}, {upper}]");
    }
    rho.mapv(|r| r.clamp(RHO_EPSILON, upper))
}

/// Outer product `a·bᵗ`.
fn outer(a: &Array1<f64>, b: &Array1<f64>) -> Array2<f64> {
    let column = a.view().insert_axis(Axis(1));
    let row = b.view().insert_axis(Axis(0));
    column.dot(&row)
}
