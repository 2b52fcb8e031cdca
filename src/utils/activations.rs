//! Activation functions for the autoencoder layers
//!
//! This module provides the elementwise nonlinearities used by the encoder and
//! decoder stages:
//! - Sigmoid (default for both stages)
//! - ReLU
//! - Tanh
//!
//! The selector is a closed enumeration resolved once from configuration, so an
//! unsupported name is rejected before any training starts.

use crate::error::{AeError, Result};
use ndarray::{Array, Dimension};
use std::fmt;
use std::str::FromStr;

/// Sigmoid activation function.
///
/// Returns the sigmoid of the input: 1 / (1 + exp(-x))
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Sigmoid derivative assuming a = sigmoid(z).
///
/// Returns the derivative: a * (1 - a)
pub fn sigmoid_derivative(a: f64) -> f64 {
    a * (1.0 - a)
}

/// ReLU activation function: max(x, 0).
pub fn relu(x: f64) -> f64 {
    x.max(0.0)
}

/// Hyperbolic tangent: (e^x - e^-x) / (e^x + e^-x).
pub fn tanh(x: f64) -> f64 {
    x.tanh()
}

/// Nonlinearity applied after each affine stage of a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Activation {
    #[default]
    Sigmoid,
    ReLU,
    Tanh,
}

impl Activation {
    /// Every selector accepted in configuration files.
    pub const NAMES: [&'static str; 3] = ["sigmoid", "relu", "tanh"];

    /// Applies the nonlinearity to a single value.
    pub fn apply_scalar(self, x: f64) -> f64 {
        match self {
            Activation::Sigmoid => sigmoid(x),
            Activation::ReLU => relu(x),
            Activation::Tanh => tanh(x),
        }
    }

    /// Derivative expressed in terms of the activated output `a = f(z)`.
    pub fn derivative_from_output(self, a: f64) -> f64 {
        match self {
            Activation::Sigmoid => sigmoid_derivative(a),
            Activation::ReLU => {
                if a > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            Activation::Tanh => 1.0 - a * a,
        }
    }

    /// Returns the elementwise-transformed container, same shape as the input.
    pub fn apply<D: Dimension>(self, pre_activation: &Array<f64, D>) -> Array<f64, D> {
        pre_activation.mapv(|x| self.apply_scalar(x))
    }

    /// Elementwise derivative for an already activated container.
    pub fn derivative<D: Dimension>(self, activated: &Array<f64, D>) -> Array<f64, D> {
        activated.mapv(|a| self.derivative_from_output(a))
    }

    pub fn name(self) -> &'static str {
        match self {
            Activation::Sigmoid => "sigmoid",
            Activation::ReLU => "relu",
            Activation::Tanh => "tanh",
        }
    }
}

impl FromStr for Activation {
    type Err = AeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "sigmoid" => Ok(Activation::Sigmoid),
            "relu" => Ok(Activation::ReLU),
            "tanh" => Ok(Activation::Tanh),
            other => Err(AeError::Configuration(format!(
                "Invalid activation function '{}'. Must be one of: {}",
                other,
                Activation::NAMES.join(", ")
            ))),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    const EPSILON: f64 = 1e-10;

    #[test]
    fn test_sigmoid_zero() {
        let result = sigmoid(0.0);
        assert!((result - 0.5).abs() < EPSILON);
    }

    #[test]
    fn test_sigmoid_positive() {
        let result = sigmoid(2.0);
        assert!(result > 0.5 && result < 1.0);
    }

    #[test]
    fn test_sigmoid_negative() {
        let result = sigmoid(-2.0);
        assert!(result > 0.0 && result < 0.5);
    }

    #[test]
    fn test_sigmoid_derivative_at_half() {
        let result = sigmoid_derivative(0.5);
        assert!((result - 0.25).abs() < EPSILON);
    }

    #[test]
    fn test_relu_mixed() {
        let data = array![-2.0, -1.0, 0.0, 1.0, 2.0];
        let out = Activation::ReLU.apply(&data);
        assert_eq!(out, array![0.0, 0.0, 0.0, 1.0, 2.0]);
    }

    #[test]
    fn test_tanh_matches_exponential_form() {
        for &x in &[-3.0, -0.5, 0.0, 0.7, 4.0] {
            let expected = (f64::exp(x) - f64::exp(-x)) / (f64::exp(x) + f64::exp(-x));
            assert!((tanh(x) - expected).abs() < EPSILON);
        }
    }

    #[test]
    fn test_apply_preserves_shape() {
        let data = array![[0.0, 1.0, -1.0], [2.0, -2.0, 0.5]];
        for activation in [Activation::Sigmoid, Activation::ReLU, Activation::Tanh] {
            assert_eq!(activation.apply(&data).shape(), data.shape());
        }
    }

    #[test]
    fn test_parse_selectors() {
        assert_eq!("sigmoid".parse::<Activation>().unwrap(), Activation::Sigmoid);
        assert_eq!("ReLU".parse::<Activation>().unwrap(), Activation::ReLU);
        assert_eq!("tanh".parse::<Activation>().unwrap(), Activation::Tanh);
    }

    #[test]
    fn test_unknown_selector_is_configuration_error() {
        let err = "softplus".parse::<Activation>().unwrap_err();
        assert!(matches!(err, AeError::Configuration(_)));
    }
}
