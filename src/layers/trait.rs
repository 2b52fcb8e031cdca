//! Layer trait definition
//!
//! The trait exposes the parts of a trained layer that the layer-wise driver
//! needs: its dimensions and the encoding used to produce the next layer's input.

use ndarray::Array2;

/// Common interface for a trainable autoencoder layer.
///
/// Sample matrices hold one sample per column, so an encoder mapping
/// `input_size → output_size` turns an `input_size × n` matrix into an
/// `output_size × n` one.
pub trait Layer {
    /// Number of input features per sample.
    fn input_size(&self) -> usize;

    /// Number of encoded features per sample.
    fn output_size(&self) -> usize;

    /// Total count of trainable weights and biases.
    fn parameter_count(&self) -> usize;

    /// Applies the affine encoder `W1·x + b1` to every column, without an
    /// activation; the next layer trains on these pre-activation values.
    ///
    /// # Panics
    ///
    /// Panics if `data.nrows() != self.input_size()`.
    fn encode(&self, data: &Array2<f64>) -> Array2<f64>;
}
