//! Layer trait definition for neural network layers
//!
//! This module defines the core Layer trait that all layer types must implement.
//! The trait provides a common interface for forward propagation, backward
//! propagation and access to the layer's learnable parameters.

use crate::error::{NetError, Result};
use ndarray::{ArrayD, ArrayViewD};

/// Gradients produced by one backward call.
///
/// `params` uses the layer-local parameter names (`"weight"`, `"bias"`) in
/// the same order as [`Layer::params`].
#[derive(Debug, Clone)]
pub struct LayerGradients {
    /// Gradient of the loss with respect to the layer input.
    pub input: ArrayD<f64>,
    /// Gradient of the loss with respect to each learnable parameter.
    pub params: Vec<(&'static str, ArrayD<f64>)>,
}

/// Core trait for neural network layers.
///
/// All layer types (Conv2D, MaxPool, Flatten, Dense, Activation) implement
/// this trait so the model can hold them in one ordered list.
///
/// # Cache lifecycle
///
/// `forward` records whatever `backward` needs (inputs, argmax positions,
/// activation outputs). `backward` consumes that record; calling it a second
/// time without another `forward` returns [`NetError::StaleCache`].
///
/// # Example
///
/// ```ignore
/// let output = layer.forward(&input)?;
/// let grads = layer.backward(&grad_output)?;
/// assert_eq!(grads.input.shape(), input.shape());
/// ```
pub trait Layer {
    /// Stable name used to prefix this layer's parameters (e.g. `conv1`).
    fn name(&self) -> &str;

    /// Forward propagation through the layer.
    ///
    /// # Errors
    ///
    /// Returns [`NetError::ShapeMismatch`] when `input` is incompatible with
    /// the layer configuration.
    fn forward(&mut self, input: &ArrayD<f64>) -> Result<ArrayD<f64>>;

    /// Backward propagation through the layer.
    ///
    /// Computes the gradient with respect to the layer input and to each
    /// parameter, given the gradient of the loss with respect to the output
    /// of the most recent forward call.
    fn backward(&mut self, grad_output: &ArrayD<f64>) -> Result<LayerGradients>;

    /// Shape produced by `forward` for an input of shape `input_shape`.
    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>>;

    /// Learnable parameters by local name. Empty for stateless layers.
    fn params(&self) -> Vec<(&'static str, ArrayViewD<'_, f64>)> {
        Vec::new()
    }

    /// Replace one learnable parameter. The shape must match the current one.
    fn set_param(&mut self, name: &str, _value: &ArrayD<f64>) -> Result<()> {
        Err(NetError::ParameterMismatch(format!(
            "{} has no parameter '{}'",
            self.name(),
            name
        )))
    }

    /// Total count of learnable scalars.
    fn parameter_count(&self) -> usize {
        self.params().iter().map(|(_, p)| p.len()).sum()
    }
}
