//! Dense (fully connected) layer implementation
//!
//! This module provides a DenseLayer (also known as Linear or Fully Connected layer)
//! that performs the transformation: output = input × weights + biases

use crate::error::{NetError, Result};
use crate::layers::{Layer, LayerGradients};
use crate::utils::rng::{xavier_limit, SimpleRng};
use ndarray::{Array1, Array2, ArrayD, ArrayViewD, Axis, Ix1, Ix2};

/// Dense (fully connected) layer with weights and biases.
///
/// Performs the linear transformation: y = xW + b
/// where x is the input (batch_size × input_size),
/// W is the weight matrix (input_size × output_size),
/// and b is the bias vector (output_size).
///
/// # Example
///
/// ```ignore
/// let mut rng = SimpleRng::new(42);
/// let layer = DenseLayer::new("fc1", 400, 120, &mut rng);
/// assert_eq!(layer.input_size(), 400);
/// assert_eq!(layer.output_size(), 120);
/// ```
pub struct DenseLayer {
    name: String,
    weights: Array2<f64>,
    biases: Array1<f64>,
    cache: Option<Array2<f64>>,
}

impl DenseLayer {
    /// Create a new DenseLayer with Xavier initialization.
    ///
    /// Weights are sampled from U[-limit, limit) where
    /// limit = sqrt(6 / (input_size + output_size)). Biases are initialized to zero.
    pub fn new(
        name: impl Into<String>,
        input_size: usize,
        output_size: usize,
        rng: &mut SimpleRng,
    ) -> Self {
        let limit = xavier_limit(input_size, output_size);
        let weights = Array2::from_shape_simple_fn((input_size, output_size), || {
            rng.gen_range_f64(-limit, limit)
        });

        Self {
            name: name.into(),
            weights,
            biases: Array1::zeros(output_size),
            cache: None,
        }
    }

    /// Get the input size of the layer.
    pub fn input_size(&self) -> usize {
        self.weights.nrows()
    }

    /// Get the output size of the layer.
    pub fn output_size(&self) -> usize {
        self.weights.ncols()
    }

    pub fn weights(&self) -> &Array2<f64> {
        &self.weights
    }

    pub fn biases(&self) -> &Array1<f64> {
        &self.biases
    }

    fn expected_input(&self) -> String {
        format!("[N, {}]", self.input_size())
    }
}

impl Layer for DenseLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&mut self, input: &ArrayD<f64>) -> Result<ArrayD<f64>> {
        self.cache = None;

        let x = input
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| NetError::shape(&self.name, self.expected_input(), input.shape()))?;
        if x.ncols() != self.input_size() {
            return Err(NetError::shape(&self.name, self.expected_input(), input.shape()));
        }

        let output = x.dot(&self.weights) + &self.biases;
        self.cache = Some(x.to_owned());
        Ok(output.into_dyn())
    }

    fn backward(&mut self, grad_output: &ArrayD<f64>) -> Result<LayerGradients> {
        let x = self.cache.take().ok_or_else(|| NetError::stale(&self.name))?;

        let expected = [x.nrows(), self.output_size()];
        if grad_output.shape() != expected {
            return Err(NetError::shape(
                &self.name,
                format!("{:?}", expected),
                grad_output.shape(),
            ));
        }
        let grad = grad_output.view().into_dimensionality::<Ix2>()?;

        let grad_input = grad.dot(&self.weights.t());
        let grad_weights = x.t().dot(&grad);
        let grad_biases = grad.sum_axis(Axis(0));

        Ok(LayerGradients {
            input: grad_input.into_dyn(),
            params: vec![
                ("weight", grad_weights.into_dyn()),
                ("bias", grad_biases.into_dyn()),
            ],
        })
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        match input_shape {
            &[batch, features] if features == self.input_size() => {
                Ok(vec![batch, self.output_size()])
            }
            _ => Err(NetError::shape(&self.name, self.expected_input(), input_shape)),
        }
    }

    fn params(&self) -> Vec<(&'static str, ArrayViewD<'_, f64>)> {
        vec![
            ("weight", self.weights.view().into_dyn()),
            ("bias", self.biases.view().into_dyn()),
        ]
    }

    fn set_param(&mut self, name: &str, value: &ArrayD<f64>) -> Result<()> {
        match name {
            "weight" if value.shape() == self.weights.shape() => {
                self.weights.assign(&value.view().into_dimensionality::<Ix2>()?);
                Ok(())
            }
            "bias" if value.shape() == self.biases.shape() => {
                self.biases.assign(&value.view().into_dimensionality::<Ix1>()?);
                Ok(())
            }
            "weight" | "bias" => Err(NetError::ParameterMismatch(format!(
                "{}.{} cannot take shape {:?}",
                self.name,
                name,
                value.shape()
            ))),
            _ => Err(NetError::ParameterMismatch(format!(
                "{} has no parameter '{}'",
                self.name, name
            ))),
        }
    }
}
