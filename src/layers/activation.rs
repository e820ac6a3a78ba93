//! Elementwise activation layers (ReLU, Sigmoid, Tanh).

use crate::error::{NetError, Result};
use crate::layers::{Layer, LayerGradients};
use crate::utils::activations::{relu, relu_derivative, sigmoid, sigmoid_derivative, tanh_derivative};
use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Supported nonlinearities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    Relu,
    Sigmoid,
    Tanh,
}

impl Activation {
    pub fn apply(self, x: f64) -> f64 {
        match self {
            Activation::Relu => relu(x),
            Activation::Sigmoid => sigmoid(x),
            Activation::Tanh => x.tanh(),
        }
    }

    /// ReLU differentiates its input; sigmoid and tanh their output.
    fn caches_input(self) -> bool {
        matches!(self, Activation::Relu)
    }

    fn derivative_from_cache(self, cached: f64) -> f64 {
        match self {
            Activation::Relu => relu_derivative(cached),
            Activation::Sigmoid => sigmoid_derivative(cached),
            Activation::Tanh => tanh_derivative(cached),
        }
    }
}

impl fmt::Display for Activation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
        };
        f.write_str(name)
    }
}

impl FromStr for Activation {
    type Err = NetError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "relu" => Ok(Activation::Relu),
            "sigmoid" => Ok(Activation::Sigmoid),
            "tanh" => Ok(Activation::Tanh),
            other => Err(NetError::InvalidConfig(format!(
                "Invalid activation function '{}'. Must be one of: relu, sigmoid, tanh",
                other
            ))),
        }
    }
}

/// Stateless activation layer.
pub struct ActivationLayer {
    name: String,
    activation: Activation,
    cache: Option<ArrayD<f64>>,
}

impl ActivationLayer {
    pub fn new(name: impl Into<String>, activation: Activation) -> Self {
        Self {
            name: name.into(),
            activation,
            cache: None,
        }
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }
}

impl Layer for ActivationLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&mut self, input: &ArrayD<f64>) -> Result<ArrayD<f64>> {
        let activation = self.activation;
        let output = input.mapv(|x| activation.apply(x));
        self.cache = Some(if activation.caches_input() {
            input.clone()
        } else {
            output.clone()
        });
        Ok(output)
    }

    fn backward(&mut self, grad_output: &ArrayD<f64>) -> Result<LayerGradients> {
        let cached = self.cache.take().ok_or_else(|| NetError::stale(&self.name))?;
        if grad_output.shape() != cached.shape() {
            return Err(NetError::shape(
                &self.name,
                format!("{:?}", cached.shape()),
                grad_output.shape(),
            ));
        }

        let activation = self.activation;
        let grad_input = Zip::from(grad_output)
            .and(&cached)
            .map_collect(|&g, &c| g * activation.derivative_from_cache(c));

        Ok(LayerGradients {
            input: grad_input,
            params: Vec::new(),
        })
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        Ok(input_shape.to_vec())
    }
}
