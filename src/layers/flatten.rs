//! Flatten layer: `[N, ...] -> [N, features]`.

use crate::error::{NetError, Result};
use crate::layers::{Layer, LayerGradients};
use ndarray::{ArrayD, IxDyn};

/// Collapses every axis after the batch axis into one feature axis.
pub struct FlattenLayer {
    name: String,
    cache: Option<Vec<usize>>,
}

impl FlattenLayer {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cache: None,
        }
    }
}

impl Layer for FlattenLayer {
    fn name(&self) -> &str {
        &self.name
    }

    fn forward(&mut self, input: &ArrayD<f64>) -> Result<ArrayD<f64>> {
        self.cache = None;
        let shape = self.output_shape(input.shape())?;

        let output = input
            .as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(&shape))?;
        self.cache = Some(input.shape().to_vec());
        Ok(output)
    }

    fn backward(&mut self, grad_output: &ArrayD<f64>) -> Result<LayerGradients> {
        let original = self.cache.take().ok_or_else(|| NetError::stale(&self.name))?;

        let expected = self.output_shape(&original)?;
        if grad_output.shape() != expected.as_slice() {
            return Err(NetError::shape(
                &self.name,
                format!("{:?}", expected),
                grad_output.shape(),
            ));
        }

        let grad_input = grad_output
            .as_standard_layout()
            .into_owned()
            .into_shape(IxDyn(&original))?;
        Ok(LayerGradients {
            input: grad_input,
            params: Vec::new(),
        })
    }

    fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        match input_shape.split_first() {
            Some((&batch, rest)) if !rest.is_empty() => {
                Ok(vec![batch, rest.iter().product()])
            }
            _ => Err(NetError::shape(&self.name, "[N, ...] with rank >= 2", input_shape)),
        }
    }
}
