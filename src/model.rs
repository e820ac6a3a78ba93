//! LeNet-5 model: the fixed layer stack and its parameter plumbing.
//!
//! ```text
//! conv1 → act1 → pool1 → conv2 → act2 → pool2 → flatten → fc1 → act3 → fc2 → act4 → fc3
//! ```
//!
//! `fc3` produces raw class logits; softmax lives in
//! [`crate::loss::CrossEntropyLoss`].

use crate::architecture::LeNet5Config;
use crate::error::{NetError, Result};
use crate::layers::{
    ActivationLayer, Conv2DLayer, DenseLayer, FlattenLayer, Layer, LayerGradients, MaxPoolLayer,
};
use crate::params::Params;
use crate::utils::SimpleRng;
use ndarray::ArrayD;

/// LeNet-5 convolutional classifier.
pub struct LeNet5 {
    config: LeNet5Config,
    layers: Vec<Box<dyn Layer>>,
}

impl LeNet5 {
    /// Build the network, drawing initial weights from `rng`.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConfig`] if `config` does not describe a network
    /// whose feature maps stay non-empty.
    pub fn new(config: &LeNet5Config, rng: &mut SimpleRng) -> Result<Self> {
        let flattened = config.validate()?;
        let k = config.kernel_size;
        let pool = config.pool_size;
        let act = config.activation;

        let layers: Vec<Box<dyn Layer>> = vec![
            Box::new(Conv2DLayer::new("conv1", config.in_channels, config.conv1_filters, k, 0, 1, rng)),
            Box::new(ActivationLayer::new("act1", act)),
            Box::new(MaxPoolLayer::new("pool1", pool, pool)),
            Box::new(Conv2DLayer::new("conv2", config.conv1_filters, config.conv2_filters, k, 0, 1, rng)),
            Box::new(ActivationLayer::new("act2", act)),
            Box::new(MaxPoolLayer::new("pool2", pool, pool)),
            Box::new(FlattenLayer::new("flatten")),
            Box::new(DenseLayer::new("fc1", flattened, config.fc1_units, rng)),
            Box::new(ActivationLayer::new("act3", act)),
            Box::new(DenseLayer::new("fc2", config.fc1_units, config.fc2_units, rng)),
            Box::new(ActivationLayer::new("act4", act)),
            Box::new(DenseLayer::new("fc3", config.fc2_units, config.num_classes, rng)),
        ];

        Ok(Self {
            config: config.clone(),
            layers,
        })
    }

    /// Build the network with a fresh [`SimpleRng`] seeded with `seed`.
    pub fn with_seed(config: &LeNet5Config, seed: u64) -> Result<Self> {
        let mut rng = SimpleRng::new(seed);
        Self::new(config, &mut rng)
    }

    pub fn config(&self) -> &LeNet5Config {
        &self.config
    }

    /// Layer names in forward order.
    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|layer| layer.name()).collect()
    }

    pub fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    pub fn parameter_count(&self) -> usize {
        self.layers.iter().map(|layer| layer.parameter_count()).sum()
    }

    /// Shape of the logits for an input of shape `input_shape`.
    pub fn output_shape(&self, input_shape: &[usize]) -> Result<Vec<usize>> {
        self.check_input(input_shape)?;
        self.layers
            .iter()
            .try_fold(input_shape.to_vec(), |shape, layer| layer.output_shape(&shape))
    }

    fn check_input(&self, shape: &[usize]) -> Result<()> {
        let c = &self.config;
        let expected = [c.in_channels, c.input_height, c.input_width];
        if shape.len() != 4 || shape[1..] != expected {
            return Err(NetError::shape(
                "lenet5 input",
                format!("[N, {}, {}, {}]", c.in_channels, c.input_height, c.input_width),
                shape,
            ));
        }
        Ok(())
    }

    /// Forward pass over a `[N, C, H, W]` batch, returning `[N, classes]` logits.
    pub fn forward(&mut self, input: &ArrayD<f64>) -> Result<ArrayD<f64>> {
        self.check_input(input.shape())?;

        let mut layers = self.layers.iter_mut();
        let mut activations = match layers.next() {
            Some(first) => first.forward(input)?,
            None => return Ok(input.clone()),
        };
        for layer in layers {
            activations = layer.forward(&activations)?;
        }
        Ok(activations)
    }

    /// Backward pass from the loss seed `[N, classes]`.
    ///
    /// Gradients are assembled in forward layer order, so the names line up
    /// position by position with [`LeNet5::get_params`].
    pub fn backward(&mut self, seed: &ArrayD<f64>) -> Result<Params> {
        self.backward_with_input(seed).map(|(params, _)| params)
    }

    /// Like [`LeNet5::backward`], also returning the gradient with respect
    /// to the input batch.
    pub fn backward_with_input(&mut self, seed: &ArrayD<f64>) -> Result<(Params, ArrayD<f64>)> {
        let mut grad = seed.clone();
        let mut per_layer = Vec::with_capacity(self.layers.len());

        for layer in self.layers.iter_mut().rev() {
            let LayerGradients { input, params } = layer.backward(&grad)?;
            let prefix = layer.name().to_string();
            per_layer.push(
                params
                    .into_iter()
                    .map(|(local, value)| (format!("{prefix}.{local}"), value))
                    .collect::<Vec<_>>(),
            );
            grad = input;
        }

        let grads = per_layer.into_iter().rev().flatten().collect();
        Ok((grads, grad))
    }

    /// Snapshot of every learnable parameter, in forward layer order.
    pub fn get_params(&self) -> Params {
        self.layers
            .iter()
            .flat_map(|layer| {
                layer
                    .params()
                    .into_iter()
                    .map(move |(local, value)| (format!("{}.{}", layer.name(), local), value.to_owned()))
            })
            .collect()
    }

    /// Overwrite every learnable parameter from `params`.
    ///
    /// The mapping must name exactly the parameters [`LeNet5::get_params`]
    /// returns, with identical shapes; order does not matter. Nothing is
    /// written unless the whole mapping is valid.
    pub fn set_params(&mut self, params: &Params) -> Result<()> {
        self.get_params().check_matches(params, "set_params")?;

        for layer in self.layers.iter_mut() {
            let locals: Vec<&'static str> = layer.params().iter().map(|(local, _)| *local).collect();
            for local in locals {
                let full = format!("{}.{}", layer.name(), local);
                let value = params.get(&full).ok_or_else(|| {
                    NetError::ParameterMismatch(format!("set_params: missing parameter '{full}'"))
                })?;
                layer.set_param(local, value)?;
            }
        }
        Ok(())
    }
}
