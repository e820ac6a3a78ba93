//! Architecture configuration for the LeNet-5 network
//!
//! The layer graph itself is fixed (see [`crate::model::LeNet5`]); this
//! module only sizes it. Loading an architecture from JSON lets the same
//! topology run on small synthetic inputs in tests and on 32×32 digits in
//! the demo without code changes.

use crate::error::{NetError, Result};
use crate::layers::Activation;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::Path;

/// Sizes of every layer in the LeNet-5 stack.
///
/// Missing JSON fields take the classic LeNet-5 values: single-channel
/// 32×32 input, 6 then 16 filters of 5×5, 2×2 max pooling, 120 and 84
/// hidden units, 10 classes, tanh activations.
///
/// # Example
///
/// ```json
/// {
///   "input_height": 16,
///   "input_width": 16,
///   "num_classes": 2,
///   "kernel_size": 3,
///   "conv1_filters": 2,
///   "conv2_filters": 4,
///   "fc1_units": 12,
///   "fc2_units": 8,
///   "activation": "relu"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeNet5Config {
    pub in_channels: usize,
    pub input_height: usize,
    pub input_width: usize,
    pub num_classes: usize,
    /// Square kernel size shared by both convolutions
    pub kernel_size: usize,
    pub conv1_filters: usize,
    pub conv2_filters: usize,
    pub fc1_units: usize,
    pub fc2_units: usize,
    /// Pooling window, also used as the pooling stride
    pub pool_size: usize,
    pub activation: Activation,
}

impl Default for LeNet5Config {
    fn default() -> Self {
        Self {
            in_channels: 1,
            input_height: 32,
            input_width: 32,
            num_classes: 10,
            kernel_size: 5,
            conv1_filters: 6,
            conv2_filters: 16,
            fc1_units: 120,
            fc2_units: 84,
            pool_size: 2,
            activation: Activation::Tanh,
        }
    }
}

/// Spatial size after each stage, as `(height, width)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureMapSizes {
    pub conv1: (usize, usize),
    pub pool1: (usize, usize),
    pub conv2: (usize, usize),
    pub pool2: (usize, usize),
}

fn conv_extent(input: usize, kernel: usize) -> Option<usize> {
    input.checked_sub(kernel).map(|rest| rest + 1)
}

fn pool_extent(input: usize, window: usize) -> Option<usize> {
    input.checked_sub(window).map(|rest| rest / window + 1)
}

impl LeNet5Config {
    /// Feature map sizes through both conv/pool stages.
    ///
    /// # Errors
    ///
    /// [`NetError::InvalidConfig`] naming the first stage whose window no
    /// longer fits.
    pub fn feature_maps(&self) -> Result<FeatureMapSizes> {
        let stage = |name: &str, extent: Option<usize>| {
            extent.filter(|&e| e > 0).ok_or_else(|| {
                NetError::InvalidConfig(format!(
                    "{name} window does not fit a {}x{} input",
                    self.input_height, self.input_width
                ))
            })
        };

        let k = self.kernel_size;
        let p = self.pool_size;
        let conv1 = (
            stage("conv1", conv_extent(self.input_height, k))?,
            stage("conv1", conv_extent(self.input_width, k))?,
        );
        let pool1 = (
            stage("pool1", pool_extent(conv1.0, p))?,
            stage("pool1", pool_extent(conv1.1, p))?,
        );
        let conv2 = (
            stage("conv2", conv_extent(pool1.0, k))?,
            stage("conv2", conv_extent(pool1.1, k))?,
        );
        let pool2 = (
            stage("pool2", pool_extent(conv2.0, p))?,
            stage("pool2", pool_extent(conv2.1, p))?,
        );

        Ok(FeatureMapSizes {
            conv1,
            pool1,
            conv2,
            pool2,
        })
    }

    /// Validate the configuration and return the flattened feature count
    /// fed into `fc1`.
    pub fn validate(&self) -> Result<usize> {
        let positive = [
            ("in_channels", self.in_channels),
            ("input_height", self.input_height),
            ("input_width", self.input_width),
            ("num_classes", self.num_classes),
            ("kernel_size", self.kernel_size),
            ("conv1_filters", self.conv1_filters),
            ("conv2_filters", self.conv2_filters),
            ("fc1_units", self.fc1_units),
            ("fc2_units", self.fc2_units),
            ("pool_size", self.pool_size),
        ];
        if let Some((field, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(NetError::InvalidConfig(format!(
                "{field} must be greater than 0"
            )));
        }

        let maps = self.feature_maps()?;
        Ok(self.conv2_filters * maps.pool2.0 * maps.pool2.1)
    }

    /// Number of features entering `fc1`, or `None` for an invalid config.
    pub fn flattened_size(&self) -> Option<usize> {
        self.validate().ok()
    }
}

/// Loads an architecture configuration from a JSON file.
///
/// # Examples
///
/// ```no_run
/// use cnn_from_scratch::architecture::load_architecture;
///
/// let arch = load_architecture("config/architectures/lenet5.json").unwrap();
/// assert_eq!(arch.flattened_size(), Some(400));
/// ```
pub fn load_architecture(path: impl AsRef<Path>) -> std::result::Result<LeNet5Config, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let config: LeNet5Config = serde_json::from_str(&contents)?;
    config.validate()?;
    Ok(config)
}
