//! Configuration structures for training
//!
//! This module provides the training hyperparameters: optimizer choice and
//! its coefficients, epoch count, batch size, seed and checkpoint location.

use crate::error::NetError;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};

/// Which optimizer the training loop builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    #[default]
    Adam,
    Sgd,
}

/// Training configuration.
///
/// Every field is optional in the JSON file; missing fields fall back to the
/// reference setup (Adam with lr 0.001, β1 0.9, β2 0.999, ε 1e-8, one epoch,
/// batches of 100, seed 42).
///
/// # Example
///
/// ```json
/// {
///   "optimizer": "adam",
///   "learning_rate": 0.001,
///   "epochs": 3,
///   "batch_size": 32,
///   "checkpoint_path": "checkpoints/lenet5_best.json"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub learning_rate: f64,

    /// Exponential decay rate for Adam's first moment
    pub beta1: f64,

    /// Exponential decay rate for Adam's second moment
    pub beta2: f64,

    pub epsilon: f64,

    pub optimizer: OptimizerKind,

    pub epochs: usize,

    pub batch_size: usize,

    /// Seed for weight initialization and data shuffling
    pub seed: u64,

    /// Where the best parameters are written when validation loss improves
    pub checkpoint_path: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
            optimizer: OptimizerKind::Adam,
            epochs: 1,
            batch_size: 100,
            seed: 42,
            checkpoint_path: None,
        }
    }
}

/// Loads a training configuration from a JSON file.
///
/// Reads the file at `path`, deserializes it into a `TrainingConfig` and
/// validates the values.
///
/// # Examples
///
/// ```no_run
/// use cnn_from_scratch::config::load_config;
///
/// let cfg = load_config("config/training_default.json").unwrap();
/// assert_eq!(cfg.batch_size, 100);
/// ```
pub fn load_config(path: impl AsRef<Path>) -> Result<TrainingConfig, Box<dyn Error>> {
    let contents = fs::read_to_string(path)?;
    let config: TrainingConfig = serde_json::from_str(&contents)?;
    validate_config(&config)?;
    Ok(config)
}

fn invalid(message: impl Into<String>) -> Box<dyn Error> {
    Box::new(NetError::InvalidConfig(message.into()))
}

/// Checks that every hyperparameter is in range.
pub fn validate_config(config: &TrainingConfig) -> Result<(), Box<dyn Error>> {
    if config.learning_rate.is_nan() || config.learning_rate <= 0.0 {
        return Err(invalid("learning_rate must be positive"));
    }

    if !(0.0..1.0).contains(&config.beta1) {
        return Err(invalid("beta1 must be in range [0.0, 1.0)"));
    }

    if !(0.0..1.0).contains(&config.beta2) {
        return Err(invalid("beta2 must be in range [0.0, 1.0)"));
    }

    if config.epsilon.is_nan() || config.epsilon <= 0.0 {
        return Err(invalid("epsilon must be positive"));
    }

    if config.epochs == 0 {
        return Err(invalid("epochs must be greater than 0"));
    }

    if config.batch_size == 0 {
        return Err(invalid("batch_size must be greater than 0"));
    }

    Ok(())
}
