//! Optimizer abstractions for neural network parameter updates
//!
//! Optimizers take the gradient mapping produced by `LeNet5::backward` and
//! return the full, updated parameter mapping, which the training loop writes
//! back with `LeNet5::set_params`.
//!
//! # Available Optimizers
//!
//! - SGD: Vanilla stochastic gradient descent
//! - Adam: Adaptive moment estimation with bias correction
//!
//! # Example
//!
//! ```ignore
//! let mut optimizer = Adam::new(AdamConfig::default(), &model.get_params());
//!
//! let logits = model.forward(&batch)?;
//! let (loss, seed) = CrossEntropyLoss::new().get(&logits, &labels)?;
//! let grads = model.backward(&seed)?;
//! let params = optimizer.update_params(&grads)?;
//! model.set_params(&params)?;
//! ```

pub mod adam;
pub mod sgd;

pub use adam::{Adam, AdamConfig};
pub use sgd::Sgd;

use crate::config::{OptimizerKind, TrainingConfig};
use crate::error::Result;
use crate::params::Params;

/// Core trait for neural network optimizers.
///
/// Optimizers own a copy of the parameters they were built from and track
/// them by name. Every call checks that the incoming gradients carry exactly
/// the tracked names, in order, with matching shapes; a mismatch means the
/// optimizer and the model disagree about the architecture and is an error.
pub trait Optimizer {
    /// Apply one update step and return the complete new parameter mapping.
    ///
    /// # Errors
    ///
    /// [`crate::NetError::ParameterMismatch`] when `gradients` contains an
    /// unknown name, lacks a tracked name, or has a wrong shape. State is
    /// left untouched in that case.
    fn update_params(&mut self, gradients: &Params) -> Result<Params>;

    /// Parameters as of the last update.
    fn params(&self) -> &Params;

    /// Replace the tracked parameters (after loading a checkpoint) without
    /// touching the moment estimates or the step counter.
    fn load_params(&mut self, params: &Params) -> Result<()>;

    /// Number of successful update steps so far.
    fn step_count(&self) -> usize;

    /// Clear accumulated state and the step counter.
    fn reset(&mut self);

    fn learning_rate(&self) -> f64;

    fn set_learning_rate(&mut self, lr: f64);
}

/// Build the optimizer selected in `config`, tracking `params`.
pub fn build(config: &TrainingConfig, params: &Params) -> Box<dyn Optimizer> {
    match config.optimizer {
        OptimizerKind::Adam => Box::new(Adam::new(
            AdamConfig {
                learning_rate: config.learning_rate,
                beta1: config.beta1,
                beta2: config.beta2,
                epsilon: config.epsilon,
            },
            params,
        )),
        OptimizerKind::Sgd => Box::new(Sgd::new(config.learning_rate, params)),
    }
}
