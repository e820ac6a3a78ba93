//! Stochastic Gradient Descent (SGD) optimizer implementation
//!
//! This module provides a vanilla SGD optimizer that performs the basic
//! gradient descent update: `parameter = parameter - learning_rate * gradient`

use crate::error::Result;
use crate::optimizers::Optimizer;
use crate::params::Params;
use ndarray::Zip;

/// Stochastic Gradient Descent optimizer.
///
/// Implements the basic gradient descent update rule without momentum or
/// adaptive learning rates:
///
/// `w = w - η * ∇L/∂w`
///
/// # Example
///
/// ```ignore
/// use cnn_from_scratch::optimizers::{Optimizer, Sgd};
///
/// let mut optimizer = Sgd::new(0.01, &model.get_params());
/// let params = optimizer.update_params(&grads)?;
/// model.set_params(&params)?;
/// ```
pub struct Sgd {
    learning_rate: f64,
    params: Params,
    steps: usize,
}

impl Sgd {
    /// Creates a new SGD optimizer tracking a copy of `params`.
    pub fn new(learning_rate: f64, params: &Params) -> Self {
        Self {
            learning_rate,
            params: params.clone(),
            steps: 0,
        }
    }
}

impl Optimizer for Sgd {
    fn update_params(&mut self, gradients: &Params) -> Result<Params> {
        self.params.check_aligned(gradients, "sgd")?;

        let lr = self.learning_rate;
        for ((_, param), (_, grad)) in self.params.iter_mut().zip(gradients.iter()) {
            Zip::from(param).and(grad).for_each(|p, &g| *p -= lr * g);
        }
        self.steps += 1;

        Ok(self.params.clone())
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn load_params(&mut self, params: &Params) -> Result<()> {
        self.params = self.params.reordered(params, "sgd")?;
        Ok(())
    }

    fn step_count(&self) -> usize {
        self.steps
    }

    fn reset(&mut self) {
        self.steps = 0;
    }

    fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.learning_rate = lr;
    }
}
