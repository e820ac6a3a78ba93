//! Adam (Adaptive Moment Estimation) optimizer implementation
//!
//! This module provides the Adam optimizer, which combines momentum and
//! adaptive learning rates with bias correction for improved convergence.

use crate::error::Result;
use crate::optimizers::Optimizer;
use crate::params::Params;
use ndarray::{ArrayD, Zip};
use serde::{Deserialize, Serialize};

/// Adam hyperparameters.
///
/// The defaults are the values recommended in the original paper:
/// learning_rate 0.001, beta1 0.9, beta2 0.999, epsilon 1e-8.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdamConfig {
    pub learning_rate: f64,
    pub beta1: f64,
    pub beta2: f64,
    pub epsilon: f64,
}

impl Default for AdamConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.001,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-8,
        }
    }
}

/// Adam (Adaptive Moment Estimation) optimizer.
///
/// Per named parameter it keeps two moving averages, all zero at
/// construction, and one step counter shared by every parameter:
///
/// ```text
/// t     = t + 1
/// m     = β1 * m + (1 - β1) * g
/// v     = β2 * v + (1 - β2) * g²
/// m_hat = m / (1 - β1^t)
/// v_hat = v / (1 - β2^t)
/// p     = p - α * m_hat / (√v_hat + ε)
/// ```
///
/// # Reference
///
/// Kingma, D. P., & Ba, J. (2014). Adam: A method for stochastic optimization.
/// arXiv preprint arXiv:1412.6980.
pub struct Adam {
    config: AdamConfig,
    params: Params,
    /// First moment estimates (momentum)
    m: Params,
    /// Second moment estimates (adaptive learning rate)
    v: Params,
    /// Time step counter for bias correction
    t: usize,
}

impl Adam {
    /// Creates a new Adam optimizer tracking a copy of `params`.
    pub fn new(config: AdamConfig, params: &Params) -> Self {
        Self {
            config,
            params: params.clone(),
            m: zeros_like(params),
            v: zeros_like(params),
            t: 0,
        }
    }

    pub fn config(&self) -> &AdamConfig {
        &self.config
    }

    pub fn first_moment(&self) -> &Params {
        &self.m
    }

    pub fn second_moment(&self) -> &Params {
        &self.v
    }

    /// Bias-correction denominators `(1 - β1^t, 1 - β2^t)` for the current step.
    pub fn bias_corrections(&self) -> (f64, f64) {
        let t = self.t as i32;
        (
            1.0 - self.config.beta1.powi(t),
            1.0 - self.config.beta2.powi(t),
        )
    }
}

fn zeros_like(params: &Params) -> Params {
    params
        .iter()
        .map(|(name, value)| (name.to_string(), ArrayD::zeros(value.raw_dim())))
        .collect()
}

impl Optimizer for Adam {
    fn update_params(&mut self, gradients: &Params) -> Result<Params> {
        self.params.check_aligned(gradients, "adam")?;

        self.t += 1;
        let (bias_correction1, bias_correction2) = self.bias_corrections();
        let AdamConfig {
            learning_rate,
            beta1,
            beta2,
            epsilon,
        } = self.config;

        // All four mappings share the same name order (checked above).
        let tracked = self
            .params
            .iter_mut()
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
            .zip(gradients.iter());
        for ((((_, param), (_, m)), (_, v)), (_, grad)) in tracked {
            Zip::from(param)
                .and(m)
                .and(v)
                .and(grad)
                .for_each(|p, m, v, &g| {
                    *m = beta1 * *m + (1.0 - beta1) * g;
                    *v = beta2 * *v + (1.0 - beta2) * g * g;
                    let m_hat = *m / bias_correction1;
                    let v_hat = *v / bias_correction2;
                    *p -= learning_rate * m_hat / (v_hat.sqrt() + epsilon);
                });
        }

        Ok(self.params.clone())
    }

    fn params(&self) -> &Params {
        &self.params
    }

    fn load_params(&mut self, params: &Params) -> Result<()> {
        self.params = self.params.reordered(params, "adam")?;
        Ok(())
    }

    fn step_count(&self) -> usize {
        self.t
    }

    fn reset(&mut self) {
        self.m = zeros_like(&self.params);
        self.v = zeros_like(&self.params);
        self.t = 0;
    }

    fn learning_rate(&self) -> f64 {
        self.config.learning_rate
    }

    fn set_learning_rate(&mut self, lr: f64) {
        self.config.learning_rate = lr;
    }
}
