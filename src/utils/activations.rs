//! Activation functions for neural networks
//!
//! Scalar nonlinearities and their derivatives, plus a row-wise softmax.
//! Derivatives of sigmoid and tanh are expressed in terms of the function's
//! output, which is what the activation layer caches.

use ndarray::{Array2, Axis};

/// Sigmoid activation function.
///
/// Returns the sigmoid of the input: 1 / (1 + exp(-x))
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// Sigmoid derivative assuming s = sigmoid(z).
pub fn sigmoid_derivative(s: f64) -> f64 {
    s * (1.0 - s)
}

/// Tanh derivative assuming t = tanh(z).
pub fn tanh_derivative(t: f64) -> f64 {
    1.0 - t * t
}

/// ReLU activation function.
pub fn relu(x: f64) -> f64 {
    if x > 0.0 {
        x
    } else {
        0.0
    }
}

/// ReLU sub-gradient, evaluated on the pre-activation. Zero at zero.
pub fn relu_derivative(x: f64) -> f64 {
    if x > 0.0 {
        1.0
    } else {
        0.0
    }
}

/// Softmax applied row-wise.
///
/// Subtracts each row's maximum before exponentiating so large logits do
/// not overflow.
pub fn softmax_rows(logits: &Array2<f64>) -> Array2<f64> {
    let mut probs = logits.clone();
    for mut row in probs.axis_iter_mut(Axis(0)) {
        let max_value = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        row.mapv_inplace(|v| (v - max_value).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    probs
}
