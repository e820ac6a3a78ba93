//! Softmax + cross-entropy loss, fused.
//!
//! Computing the two together gives the closed-form gradient
//! `(softmax(logits) - one_hot) / batch_size` with respect to the logits, so
//! the model can end in a plain dense layer and start backprop from there.

use crate::error::{NetError, Result};
use crate::utils::activations::softmax_rows;
use ndarray::{Array2, ArrayD, Ix2, Zip};

/// Lower bound applied to probabilities before taking the log.
pub const PROBABILITY_FLOOR: f64 = 1e-12;

/// Mean negative log-likelihood of the true class over a batch.
#[derive(Debug, Clone, Copy, Default)]
pub struct CrossEntropyLoss;

impl CrossEntropyLoss {
    pub fn new() -> Self {
        Self
    }

    /// Returns `(loss, gradient_seed)` for `logits` and one-hot `labels`,
    /// both `[batch, classes]`.
    ///
    /// # Errors
    ///
    /// [`NetError::ShapeMismatch`] if either input is not rank 2, the shapes
    /// differ, or the batch is empty.
    pub fn get(&self, logits: &ArrayD<f64>, labels: &ArrayD<f64>) -> Result<(f64, ArrayD<f64>)> {
        let logits = logits
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| NetError::shape("cross-entropy logits", "[N, classes]", logits.shape()))?;
        if labels.shape() != logits.shape() {
            return Err(NetError::shape(
                "cross-entropy labels",
                format!("{:?}", logits.shape()),
                labels.shape(),
            ));
        }
        let batch = logits.nrows();
        if batch == 0 || logits.ncols() == 0 {
            return Err(NetError::shape(
                "cross-entropy logits",
                "non-empty [N, classes]",
                logits.shape(),
            ));
        }
        let labels = labels.view().into_dimensionality::<Ix2>()?;

        let probs = softmax_rows(&logits.to_owned());
        let nll: f64 = Zip::from(&probs)
            .and(&labels)
            .fold(0.0, |acc, &p, &y| acc - y * p.max(PROBABILITY_FLOOR).ln());
        let loss = nll / batch as f64;

        let seed: Array2<f64> = (&probs - &labels) / batch as f64;
        Ok((loss, seed.into_dyn()))
    }

    /// Softmax probabilities for `logits` without computing a loss.
    pub fn probabilities(&self, logits: &ArrayD<f64>) -> Result<Array2<f64>> {
        let logits = logits
            .view()
            .into_dimensionality::<Ix2>()
            .map_err(|_| NetError::shape("softmax logits", "[N, classes]", logits.shape()))?;
        Ok(softmax_rows(&logits.to_owned()))
    }
}
