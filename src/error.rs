//! Error type shared by the layers, loss, optimizers, model and checkpoint code.
//!
//! Every variant is a contract violation by the caller (wrong shapes, a
//! backward pass with no forward pass behind it, a parameter mapping that
//! does not match the network) or an I/O failure while persisting
//! parameters. Nothing here is retried; errors propagate to the training
//! loop which is expected to stop.

use thiserror::Error;

/// Errors produced by the network engine.
#[derive(Debug, Error)]
pub enum NetError {
    /// An input tensor does not have the shape a layer or the loss expects.
    #[error("{context}: expected shape {expected}, got {actual:?}")]
    ShapeMismatch {
        context: String,
        expected: String,
        actual: Vec<usize>,
    },

    /// `backward` was called without a matching `forward` since the last backward.
    #[error("{layer}: backward called without a cached forward pass")]
    StaleCache { layer: String },

    /// A parameter mapping does not line up with the tracked parameters.
    #[error("parameter mismatch: {0}")]
    ParameterMismatch(String),

    /// A tensor holds NaN or an infinity where only finite values are allowed.
    #[error("parameter '{0}' contains a non-finite value")]
    NonFinite(String),

    /// A configuration value is out of range or inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An ndarray reshape or layout conversion failed.
    #[error(transparent)]
    Layout(#[from] ndarray::ShapeError),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl NetError {
    pub(crate) fn shape(context: impl Into<String>, expected: impl Into<String>, actual: &[usize]) -> Self {
        NetError::ShapeMismatch {
            context: context.into(),
            expected: expected.into(),
            actual: actual.to_vec(),
        }
    }

    pub(crate) fn stale(layer: &str) -> Self {
        NetError::StaleCache {
            layer: layer.to_string(),
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, NetError>;
