//! Layer abstractions for neural networks
//!
//! This module provides the Layer trait and the five layer kinds the LeNet-5
//! topology is built from.

mod r#trait;
pub mod activation;
pub mod conv2d;
pub mod dense;
pub mod flatten;
pub mod maxpool;

// Re-export the Layer trait for convenience
pub use activation::{Activation, ActivationLayer};
pub use conv2d::Conv2DLayer;
pub use dense::DenseLayer;
pub use flatten::FlattenLayer;
pub use maxpool::MaxPoolLayer;
pub use r#trait::{Layer, LayerGradients};
