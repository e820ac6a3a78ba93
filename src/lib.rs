//! LeNet-5 from scratch
//!
//! A convolutional classifier whose forward pass, backward pass and Adam
//! updates are written by hand on top of `ndarray`, with no automatic
//! differentiation.
//!
//! # Modules
//!
//! - `layers`: Layer trait and implementations (Conv2D, MaxPool, Flatten, Dense, Activation)
//! - `loss`: fused softmax + cross-entropy
//! - `optimizers`: Optimizer trait and implementations (Adam, SGD)
//! - `model`: the LeNet-5 layer stack with `get_params` / `set_params`
//! - `trainer`: training loop with best-validation checkpointing
//! - `checkpoint`: JSON persistence of parameter mappings
//! - `config`: Training configuration structures
//! - `architecture`: LeNet-5 sizing configuration
//! - `utils`: Shared utilities (RNG, activation functions)
//!
//! # Example
//!
//! ```ignore
//! use cnn_from_scratch::{LeNet5, LeNet5Config, Trainer, TrainingConfig};
//!
//! let model = LeNet5::with_seed(&LeNet5Config::default(), 42)?;
//! let mut trainer = Trainer::from_config(model, &TrainingConfig::default());
//! let history = trainer.fit(&train_batches, &val_batches, 1, Some(path))?;
//! ```

pub mod architecture;
pub mod checkpoint;
pub mod config;
pub mod error;
pub mod layers;
pub mod loss;
pub mod model;
pub mod optimizers;
pub mod params;
pub mod trainer;
pub mod utils;

pub use architecture::LeNet5Config;
pub use config::TrainingConfig;
pub use error::{NetError, Result};
pub use loss::CrossEntropyLoss;
pub use model::LeNet5;
pub use params::Params;
pub use trainer::{Batch, Trainer};
