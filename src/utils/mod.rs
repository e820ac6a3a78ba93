//! Shared utilities for the network engine
//!
//! Deterministic random initialization and the elementwise nonlinearities
//! used by the activation layers and the softmax loss.

pub mod activations;
pub mod rng;

pub use rng::SimpleRng;
