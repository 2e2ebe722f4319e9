//! From-scratch learners for flattened 28x28 digit images.
//!
//! Two trainers share this crate, both built directly on `ndarray` matrices
//! with no autodiff anywhere:
//!
//! - a fully-connected feedforward classifier with hand-derived
//!   backpropagation, a choice of activation and loss, and four first-order
//!   optimizers (plain mini-batch gradient descent, momentum, Nesterov
//!   momentum, Adam), driven by a validation-annealed training loop with
//!   per-epoch checkpoints and rollback;
//! - a Restricted Boltzmann Machine trained by k-step contrastive
//!   divergence with Gibbs sampling, used as an unsupervised feature
//!   learner.
//!
//! Everything is `f64`, single-threaded, and deterministic for a fixed seed:
//! all randomness flows through one injected `StdRng`, consumed in dataset
//! order.

pub mod activation;
pub mod checkpoint;
pub mod config;
pub mod data;
pub mod error;
pub mod loss;
pub mod metrics;
pub mod network;
pub mod optimizer;
pub mod params;
pub mod rbm;
pub mod train;

pub use activation::Activation;
pub use config::{RbmConfig, TrainConfig};
pub use error::{Error, Result};
pub use loss::Loss;
pub use network::Network;
pub use optimizer::{Optimizer, OptimizerKind};
pub use params::{Gradients, Layer, Parameters};
pub use rbm::Rbm;
pub use train::{TrainReport, train};
