//! Training module
//!
//! This module provides:
//! - The supervised training loop over the `yes`/`no` dataset folders
//! - Per-epoch metrics and the final training report
//!
//! Every run starts from a freshly initialized model; there is no
//! fine-tuning of the previous artifact.

pub mod trainer;

pub use trainer::{train_model, train_model_with, EpochMetrics, TrainingReport};
