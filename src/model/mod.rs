//! Model module for the tumor CNN using the Burn framework
//!
//! This module provides:
//! - The fixed CNN architecture (one constructor for placeholder and trained models)
//! - Training and inference hyperparameters
//! - The model store: lazy loading, placeholder creation and atomic replacement
//!
//! ## Architecture
//!
//! ```text
//! [N, 3, 128, 128]
//!   -> Conv(32) -> MaxPool -> Conv(64) -> MaxPool -> Conv(128) -> MaxPool
//!   -> Flatten(25088) -> Dense(128, relu) -> Dropout(0.5) -> Dense(1)
//! ```

pub mod cnn;
pub mod config;
pub mod store;

// Re-export main types for convenience
pub use cnn::{TumorClassifier, TumorClassifierConfig};
pub use config::{InferenceConfig, TrainingConfig};
pub use store::{ArtifactInfo, LoadedModel, ModelManifest, ModelStore, TrainingSummary};
