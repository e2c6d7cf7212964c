//! # tumorscan
//!
//! Brain MRI tumor classification built on the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: Image preprocessing, the `yes`/`no` dataset folders and Burn batching
//! - `model`: The fixed CNN architecture, its configuration and the on-disk model store
//! - `training`: Training pipeline that fits a fresh model on the dataset folders
//! - `inference`: Single-image analysis producing the prediction result
//! - `uploads`: Storage for uploaded scans and their processed variants
//! - `config`: Workspace layout and application configuration
//! - `utils`: Logging and error types
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tumorscan::{AppConfig, ModelStore, TumorDetector};
//!
//! let config = AppConfig::default();
//! config.workspace.ensure_layout()?;
//!
//! let store = Arc::new(ModelStore::new(config.workspace.model_dir()));
//! let detector = TumorDetector::new(store, config.workspace.processed_dir(), config.inference.clone());
//! let result = detector.analyze("scan.jpg".as_ref(), "scan.jpg")?;
//! println!("{}", result.prediction);
//! ```

pub mod backend;
pub mod config;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod uploads;
pub mod utils;

pub use config::{AppConfig, Workspace};
pub use dataset::{Category, DatasetCounts, PreprocessedImage, TumorDataset};
pub use inference::{AnalysisResult, TumorDetector};
pub use model::{InferenceConfig, ModelStore, TrainingConfig, TumorClassifier};
pub use training::{train_model, EpochMetrics, TrainingReport};
pub use uploads::UploadStore;
pub use utils::error::{Result, TumorScanError};

/// Side length of the square model input
pub const IMAGE_SIZE: usize = 128;

/// Number of color channels in the model input
pub const IMAGE_CHANNELS: usize = 3;

/// Minimum images per category before the server accepts a training request
pub const MIN_IMAGES_PER_CATEGORY: usize = 5;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
