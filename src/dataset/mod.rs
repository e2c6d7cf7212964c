//! Dataset module for MRI scan handling
//!
//! This module provides functionality for:
//! - Preprocessing scans into the fixed model input (shared by training and inference)
//! - Managing the labeled `yes`/`no` dataset folders on disk
//! - Batching preprocessed scans into Burn tensors
//!
//! ## Layout
//!
//! ```text
//! dataset/
//! ├── yes/   tumor-positive scans (label 1)
//! └── no/    tumor-negative scans (label 0)
//! ```

pub mod burn_dataset;
pub mod loader;
pub mod preprocess;

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error::TumorScanError;

pub use burn_dataset::{MriBatch, MriBatcher, MriDataset, MriItem};
pub use loader::{DatasetCounts, ImageSample, TumorDataset};
pub use preprocess::{preprocess_bytes, preprocess_image, preprocess_path, PreprocessedImage};

/// File extensions accepted as scans (compared case-insensitively)
pub const IMAGE_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

/// Dataset category, which doubles as the binary label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Tumor present
    Yes,
    /// No tumor
    No,
}

impl Category {
    /// Both categories, positive first
    pub const ALL: [Category; 2] = [Category::Yes, Category::No];

    /// Folder name under the dataset root
    pub fn dir_name(&self) -> &'static str {
        match self {
            Category::Yes => "yes",
            Category::No => "no",
        }
    }

    /// Binary label used by the classifier
    pub fn label(&self) -> usize {
        match self {
            Category::Yes => 1,
            Category::No => 0,
        }
    }

    pub fn is_positive(&self) -> bool {
        matches!(self, Category::Yes)
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

impl FromStr for Category {
    type Err = TumorScanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "yes" => Ok(Category::Yes),
            "no" => Ok(Category::No),
            other => Err(TumorScanError::InvalidCategory(other.to_string())),
        }
    }
}

/// Whether a path carries one of the accepted image extensions
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
