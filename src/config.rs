//! Workspace layout and application configuration
//!
//! All state lives as plain files under one workspace root:
//!
//! ```text
//! root/
//! ├── model/              model.mpk + model.json
//! ├── dataset/
//! │   ├── yes/            tumor-positive images
//! │   └── no/             tumor-negative images
//! └── uploads/
//!     ├── original/       scans as uploaded
//!     └── processed/      128x128 processed (and highlighted) scans
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::Category;
use crate::model::{InferenceConfig, TrainingConfig};
use crate::utils::error::{Result, TumorScanError};
use crate::MIN_IMAGES_PER_CATEGORY;

/// Filesystem layout of a tumorscan deployment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Workspace {
    /// Root directory; relative sub-paths are resolved against it
    pub root: PathBuf,
    /// Model artifact directory
    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,
    /// Labeled dataset directory
    #[serde(default = "default_dataset_dir")]
    pub dataset_dir: PathBuf,
    /// Upload directory
    #[serde(default = "default_uploads_dir")]
    pub uploads_dir: PathBuf,
}

fn default_model_dir() -> PathBuf {
    PathBuf::from("model")
}

fn default_dataset_dir() -> PathBuf {
    PathBuf::from("dataset")
}

fn default_uploads_dir() -> PathBuf {
    PathBuf::from("uploads")
}

impl Default for Workspace {
    fn default() -> Self {
        Self::new(".")
    }
}

impl Workspace {
    /// Create a workspace with the default layout under `root`
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            model_dir: default_model_dir(),
            dataset_dir: default_dataset_dir(),
            uploads_dir: default_uploads_dir(),
        }
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Directory holding the model artifact
    pub fn model_dir(&self) -> PathBuf {
        self.resolve(&self.model_dir)
    }

    /// Directory holding the `yes`/`no` dataset folders
    pub fn dataset_dir(&self) -> PathBuf {
        self.resolve(&self.dataset_dir)
    }

    /// Directory served under `/uploads`
    pub fn uploads_dir(&self) -> PathBuf {
        self.resolve(&self.uploads_dir)
    }

    /// Scans as uploaded
    pub fn original_dir(&self) -> PathBuf {
        self.uploads_dir().join("original")
    }

    /// Processed and highlighted scans
    pub fn processed_dir(&self) -> PathBuf {
        self.uploads_dir().join("processed")
    }

    /// Create every directory of the layout if missing
    pub fn ensure_layout(&self) -> Result<()> {
        let dataset_dir = self.dataset_dir();
        let mut dirs = vec![self.model_dir(), self.original_dir(), self.processed_dir()];
        dirs.extend(Category::ALL.iter().map(|c| dataset_dir.join(c.dir_name())));

        for dir in dirs {
            std::fs::create_dir_all(&dir)?;
        }
        Ok(())
    }
}

/// Top-level configuration shared by the CLI and the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub workspace: Workspace,
    #[serde(default)]
    pub training: TrainingConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
    /// Images required in each category before training may be requested
    #[serde(default = "default_min_images")]
    pub min_images_per_category: usize,
}

fn default_min_images() -> usize {
    MIN_IMAGES_PER_CATEGORY
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: Workspace::default(),
            training: TrainingConfig::default(),
            inference: InferenceConfig::default(),
            min_images_per_category: MIN_IMAGES_PER_CATEGORY,
        }
    }
}

impl AppConfig {
    /// Default configuration rooted at `root`
    pub fn with_root<P: AsRef<Path>>(root: P) -> Self {
        Self {
            workspace: Workspace::new(root),
            ..Default::default()
        }
    }

    /// Validate every section
    pub fn validate(&self) -> Result<()> {
        self.training.validate()?;
        self.inference.validate()?;
        if self.min_images_per_category == 0 {
            return Err(TumorScanError::Config(
                "min_images_per_category must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Save configuration to a JSON file
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TumorScanError::PathNotFound(path.to_path_buf()));
        }
        let json = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&json)?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_workspace_paths() {
        let ws = Workspace::new("/srv/tumorscan");
        assert_eq!(ws.model_dir(), PathBuf::from("/srv/tumorscan/model"));
        assert_eq!(ws.dataset_dir(), PathBuf::from("/srv/tumorscan/dataset"));
        assert_eq!(
            ws.processed_dir(),
            PathBuf::from("/srv/tumorscan/uploads/processed")
        );
    }

    #[test]
    fn test_absolute_sub_path_wins() {
        let mut ws = Workspace::new("/srv/tumorscan");
        ws.model_dir = PathBuf::from("/var/lib/models");
        assert_eq!(ws.model_dir(), PathBuf::from("/var/lib/models"));
    }

    #[test]
    fn test_ensure_layout_creates_dirs() {
        let dir = TempDir::new().unwrap();
        let ws = Workspace::new(dir.path());
        ws.ensure_layout().unwrap();

        assert!(ws.model_dir().is_dir());
        assert!(ws.dataset_dir().join("yes").is_dir());
        assert!(ws.dataset_dir().join("no").is_dir());
        assert!(ws.original_dir().is_dir());
        assert!(ws.processed_dir().is_dir());
    }

    #[test]
    fn test_config_roundtrip_through_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("tumorscan.json");

        let mut config = AppConfig::with_root(dir.path());
        config.training.epochs = 7;
        config.save(&path).unwrap();

        let loaded = AppConfig::load(&path).unwrap();
        assert_eq!(loaded.training.epochs, 7);
        assert_eq!(loaded.workspace, config.workspace);
        assert_eq!(loaded.min_images_per_category, 5);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let json = r#"{ "workspace": { "root": "/data" } }"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.training.epochs, 20);
        assert_eq!(config.inference.passes, 3);
        assert_eq!(config.workspace.model_dir(), PathBuf::from("/data/model"));
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = AppConfig::default();
        config.min_images_per_category = 0;
        assert!(config.validate().is_err());
    }
}
