//! On-disk model artifact and its in-memory cache
//!
//! The artifact is a weights record (`model.mpk`, written by Burn's
//! `CompactRecorder`) plus a JSON manifest (`model.json`) saying whether the
//! weights came out of a training run. A missing artifact is replaced by a
//! randomly initialized placeholder the first time a model is needed.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::cnn::{TumorClassifier, TumorClassifierConfig};
use crate::backend::{default_device, Device, InferenceBackend};
use crate::utils::error::{Result, TumorScanError};

/// Format tag written into every manifest
pub const MANIFEST_FORMAT: &str = "tumorscan-cnn/v1";

/// File stem of the weights record; the recorder appends `.mpk`
const WEIGHTS_STEM: &str = "model";
/// Staging stem; must not contain a dot or the recorder extension replaces it
const STAGING_STEM: &str = "model-staging";
/// Previous weights while a replacement is being swapped in
const BACKUP_STEM: &str = "model-previous";
const RECORD_EXTENSION: &str = "mpk";
const MANIFEST_FILE: &str = "model.json";

/// Paths making up the model artifact
#[derive(Debug, Clone)]
pub struct ModelArtifact {
    dir: PathBuf,
}

impl ModelArtifact {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path handed to the recorder (without extension)
    pub fn record_path(&self) -> PathBuf {
        self.dir.join(WEIGHTS_STEM)
    }

    /// Weights file as it exists on disk
    pub fn weights_path(&self) -> PathBuf {
        self.record_path().with_extension(RECORD_EXTENSION)
    }

    fn staging_record_path(&self) -> PathBuf {
        self.dir.join(STAGING_STEM)
    }

    fn staging_weights_path(&self) -> PathBuf {
        self.staging_record_path().with_extension(RECORD_EXTENSION)
    }

    fn backup_weights_path(&self) -> PathBuf {
        self.dir.join(BACKUP_STEM).with_extension(RECORD_EXTENSION)
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join(MANIFEST_FILE)
    }

    pub fn exists(&self) -> bool {
        self.weights_path().is_file()
    }

    /// Read the manifest, `None` when missing or unreadable
    pub fn read_manifest(&self) -> Option<ModelManifest> {
        let path = self.manifest_path();
        let json = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&json) {
            Ok(manifest) => Some(manifest),
            Err(e) => {
                warn!("Ignoring unreadable model manifest {:?}: {}", path, e);
                None
            }
        }
    }

    fn manifest_tmp_path(&self) -> PathBuf {
        self.dir.join(format!("{}.tmp", MANIFEST_FILE))
    }

    fn write_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        self.stage_manifest(manifest)?;
        std::fs::rename(self.manifest_tmp_path(), self.manifest_path())?;
        Ok(())
    }

    /// Write the manifest next to the live one without replacing it
    fn stage_manifest(&self, manifest: &ModelManifest) -> Result<()> {
        let json = serde_json::to_string_pretty(manifest)?;
        std::fs::write(self.manifest_tmp_path(), json)?;
        Ok(())
    }

    /// Swap staged weights and manifest in, restoring the previous weights
    /// if either rename fails
    fn commit_staged(&self) -> Result<()> {
        let weights = self.weights_path();
        let backup = self.backup_weights_path();
        let had_previous = weights.is_file();
        if had_previous {
            std::fs::rename(&weights, &backup)?;
        }

        let swapped = std::fs::rename(self.staging_weights_path(), &weights)
            .and_then(|()| std::fs::rename(self.manifest_tmp_path(), self.manifest_path()));

        match swapped {
            Ok(()) => {
                if had_previous {
                    let _ = std::fs::remove_file(&backup);
                }
                Ok(())
            }
            Err(e) => {
                if had_previous {
                    std::fs::rename(&backup, &weights)?;
                } else {
                    let _ = std::fs::remove_file(&weights);
                }
                Err(e.into())
            }
        }
    }

    fn discard_staged(&self) {
        let _ = std::fs::remove_file(self.staging_weights_path());
        let _ = std::fs::remove_file(self.manifest_tmp_path());
    }
}

/// Summary of the training run that produced a model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSummary {
    pub epochs: usize,
    pub train_samples: usize,
    pub validation_samples: usize,
    pub final_loss: f64,
    pub final_accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation_accuracy: Option<f64>,
}

/// Sidecar metadata of the weights record
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelManifest {
    pub format: String,
    pub config: TumorClassifierConfig,
    pub trained: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub training: Option<TrainingSummary>,
}

impl ModelManifest {
    pub fn placeholder(config: &TumorClassifierConfig) -> Self {
        Self {
            format: MANIFEST_FORMAT.to_string(),
            config: config.clone(),
            trained: false,
            created_at: Utc::now(),
            training: None,
        }
    }

    pub fn trained(config: &TumorClassifierConfig, summary: TrainingSummary) -> Self {
        Self {
            format: MANIFEST_FORMAT.to_string(),
            config: config.clone(),
            trained: true,
            created_at: Utc::now(),
            training: Some(summary),
        }
    }

    /// Weights come from a training run in the current format
    pub fn is_trained_model(&self) -> bool {
        self.format == MANIFEST_FORMAT && self.trained
    }
}

/// A loaded model and what is known about it
#[derive(Debug, Clone)]
pub struct LoadedModel {
    pub model: TumorClassifier<InferenceBackend>,
    pub is_placeholder: bool,
    pub manifest: Option<ModelManifest>,
}

/// Artifact state as reported to status callers
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub exists: bool,
    pub last_modified: Option<DateTime<Utc>>,
    /// `None` when no artifact exists yet
    pub placeholder: Option<bool>,
}

/// Lazily loaded, cached model handle
///
/// Loading and replacing the model share one lock: the first load is
/// single-flight, and readers always get a complete snapshot.
#[derive(Debug)]
pub struct ModelStore {
    artifact: ModelArtifact,
    config: TumorClassifierConfig,
    device: Device,
    state: Mutex<Option<LoadedModel>>,
}

impl ModelStore {
    /// Store for the artifact in `dir`, using the default architecture
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self::with_config(dir, TumorClassifierConfig::new())
    }

    pub fn with_config<P: AsRef<Path>>(dir: P, config: TumorClassifierConfig) -> Self {
        Self {
            artifact: ModelArtifact::new(dir),
            config,
            device: default_device(),
            state: Mutex::new(None),
        }
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    /// Architecture used for placeholders and training runs
    pub fn model_config(&self) -> &TumorClassifierConfig {
        &self.config
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn lock(&self) -> Result<MutexGuard<'_, Option<LoadedModel>>> {
        self.state
            .lock()
            .map_err(|_| TumorScanError::Model("model store lock poisoned".to_string()))
    }

    /// Whether a model is currently cached
    pub fn is_loaded(&self) -> bool {
        self.lock().map(|state| state.is_some()).unwrap_or(false)
    }

    /// Return the cached model, loading or creating it first if needed
    pub fn ensure_loaded(&self) -> Result<LoadedModel> {
        let mut state = self.lock()?;
        if let Some(loaded) = state.as_ref() {
            return Ok(loaded.clone());
        }

        let loaded = if self.artifact.exists() {
            self.load_from_disk()?
        } else {
            self.create_placeholder()?
        };

        *state = Some(loaded.clone());
        Ok(loaded)
    }

    /// Drop the cached model; the next `ensure_loaded` re-reads disk
    pub fn invalidate(&self) -> Result<()> {
        let mut state = self.lock()?;
        if state.take().is_some() {
            debug!("Model cache invalidated");
        }
        Ok(())
    }

    /// Replace the artifact with a trained model and invalidate the cache
    ///
    /// Weights and manifest are staged first and swapped in together. On any
    /// failure the previous artifact stays in place. The cache is dropped
    /// either way.
    pub fn persist_trained<B: Backend>(
        &self,
        model: TumorClassifier<B>,
        summary: TrainingSummary,
    ) -> Result<()> {
        let mut state = self.lock()?;
        let outcome = self.replace_artifact(model, summary);
        *state = None;

        match &outcome {
            Ok(()) => info!("Trained model saved to {:?}", self.artifact.weights_path()),
            Err(e) => warn!("Keeping previous model artifact: {}", e),
        }
        outcome
    }

    fn replace_artifact<B: Backend>(
        &self,
        model: TumorClassifier<B>,
        summary: TrainingSummary,
    ) -> Result<()> {
        std::fs::create_dir_all(self.artifact.dir())?;

        let staged = model
            .save_file(self.artifact.staging_record_path(), &CompactRecorder::new())
            .map_err(|e| TumorScanError::Model(format!("Failed to save trained model: {:?}", e)))
            .and_then(|()| {
                self.artifact
                    .stage_manifest(&ModelManifest::trained(&self.config, summary))
            })
            .and_then(|()| self.artifact.commit_staged());

        if staged.is_err() {
            self.artifact.discard_staged();
        }
        staged
    }

    /// Existence, modification time and placeholder flag of the artifact
    pub fn artifact_info(&self) -> ArtifactInfo {
        let weights = self.artifact.weights_path();
        let last_modified = std::fs::metadata(&weights)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let exists = last_modified.is_some();
        let placeholder = exists.then(|| {
            self.artifact
                .read_manifest()
                .map(|m| !m.is_trained_model())
                .unwrap_or(true)
        });

        ArtifactInfo {
            exists,
            last_modified,
            placeholder,
        }
    }

    fn load_from_disk(&self) -> Result<LoadedModel> {
        let manifest = self.artifact.read_manifest();
        let config = manifest
            .as_ref()
            .map(|m| m.config.clone())
            .unwrap_or_else(|| self.config.clone());

        let model = TumorClassifier::<InferenceBackend>::new(&config, &self.device)
            .load_file(self.artifact.record_path(), &CompactRecorder::new(), &self.device)
            .map_err(|e| TumorScanError::Model(format!("Failed to load model: {:?}", e)))?;

        let is_placeholder = manifest
            .as_ref()
            .map(|m| !m.is_trained_model())
            .unwrap_or(true);

        if is_placeholder {
            warn!("Loaded untrained placeholder model from {:?}", self.artifact.dir());
        } else {
            info!("Loaded trained model from {:?}", self.artifact.dir());
        }

        Ok(LoadedModel {
            model,
            is_placeholder,
            manifest,
        })
    }

    fn create_placeholder(&self) -> Result<LoadedModel> {
        warn!(
            "No model found at {:?}, creating untrained placeholder",
            self.artifact.weights_path()
        );
        std::fs::create_dir_all(self.artifact.dir())?;

        let model = TumorClassifier::<InferenceBackend>::new(&self.config, &self.device);
        model
            .clone()
            .save_file(self.artifact.record_path(), &CompactRecorder::new())
            .map_err(|e| TumorScanError::Model(format!("Failed to save placeholder: {:?}", e)))?;

        let manifest = ModelManifest::placeholder(&self.config);
        self.artifact.write_manifest(&manifest)?;

        Ok(LoadedModel {
            model,
            is_placeholder: true,
            manifest: Some(manifest),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn summary() -> TrainingSummary {
        TrainingSummary {
            epochs: 1,
            train_samples: 3,
            validation_samples: 1,
            final_loss: 0.69,
            final_accuracy: 0.5,
            validation_accuracy: Some(1.0),
        }
    }

    #[test]
    fn test_artifact_paths() {
        let artifact = ModelArtifact::new("/srv/model");
        assert_eq!(artifact.weights_path(), PathBuf::from("/srv/model/model.mpk"));
        assert_eq!(
            artifact.staging_weights_path(),
            PathBuf::from("/srv/model/model-staging.mpk")
        );
        assert_eq!(artifact.manifest_path(), PathBuf::from("/srv/model/model.json"));
    }

    #[test]
    fn test_first_load_creates_placeholder() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path().join("model"));
        assert!(!store.artifact_info().exists);

        let loaded = store.ensure_loaded().unwrap();
        assert!(loaded.is_placeholder);
        assert!(store.is_loaded());
        assert!(store.artifact().weights_path().is_file());
        assert!(store.artifact().manifest_path().is_file());

        let info = store.artifact_info();
        assert!(info.exists);
        assert!(info.last_modified.is_some());
        assert_eq!(info.placeholder, Some(true));
    }

    #[test]
    fn test_placeholder_survives_reload() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        store.ensure_loaded().unwrap();
        store.invalidate().unwrap();
        assert!(!store.is_loaded());

        let reloaded = store.ensure_loaded().unwrap();
        assert!(reloaded.is_placeholder);
    }

    #[test]
    fn test_persist_trained_flips_placeholder() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        let placeholder = store.ensure_loaded().unwrap();

        store.persist_trained(placeholder.model, summary()).unwrap();
        assert!(!store.is_loaded());
        assert!(!store.artifact().staging_weights_path().exists());

        let loaded = store.ensure_loaded().unwrap();
        assert!(!loaded.is_placeholder);
        assert_eq!(
            loaded.manifest.unwrap().training.unwrap().train_samples,
            3
        );
        assert_eq!(store.artifact_info().placeholder, Some(false));
    }

    #[test]
    fn test_failed_manifest_write_keeps_previous_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        let placeholder = store.ensure_loaded().unwrap();
        let weights_before = std::fs::read(store.artifact().weights_path()).unwrap();

        // A directory where the staged manifest should go makes the write fail
        std::fs::create_dir_all(store.artifact().manifest_tmp_path()).unwrap();

        let fresh = TumorClassifier::<InferenceBackend>::new(store.model_config(), store.device());
        assert!(store.persist_trained(fresh, summary()).is_err());

        assert!(!store.is_loaded());
        assert_eq!(
            std::fs::read(store.artifact().weights_path()).unwrap(),
            weights_before
        );
        assert!(!store.artifact().staging_weights_path().exists());
        assert!(!store.artifact().backup_weights_path().exists());
        assert_eq!(store.artifact_info().placeholder, Some(true));
        assert!(store.ensure_loaded().unwrap().is_placeholder);

        // Once the path is free again the swap goes through
        std::fs::remove_dir(store.artifact().manifest_tmp_path()).unwrap();
        store.persist_trained(placeholder.model, summary()).unwrap();
        assert!(!store.ensure_loaded().unwrap().is_placeholder);
        assert!(!store.artifact().backup_weights_path().exists());
    }

    #[test]
    fn test_unknown_manifest_format_is_placeholder() {
        let dir = TempDir::new().unwrap();
        let store = ModelStore::new(dir.path());
        let placeholder = store.ensure_loaded().unwrap();
        store.persist_trained(placeholder.model, summary()).unwrap();

        let mut manifest = store.artifact().read_manifest().unwrap();
        manifest.format = "legacy".to_string();
        store.artifact().write_manifest(&manifest).unwrap();
        assert!(store.ensure_loaded().unwrap().is_placeholder);

        store.invalidate().unwrap();
        std::fs::remove_file(store.artifact().manifest_path()).unwrap();
        assert!(store.ensure_loaded().unwrap().is_placeholder);
    }

    #[test]
    fn test_concurrent_first_load_creates_one_placeholder() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(ModelStore::new(dir.path()));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.ensure_loaded().unwrap())
            })
            .collect();

        let created: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().manifest.unwrap().created_at)
            .collect();
        assert!(created.windows(2).all(|w| w[0] == w[1]));
    }
}
