//! Application state for the tumorscan server
//!
//! Owns the single model store shared by analysis and training, the dataset
//! and upload folders, and the training job record.

use std::sync::Arc;
use std::time::Instant;

use tumorscan::{AppConfig, ModelStore, TumorDataset, TumorDetector, UploadStore};

use crate::jobs::TrainingJobs;

/// Shared application state
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Model handle shared by analysis and training
    pub store: Arc<ModelStore>,
    pub detector: TumorDetector,
    pub dataset: TumorDataset,
    pub uploads: UploadStore,
    /// Current and past training runs
    pub jobs: TrainingJobs,
    /// Server start time
    pub started_at: Instant,
}

impl AppState {
    pub fn new(config: AppConfig) -> Self {
        let workspace = &config.workspace;
        let store = Arc::new(ModelStore::new(workspace.model_dir()));
        let detector = TumorDetector::new(
            Arc::clone(&store),
            workspace.processed_dir(),
            config.inference.clone(),
        );

        Self {
            dataset: TumorDataset::new(workspace.dataset_dir()),
            uploads: UploadStore::for_workspace(workspace),
            detector,
            store,
            jobs: TrainingJobs::new(),
            started_at: Instant::now(),
            config,
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

pub type SharedState = Arc<AppState>;
