//! Background training runs
//!
//! At most one run is active at a time. Finished runs move to a short
//! history so the status endpoint can report the last outcome.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tumorscan::{EpochMetrics, TrainingReport};
use uuid::Uuid;

/// Finished runs kept in memory
const MAX_HISTORY: usize = 20;

/// Status of a training run
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TrainingStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl TrainingStatus {
    pub fn is_active(&self) -> bool {
        matches!(self, TrainingStatus::Queued | TrainingStatus::Running)
    }
}

/// Information about a training run
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRun {
    pub id: String,
    pub status: TrainingStatus,
    pub queued_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub total_epochs: usize,
    /// Last completed epoch, if any
    pub last_epoch: Option<EpochMetrics>,
    pub error: Option<String>,
    pub report: Option<TrainingReport>,
}

impl TrainingRun {
    fn new(total_epochs: usize) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status: TrainingStatus::Queued,
            queued_at: Utc::now(),
            started_at: None,
            finished_at: None,
            total_epochs,
            last_epoch: None,
            error: None,
            report: None,
        }
    }
}

/// Current run plus recent history
#[derive(Debug, Default)]
pub struct TrainingJobs {
    current: RwLock<Option<TrainingRun>>,
    history: RwLock<Vec<TrainingRun>>,
}

impl TrainingJobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a new run, or return the run that is still active
    pub async fn try_queue(&self, total_epochs: usize) -> Result<TrainingRun, TrainingRun> {
        let mut current = self.current.write().await;
        if let Some(run) = current.as_ref() {
            if run.status.is_active() {
                return Err(run.clone());
            }
        }

        let run = TrainingRun::new(total_epochs);
        if let Some(previous) = current.replace(run.clone()) {
            self.push_history(previous).await;
        }
        Ok(run)
    }

    pub async fn mark_running(&self, id: &str) {
        self.update(id, |run| {
            run.status = TrainingStatus::Running;
            run.started_at = Some(Utc::now());
        })
        .await;
    }

    /// Record a finished epoch from a blocking worker thread
    pub fn record_epoch_blocking(&self, id: &str, metrics: &EpochMetrics) {
        let mut current = self.current.blocking_write();
        if let Some(run) = current.as_mut().filter(|run| run.id == id) {
            run.last_epoch = Some(metrics.clone());
        }
    }

    pub async fn finish(&self, id: &str, outcome: Result<TrainingReport, String>) {
        self.update(id, |run| {
            run.finished_at = Some(Utc::now());
            match outcome {
                Ok(report) => {
                    run.status = TrainingStatus::Succeeded;
                    run.report = Some(report);
                }
                Err(error) => {
                    run.status = TrainingStatus::Failed;
                    run.error = Some(error);
                }
            }
        })
        .await;
    }

    /// Most recent run, active or finished
    pub async fn current(&self) -> Option<TrainingRun> {
        self.current.read().await.clone()
    }

    /// Earlier finished runs, oldest first
    pub async fn history(&self) -> Vec<TrainingRun> {
        self.history.read().await.clone()
    }

    async fn update<F: FnOnce(&mut TrainingRun)>(&self, id: &str, f: F) {
        let mut current = self.current.write().await;
        if let Some(run) = current.as_mut().filter(|run| run.id == id) {
            f(run);
        }
    }

    async fn push_history(&self, run: TrainingRun) {
        let mut history = self.history.write().await;
        history.push(run);
        if history.len() > MAX_HISTORY {
            let excess = history.len() - MAX_HISTORY;
            history.drain(..excess);
        }
    }
}
