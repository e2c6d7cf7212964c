//! Logging Module
//!
//! Provides structured logging utilities using the `tracing` crate.

use std::time::Instant;

use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info` or
    /// `tumorscan=debug,tower_http=info`
    pub filter: String,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to include thread IDs
    pub include_thread_ids: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Debug output with module paths and thread IDs
    pub fn verbose() -> Self {
        Self {
            filter: "debug".to_string(),
            include_target: true,
            include_thread_ids: true,
            ..Self::default()
        }
    }

    /// Plain output for log collectors
    pub fn production() -> Self {
        Self {
            ansi_colors: false,
            ..Self::default()
        }
    }

    /// Replace the filter with a single maximum level
    pub fn with_level(mut self, level: Level) -> Self {
        self.filter = level.as_str().to_lowercase();
        self
    }

    /// `RUST_LOG` when set, otherwise the configured directive
    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.filter))
    }
}

/// Initialize logging with the given configuration
///
/// Fails if a global subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(config.env_filter())
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .compact()
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

/// Training progress logger
pub struct TrainingLogger {
    epoch: usize,
    total_epochs: usize,
    epoch_start: Instant,
    training_start: Instant,
}

impl TrainingLogger {
    /// Create a new training logger
    pub fn new(total_epochs: usize) -> Self {
        Self {
            epoch: 0,
            total_epochs,
            epoch_start: Instant::now(),
            training_start: Instant::now(),
        }
    }

    /// Log start of an epoch
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = Instant::now();

        tracing::debug!("Epoch {}/{} started", epoch + 1, self.total_epochs);
    }

    /// Log end of an epoch with its metrics
    pub fn end_epoch(
        &self,
        loss: f64,
        accuracy: f64,
        val_loss: Option<f64>,
        val_accuracy: Option<f64>,
    ) {
        let epoch_time = self.epoch_start.elapsed();
        let epochs_remaining = self.total_epochs.saturating_sub(self.epoch + 1);
        let avg_epoch_time = self.training_start.elapsed().as_secs_f64() / (self.epoch + 1) as f64;
        let eta_secs = epochs_remaining as f64 * avg_epoch_time;

        match (val_loss, val_accuracy) {
            (Some(val_loss), Some(val_accuracy)) => tracing::info!(
                "Epoch {}/{} completed in {:.1}s | Loss: {:.4} | Accuracy: {:.4} | Val Loss: {:.4} | Val Accuracy: {:.4} | ETA: {:.0}s",
                self.epoch + 1,
                self.total_epochs,
                epoch_time.as_secs_f64(),
                loss,
                accuracy,
                val_loss,
                val_accuracy,
                eta_secs
            ),
            _ => tracing::info!(
                "Epoch {}/{} completed in {:.1}s | Loss: {:.4} | Accuracy: {:.4} | ETA: {:.0}s",
                self.epoch + 1,
                self.total_epochs,
                epoch_time.as_secs_f64(),
                loss,
                accuracy,
                eta_secs
            ),
        }
    }

    /// Log training completion
    pub fn log_complete(&self, final_accuracy: f64) {
        tracing::info!(
            "Training complete! {} epochs in {:.1}s | Final accuracy: {:.4}",
            self.total_epochs,
            self.training_start.elapsed().as_secs_f64(),
            final_accuracy
        );
    }
}
