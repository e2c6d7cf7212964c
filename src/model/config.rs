//! Training and inference configuration
//!
//! Hyperparameters for fitting the classifier and the knobs of the
//! inference pipeline. Both serialize to JSON as part of `AppConfig`.

use serde::{Deserialize, Serialize};

use crate::utils::error::{Result, TumorScanError};

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TrainingConfig {
    /// Number of training epochs
    pub epochs: usize,

    /// Batch size for training
    pub batch_size: usize,

    /// Fraction of samples held out for validation
    pub validation_split: f64,

    /// Adam learning rate
    pub learning_rate: f64,

    /// Seed for the hold-out split and per-epoch shuffling
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            epochs: 20,
            batch_size: 32,
            validation_split: 0.2,
            learning_rate: 1e-3,
            seed: 42,
        }
    }
}

impl TrainingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.epochs == 0 {
            return Err(TumorScanError::Config(
                "epochs must be greater than 0".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(TumorScanError::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if !(0.0..1.0).contains(&self.validation_split) {
            return Err(TumorScanError::Config(
                "validation_split must be in range [0.0, 1.0)".to_string(),
            ));
        }

        if self.learning_rate <= 0.0 {
            return Err(TumorScanError::Config(
                "learning_rate must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Split `total` samples into (train, validation) sizes
    ///
    /// The training side is `floor(total * (1 - validation_split))`, never
    /// less than one sample when `total > 0`.
    pub fn split_sizes(&self, total: usize) -> (usize, usize) {
        if total == 0 {
            return (0, 0);
        }
        let train = ((total as f64) * (1.0 - self.validation_split)).floor() as usize;
        let train = train.clamp(1, total);
        (train, total - train)
    }
}

/// Inference configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct InferenceConfig {
    /// Forward passes averaged per prediction
    pub passes: usize,

    /// Probability at or above which a scan is classified positive
    pub threshold: f32,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            passes: 3,
            threshold: 0.5,
        }
    }
}

impl InferenceConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.passes == 0 {
            return Err(TumorScanError::Config(
                "passes must be greater than 0".to_string(),
            ));
        }

        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(TumorScanError::Config(
                "threshold must be in range [0.0, 1.0]".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_training_config_default() {
        let config = TrainingConfig::default();
        assert_eq!(config.epochs, 20);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.validation_split, 0.2);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_training_config_validation() {
        let mut config = TrainingConfig::default();
        config.epochs = 0;
        assert!(config.validate().is_err());

        config = TrainingConfig::default();
        config.validation_split = 1.0;
        assert!(config.validate().is_err());

        config = TrainingConfig::default();
        config.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_split_sizes() {
        let config = TrainingConfig::default();
        assert_eq!(config.split_sizes(13), (10, 3));
        assert_eq!(config.split_sizes(10), (8, 2));
        assert_eq!(config.split_sizes(2), (1, 1));
        assert_eq!(config.split_sizes(1), (1, 0));
        assert_eq!(config.split_sizes(0), (0, 0));
    }

    #[test]
    fn test_inference_config() {
        let config = InferenceConfig::default();
        assert_eq!(config.passes, 3);
        assert_eq!(config.threshold, 0.5);
        assert!(config.validate().is_ok());

        let bad = InferenceConfig {
            passes: 0,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }
}
