//! Error Handling Module
//!
//! Defines the error type shared by every tumorscan component.
//! Uses thiserror for ergonomic error definitions.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for tumorscan operations
#[derive(Error, Debug)]
pub enum TumorScanError {
    /// Error loading or decoding an image file
    #[error("Failed to load image at '{0}': {1}")]
    ImageLoad(PathBuf, String),

    /// Error decoding or encoding in-memory image data
    #[error("Image processing error: {0}")]
    Image(String),

    /// Dataset layout or content problem
    #[error("Dataset error: {0}")]
    Dataset(String),

    /// Dataset does not hold enough images to train
    #[error("Insufficient training data: {0}")]
    InsufficientData(String),

    /// Category other than `yes` or `no`
    #[error("Invalid category '{0}'. Must be 'yes' or 'no'")]
    InvalidCategory(String),

    /// Error creating, loading or saving the model artifact
    #[error("Model error: {0}")]
    Model(String),

    /// Error while fitting the model
    #[error("Training error: {0}")]
    Training(String),

    /// Error running a forward pass
    #[error("Inference error: {0}")]
    Inference(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Path not found
    #[error("Path not found: {0}")]
    PathNotFound(PathBuf),
}

impl TumorScanError {
    /// Whether the error was caused by caller input rather than by the system
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            TumorScanError::InvalidInput(_)
                | TumorScanError::InvalidCategory(_)
                | TumorScanError::InsufficientData(_)
                | TumorScanError::PathNotFound(_)
        )
    }
}

impl From<serde_json::Error> for TumorScanError {
    fn from(err: serde_json::Error) -> Self {
        TumorScanError::Serialization(err.to_string())
    }
}

impl From<image::ImageError> for TumorScanError {
    fn from(err: image::ImageError) -> Self {
        TumorScanError::Image(err.to_string())
    }
}

/// Convenience Result type for tumorscan operations
pub type Result<T> = std::result::Result<T, TumorScanError>;
