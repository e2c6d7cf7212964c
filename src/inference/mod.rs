//! Inference module for single-scan analysis
//!
//! This module provides:
//! - The scan analyzer (`TumorDetector`) reading through the model store
//! - The result object returned to callers
//! - The highlight overlay written for positive scans

pub mod highlight;
pub mod predictor;

// Re-export main types for convenience
pub use predictor::{classify, predict_probability, AnalysisResult, TumorDetector, PLACEHOLDER_WARNING};
