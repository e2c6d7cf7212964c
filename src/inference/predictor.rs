//! Inference Predictor Module
//!
//! Runs a single scan through the model and builds the result reported to
//! callers, including the processed (and highlighted) image artifacts.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use burn::tensor::ElementConversion;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::highlight::{highlight, highlighted_file_name};
use crate::backend::InferenceBackend;
use crate::dataset::{preprocess_path, Category, MriBatcher};
use crate::model::{InferenceConfig, ModelStore, TumorClassifier};
use crate::uploads::processed_url;
use crate::utils::error::{Result, TumorScanError};

pub const PLACEHOLDER_WARNING: &str = "WARNING: Using untrained placeholder model. Predictions are not reliable. Please upload a proper dataset to train the model.";

pub const TUMOR_LOCATION: &str = "Right frontal lobe";
pub const TUMOR_SIZE: &str = "2.3 cm² visible area";
pub const INTENSITY_CHARACTERISTICS: &str = "Heterogeneous";
pub const SCAN_QUALITY: &str = "High";
pub const AREAS_EXAMINED: &str =
    "Full brain scan including frontal, parietal, temporal, and occipital lobes";

/// Result of analyzing one scan
///
/// The descriptive fields are fixed text chosen by the prediction; they are
/// not measured from the image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub prediction: Category,
    /// Probability of the predicted class, in `[0, 1]`
    pub confidence: f32,
    pub processed_image_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlighted_image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tumor_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tumor_size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intensity_char: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scan_quality: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub areas_examined: Option<String>,
}

impl AnalysisResult {
    /// Result with the descriptive text for `prediction` filled in
    pub fn new(prediction: Category, confidence: f32, processed_image_url: String) -> Self {
        let positive = prediction.is_positive();
        let text = |flag: bool, s: &str| flag.then(|| s.to_string());

        Self {
            prediction,
            confidence,
            processed_image_url,
            highlighted_image_url: None,
            warning_message: None,
            tumor_location: text(positive, TUMOR_LOCATION),
            tumor_size: text(positive, TUMOR_SIZE),
            intensity_char: text(positive, INTENSITY_CHARACTERISTICS),
            scan_quality: text(!positive, SCAN_QUALITY),
            areas_examined: text(!positive, AREAS_EXAMINED),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.prediction.is_positive()
    }
}

/// Map a tumor probability to (prediction, confidence)
///
/// Probabilities at or above `threshold` are positive.
pub fn classify(probability: f32, threshold: f32) -> (Category, f32) {
    if probability >= threshold {
        (Category::Yes, probability)
    } else {
        (Category::No, 1.0 - probability)
    }
}

/// Average tumor probability of `passes` forward passes over one HWC tensor
///
/// The inference backend has no autodiff, so dropout is inactive and every
/// pass returns the same value.
pub fn predict_probability(
    model: &TumorClassifier<InferenceBackend>,
    tensor: &[f32],
    passes: usize,
    device: &<InferenceBackend as burn::tensor::backend::Backend>::Device,
) -> f32 {
    let batcher = MriBatcher::<InferenceBackend>::new();
    let passes = passes.max(1);

    let total: f32 = (0..passes)
        .map(|_| {
            let input = batcher.images(tensor.to_vec(), 1, device);
            let p: f32 = model.forward_probability(input).into_scalar().elem();
            p
        })
        .sum();
    total / passes as f32
}

/// Scan analyzer backed by the shared model store
#[derive(Debug, Clone)]
pub struct TumorDetector {
    store: Arc<ModelStore>,
    processed_dir: PathBuf,
    config: InferenceConfig,
}

impl TumorDetector {
    pub fn new(store: Arc<ModelStore>, processed_dir: PathBuf, config: InferenceConfig) -> Self {
        Self {
            store,
            processed_dir,
            config,
        }
    }

    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    /// Analyze the scan at `path`
    ///
    /// The processed image is written to the processed folder as `filename`;
    /// a positive result also gets a highlighted copy next to it.
    pub fn analyze(&self, path: &Path, filename: &str) -> Result<AnalysisResult> {
        validate_file_name(filename)?;
        let started = Instant::now();

        let loaded = self.store.ensure_loaded()?;
        let processed = preprocess_path(path)?;

        std::fs::create_dir_all(&self.processed_dir)?;
        processed.save(&self.processed_dir.join(filename))?;

        let probability = predict_probability(
            &loaded.model,
            &processed.tensor,
            self.config.passes,
            self.store.device(),
        );
        if !probability.is_finite() {
            return Err(TumorScanError::Inference(format!(
                "model produced a non-finite probability for {}",
                filename
            )));
        }

        let (prediction, confidence) = classify(probability, self.config.threshold);
        let mut result = AnalysisResult::new(prediction, confidence, processed_url(filename));

        if result.is_positive() {
            let name = highlighted_file_name(filename);
            match highlight(&processed.rgb).save(self.processed_dir.join(&name)) {
                Ok(()) => result.highlighted_image_url = Some(processed_url(&name)),
                Err(e) => warn!("Failed to write highlighted image {}: {}", name, e),
            }
        }

        if loaded.is_placeholder {
            result.warning_message = Some(PLACEHOLDER_WARNING.to_string());
        }

        debug!("Tumor probability for {}: {:.4}", filename, probability);
        info!(
            "Analyzed {}: {} ({:.1}% confidence) in {:.0}ms",
            filename,
            result.prediction,
            confidence * 100.0,
            started.elapsed().as_secs_f64() * 1000.0
        );
        Ok(result)
    }
}

fn validate_file_name(filename: &str) -> Result<()> {
    let plain = Path::new(filename)
        .file_name()
        .map(|name| name == filename)
        .unwrap_or(false);
    if plain {
        Ok(())
    } else {
        Err(TumorScanError::InvalidInput(format!(
            "invalid output file name '{}'",
            filename
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    #[test]
    fn test_classify_threshold_boundary() {
        assert_eq!(classify(0.5, 0.5), (Category::Yes, 0.5));
        assert_eq!(classify(0.9, 0.5), (Category::Yes, 0.9));

        let (prediction, confidence) = classify(0.25, 0.5);
        assert_eq!(prediction, Category::No);
        assert!((confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_canned_fields_follow_prediction() {
        let yes = AnalysisResult::new(Category::Yes, 0.8, "/uploads/processed/a.jpg".into());
        assert_eq!(yes.tumor_location.as_deref(), Some(TUMOR_LOCATION));
        assert_eq!(yes.tumor_size.as_deref(), Some("2.3 cm² visible area"));
        assert_eq!(yes.intensity_char.as_deref(), Some("Heterogeneous"));
        assert!(yes.scan_quality.is_none());

        let no = AnalysisResult::new(Category::No, 0.7, "/uploads/processed/b.jpg".into());
        assert_eq!(no.scan_quality.as_deref(), Some("High"));
        assert_eq!(no.areas_examined.as_deref(), Some(AREAS_EXAMINED));
        assert!(no.tumor_location.is_none());
    }

    #[test]
    fn test_result_json_shape() {
        let result = AnalysisResult::new(Category::No, 0.6, "/uploads/processed/c.png".into());
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["prediction"], "no");
        assert_eq!(json["processedImageUrl"], "/uploads/processed/c.png");
        assert_eq!(json["scanQuality"], "High");
        assert!(json.get("warningMessage").is_none());
        assert!(json.get("tumorLocation").is_none());
    }

    #[test]
    fn test_fresh_environment_uses_placeholder() {
        let tmp = TempDir::new().unwrap();
        let scan = tmp.path().join("scan.png");
        RgbImage::from_fn(90, 60, |x, y| Rgb([(x * 2) as u8, (y * 3) as u8, 80]))
            .save(&scan)
            .unwrap();

        let store = Arc::new(ModelStore::new(tmp.path().join("model")));
        let processed_dir = tmp.path().join("processed");
        let detector = TumorDetector::new(store, processed_dir.clone(), InferenceConfig::default());

        let result = detector.analyze(&scan, "upload-1.png").unwrap();
        assert_eq!(result.warning_message.as_deref(), Some(PLACEHOLDER_WARNING));
        assert!((0.5..=1.0).contains(&result.confidence));
        assert_eq!(result.processed_image_url, "/uploads/processed/upload-1.png");

        let written = image::open(processed_dir.join("upload-1.png")).unwrap();
        assert_eq!((written.width(), written.height()), (128, 128));

        if result.is_positive() {
            assert!(processed_dir.join("upload-1-highlighted.png").is_file());
            assert_eq!(
                result.highlighted_image_url.as_deref(),
                Some("/uploads/processed/upload-1-highlighted.png")
            );
        }
    }

    #[test]
    fn test_corrupt_scan_fails_request() {
        let tmp = TempDir::new().unwrap();
        let scan = tmp.path().join("broken.jpg");
        std::fs::write(&scan, b"not an image").unwrap();

        let store = Arc::new(ModelStore::new(tmp.path().join("model")));
        let detector =
            TumorDetector::new(store, tmp.path().join("processed"), InferenceConfig::default());
        assert!(detector.analyze(&scan, "broken.jpg").is_err());
    }

    #[test]
    fn test_rejects_path_like_file_names() {
        assert!(validate_file_name("scan.jpg").is_ok());
        assert!(validate_file_name("../scan.jpg").is_err());
        assert!(validate_file_name("a/b.jpg").is_err());
        assert!(validate_file_name("").is_err());
    }
}
