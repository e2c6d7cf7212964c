//! Training pipeline
//!
//! Fits a freshly initialized classifier on the `yes`/`no` dataset folders
//! and hands the result to the model store. Training is all-or-nothing:
//! the artifact is only replaced after every epoch completed.

use std::path::Path;
use std::time::Instant;

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::AutodiffModule,
    nn::loss::BinaryCrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{
        backend::{AutodiffBackend, Backend},
        ElementConversion, Int, Tensor,
    },
};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::backend::{default_device, TrainingBackend};
use crate::dataset::{MriBatcher, MriDataset, MriItem, TumorDataset};
use crate::model::{ModelStore, TrainingConfig, TrainingSummary, TumorClassifier};
use crate::utils::error::{Result, TumorScanError};
use crate::utils::logging::TrainingLogger;

/// Metrics recorded at the end of one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochMetrics {
    /// 1-based epoch number
    pub epoch: usize,
    pub loss: f64,
    pub accuracy: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub val_accuracy: Option<f64>,
}

/// Outcome of a successful training run
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    pub epochs: Vec<EpochMetrics>,
    pub train_samples: usize,
    pub validation_samples: usize,
    /// Files that could not be decoded
    pub skipped: usize,
    pub duration_secs: f64,
}

impl TrainingReport {
    pub fn final_metrics(&self) -> Option<&EpochMetrics> {
        self.epochs.last()
    }

    pub fn summary(&self) -> TrainingSummary {
        let last = self.final_metrics();
        TrainingSummary {
            epochs: self.epochs.len(),
            train_samples: self.train_samples,
            validation_samples: self.validation_samples,
            final_loss: last.map(|m| m.loss).unwrap_or(f64::NAN),
            final_accuracy: last.map(|m| m.accuracy).unwrap_or(0.0),
            validation_accuracy: last.and_then(|m| m.val_accuracy),
        }
    }
}

/// Train on `dataset_dir` with the default training backend
pub fn train_model(
    dataset_dir: &Path,
    config: &TrainingConfig,
    store: &ModelStore,
) -> Result<TrainingReport> {
    let device = default_device();
    train_model_with::<TrainingBackend, _>(dataset_dir, config, store, &device, |_| {})
}

/// Train on `dataset_dir` with backend `B`, reporting each finished epoch
///
/// # Type Parameters
/// * `B` - The autodiff backend to use (e.g., `Autodiff<NdArray>` or `Autodiff<Cuda>`)
pub fn train_model_with<B, F>(
    dataset_dir: &Path,
    config: &TrainingConfig,
    store: &ModelStore,
    device: &B::Device,
    mut on_epoch: F,
) -> Result<TrainingReport>
where
    B: AutodiffBackend,
    F: FnMut(&EpochMetrics),
{
    let started = Instant::now();
    config.validate()?;

    let dataset = TumorDataset::new(dataset_dir);
    let counts = dataset.validate_for_training()?;
    info!(
        "Training on {:?}: {} tumor, {} non-tumor images",
        dataset_dir, counts.yes, counts.no
    );

    let samples = dataset.samples()?;
    let data = MriDataset::load(&samples);
    let skipped = samples.len() - data.len();
    if data.len() == 0 {
        return Err(TumorScanError::InsufficientData(
            "no readable images in the dataset".to_string(),
        ));
    }

    let (train_len, _) = config.split_sizes(data.len());
    let (train_data, val_data) = data.shuffled_split(train_len, config.seed);
    info!(
        "Split: {} training ({} tumor), {} validation ({} tumor) samples",
        train_data.len(),
        train_data.positives(),
        val_data.len(),
        val_data.positives()
    );

    let mut model: TumorClassifier<B> = store.model_config().init(device);
    let mut optimizer = AdamConfig::new().init();
    let batcher = MriBatcher::<B>::new();
    let loss_fn = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(device);

    let mut logger = TrainingLogger::new(config.epochs);
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let mut history = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        logger.start_epoch(epoch);

        let mut indices: Vec<usize> = (0..train_data.len()).collect();
        indices.shuffle(&mut epoch_rng);

        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;

        for chunk in indices.chunks(config.batch_size) {
            let items: Vec<MriItem> = chunk.iter().filter_map(|&i| train_data.get(i)).collect();
            if items.is_empty() {
                continue;
            }

            let batch = batcher.batch(items, device);
            let batch_size = batch.targets.dims()[0];

            let logits = model.forward(batch.images);
            let loss = loss_fn.forward(logits.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            loss_sum += loss_value * batch_size as f64;
            correct += count_correct(logits, batch.targets);
            seen += batch_size;

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(config.learning_rate, model, grads);
        }

        let loss = loss_sum / seen.max(1) as f64;
        if !loss.is_finite() {
            return Err(TumorScanError::Training(format!(
                "loss diverged at epoch {}",
                epoch + 1
            )));
        }
        let accuracy = correct as f64 / seen.max(1) as f64;

        let (val_loss, val_accuracy) = if val_data.len() == 0 {
            (None, None)
        } else {
            let (l, a) = evaluate(&model.valid(), &val_data, config.batch_size, device);
            (Some(l), Some(a))
        };

        logger.end_epoch(loss, accuracy, val_loss, val_accuracy);

        let metrics = EpochMetrics {
            epoch: epoch + 1,
            loss,
            accuracy,
            val_loss,
            val_accuracy,
        };
        on_epoch(&metrics);
        history.push(metrics);
    }

    let report = TrainingReport {
        epochs: history,
        train_samples: train_data.len(),
        validation_samples: val_data.len(),
        skipped,
        duration_secs: started.elapsed().as_secs_f64(),
    };

    let final_accuracy = report.final_metrics().map(|m| m.accuracy).unwrap_or(0.0);
    logger.log_complete(final_accuracy);

    store.persist_trained(model.valid(), report.summary())?;
    Ok(report)
}

/// Predictions at or above probability 0.5 (logit 0) count as positive
fn count_correct<B: Backend>(logits: Tensor<B, 2>, targets: Tensor<B, 2, Int>) -> usize {
    let predictions = logits.greater_equal_elem(0.0).int();
    let correct: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}

/// Mean loss and accuracy over a dataset, without gradients
fn evaluate<B: Backend>(
    model: &TumorClassifier<B>,
    dataset: &MriDataset,
    batch_size: usize,
    device: &B::Device,
) -> (f64, f64) {
    let batcher = MriBatcher::<B>::new();
    let loss_fn = BinaryCrossEntropyLossConfig::new()
        .with_logits(true)
        .init(device);

    let mut loss_sum = 0.0f64;
    let mut correct = 0usize;
    let mut total = 0usize;

    for chunk in dataset.items().chunks(batch_size) {
        let batch = batcher.batch(chunk.to_vec(), device);
        let n = batch.targets.dims()[0];

        let logits = model.forward(batch.images);
        let loss: f64 = loss_fn
            .forward(logits.clone(), batch.targets.clone())
            .into_scalar()
            .elem();

        loss_sum += loss * n as f64;
        correct += count_correct(logits, batch.targets);
        total += n;
    }

    debug!("Validation: {}/{} correct", correct, total);
    if total == 0 {
        (0.0, 0.0)
    } else {
        (loss_sum / total as f64, correct as f64 / total as f64)
    }
}
