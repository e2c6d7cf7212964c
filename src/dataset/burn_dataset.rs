//! Burn Dataset Integration
//!
//! Preprocessed scans as a Burn `Dataset`, and the `Batcher` turning them
//! into NCHW image tensors with binary targets.

use std::marker::PhantomData;
use std::path::Path;

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::{info, warn};

use super::loader::ImageSample;
use super::preprocess::preprocess_path;
use crate::utils::error::Result;
use crate::{IMAGE_CHANNELS, IMAGE_SIZE};

/// A single preprocessed, labeled scan
#[derive(Clone, Debug)]
pub struct MriItem {
    /// Image data as flattened HWC floats in `[0, 1]`
    pub image: Vec<f32>,
    /// 1 for tumor, 0 for no tumor
    pub label: usize,
    /// Source path (for logging)
    pub path: String,
}

impl MriItem {
    /// Load and preprocess a scan
    pub fn from_path(path: &Path, label: usize) -> Result<Self> {
        let processed = preprocess_path(path)?;
        Ok(Self {
            image: processed.tensor,
            label,
            path: path.to_string_lossy().to_string(),
        })
    }
}

/// In-memory dataset of preprocessed scans
#[derive(Debug, Clone, Default)]
pub struct MriDataset {
    items: Vec<MriItem>,
}

impl MriDataset {
    pub fn from_items(items: Vec<MriItem>) -> Self {
        Self { items }
    }

    /// Preprocess every sample in parallel
    ///
    /// Unreadable files are logged and skipped; each item keeps the label of
    /// its own sample.
    pub fn load(samples: &[ImageSample]) -> Self {
        info!("Preprocessing {} images...", samples.len());

        let items: Vec<MriItem> = samples
            .par_iter()
            .filter_map(|sample| match MriItem::from_path(&sample.path, sample.label()) {
                Ok(item) => Some(item),
                Err(e) => {
                    warn!("Skipping {:?}: {}", sample.path, e);
                    None
                }
            })
            .collect();

        info!(
            "Loaded {} of {} images ({} skipped)",
            items.len(),
            samples.len(),
            samples.len() - items.len()
        );
        Self { items }
    }

    pub fn items(&self) -> &[MriItem] {
        &self.items
    }

    /// Number of positive items
    pub fn positives(&self) -> usize {
        self.items.iter().filter(|item| item.label == 1).count()
    }

    /// Seeded shuffle, then the first `train_len` items train and the rest validate
    pub fn shuffled_split(mut self, train_len: usize, seed: u64) -> (Self, Self) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        self.items.shuffle(&mut rng);

        let train_len = train_len.min(self.items.len());
        let val_items = self.items.split_off(train_len);
        (self, Self { items: val_items })
    }
}

impl Dataset<MriItem> for MriDataset {
    fn get(&self, index: usize) -> Option<MriItem> {
        self.items.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}

/// A batch of scans
#[derive(Clone, Debug)]
pub struct MriBatch<B: Backend> {
    /// Images with shape [batch_size, 3, height, width]
    pub images: Tensor<B, 4>,
    /// Labels with shape [batch_size, 1]
    pub targets: Tensor<B, 2, Int>,
}

/// Batcher stacking HWC items into an NCHW tensor
#[derive(Clone, Debug, Default)]
pub struct MriBatcher<B: Backend> {
    _backend: PhantomData<B>,
}

impl<B: Backend> MriBatcher<B> {
    pub fn new() -> Self {
        Self {
            _backend: PhantomData,
        }
    }

    /// Image tensor for raw HWC data, shape [n, 3, height, width]
    pub fn images(&self, data: Vec<f32>, n: usize, device: &B::Device) -> Tensor<B, 4> {
        Tensor::<B, 4>::from_floats(
            TensorData::new(data, [n, IMAGE_SIZE, IMAGE_SIZE, IMAGE_CHANNELS]),
            device,
        )
        .permute([0, 3, 1, 2])
    }
}

impl<B: Backend> Batcher<B, MriItem, MriBatch<B>> for MriBatcher<B> {
    fn batch(&self, items: Vec<MriItem>, device: &B::Device) -> MriBatch<B> {
        let batch_size = items.len();

        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();
        let images_data: Vec<f32> = items.into_iter().flat_map(|item| item.image).collect();

        let images = self.images(images_data, batch_size, device);
        let targets =
            Tensor::<B, 2, Int>::from_data(TensorData::new(targets_data, [batch_size, 1]), device);

        MriBatch { images, targets }
    }
}
