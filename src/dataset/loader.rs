//! Labeled dataset on disk
//!
//! The dataset is two flat folders, `yes/` and `no/`, below one root.
//! Files are only considered when their extension is an accepted image type.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use walkdir::WalkDir;

use super::{is_image_file, Category};
use crate::uploads::{unique_file_name, validated_extension};
use crate::utils::error::{Result, TumorScanError};

/// A single labeled image file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSample {
    pub path: PathBuf,
    pub category: Category,
}

impl ImageSample {
    pub fn label(&self) -> usize {
        self.category.label()
    }
}

/// Image counts per category
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetCounts {
    pub yes: usize,
    pub no: usize,
    pub total: usize,
}

impl DatasetCounts {
    pub fn new(yes: usize, no: usize) -> Self {
        Self {
            yes,
            no,
            total: yes + no,
        }
    }

    pub fn get(&self, category: Category) -> usize {
        match category {
            Category::Yes => self.yes,
            Category::No => self.no,
        }
    }

    /// Both categories hold at least `min_per_category` images
    pub fn ready_for_training(&self, min_per_category: usize) -> bool {
        self.yes >= min_per_category && self.no >= min_per_category
    }
}

/// Filesystem-backed `yes`/`no` dataset
#[derive(Debug, Clone)]
pub struct TumorDataset {
    root: PathBuf,
}

impl TumorDataset {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.root.join(category.dir_name())
    }

    /// Create both category folders if missing
    pub fn ensure_dirs(&self) -> Result<()> {
        for category in Category::ALL {
            std::fs::create_dir_all(self.category_dir(category))?;
        }
        Ok(())
    }

    /// Image files of one category, sorted by path
    ///
    /// A missing category folder yields an empty list.
    pub fn list_images(&self, category: Category) -> Result<Vec<PathBuf>> {
        let dir = self.category_dir(category);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut images = Vec::new();
        for entry in WalkDir::new(&dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(|e| TumorScanError::Dataset(e.to_string()))?;
            if entry.file_type().is_file() && is_image_file(entry.path()) {
                images.push(entry.into_path());
            }
        }
        images.sort();
        Ok(images)
    }

    /// Every labeled image, `yes` first
    pub fn samples(&self) -> Result<Vec<ImageSample>> {
        let mut samples = Vec::new();
        for category in Category::ALL {
            samples.extend(
                self.list_images(category)?
                    .into_iter()
                    .map(|path| ImageSample { path, category }),
            );
        }
        Ok(samples)
    }

    pub fn counts(&self) -> Result<DatasetCounts> {
        Ok(DatasetCounts::new(
            self.list_images(Category::Yes)?.len(),
            self.list_images(Category::No)?.len(),
        ))
    }

    /// Check the dataset can be trained on
    ///
    /// Both category folders must exist and hold at least one image.
    pub fn validate_for_training(&self) -> Result<DatasetCounts> {
        if !self.root.is_dir() {
            return Err(TumorScanError::Dataset(format!(
                "dataset directory does not exist: {}",
                self.root.display()
            )));
        }

        for category in Category::ALL {
            let dir = self.category_dir(category);
            if !dir.is_dir() {
                return Err(TumorScanError::Dataset(format!(
                    "missing '{}' folder in {}",
                    category,
                    self.root.display()
                )));
            }
        }

        let counts = self.counts()?;
        if counts.yes == 0 || counts.no == 0 {
            return Err(TumorScanError::InsufficientData(format!(
                "both categories need at least one image (yes: {}, no: {})",
                counts.yes, counts.no
            )));
        }
        Ok(counts)
    }

    /// Store an uploaded image in a category under a collision-free name
    pub fn store_image(
        &self,
        category: Category,
        field: &str,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<PathBuf> {
        let ext = validated_extension(original_name, bytes.len())?;
        let dir = self.category_dir(category);
        std::fs::create_dir_all(&dir)?;

        let path = dir.join(unique_file_name(field, &ext));
        std::fs::write(&path, bytes)?;
        debug!("Stored {} as {:?}", original_name, path);
        Ok(path)
    }

    /// Delete every image file of one category and return how many went
    ///
    /// Non-image files are left alone. A missing folder is recreated.
    pub fn clear(&self, category: Category) -> Result<usize> {
        let dir = self.category_dir(category);
        if !dir.is_dir() {
            std::fs::create_dir_all(&dir)?;
            return Ok(0);
        }

        let images = self.list_images(category)?;
        for path in &images {
            std::fs::remove_file(path)?;
        }

        info!("Cleared {} images from '{}'", images.len(), category);
        Ok(images.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn touch(dir: &Path, name: &str) {
        std::fs::create_dir_all(dir).unwrap();
        std::fs::write(dir.join(name), b"x").unwrap();
    }

    fn dataset_with(yes: usize, no: usize) -> (TempDir, TumorDataset) {
        let tmp = TempDir::new().unwrap();
        let dataset = TumorDataset::new(tmp.path());
        dataset.ensure_dirs().unwrap();
        for i in 0..yes {
            touch(&dataset.category_dir(Category::Yes), &format!("y{}.jpg", i));
        }
        for i in 0..no {
            touch(&dataset.category_dir(Category::No), &format!("n{}.png", i));
        }
        (tmp, dataset)
    }

    #[test]
    fn test_extension_filter() {
        let (_tmp, dataset) = dataset_with(2, 0);
        let yes_dir = dataset.category_dir(Category::Yes);
        touch(&yes_dir, "notes.txt");
        touch(&yes_dir, "UPPER.JPEG");

        let images = dataset.list_images(Category::Yes).unwrap();
        assert_eq!(images.len(), 3);
        assert!(images.iter().all(|p| is_image_file(p)));
    }

    #[test]
    fn test_counts_and_readiness() {
        let (_tmp, dataset) = dataset_with(6, 7);
        let counts = dataset.counts().unwrap();
        assert_eq!(counts, DatasetCounts::new(6, 7));
        assert_eq!(counts.total, 13);
        assert!(counts.ready_for_training(5));

        let (_tmp, dataset) = dataset_with(4, 9);
        assert!(!dataset.counts().unwrap().ready_for_training(5));
    }

    #[test]
    fn test_readiness_threshold_is_inclusive() {
        assert!(DatasetCounts::new(5, 5).ready_for_training(5));
        assert!(!DatasetCounts::new(5, 4).ready_for_training(5));
        assert!(!DatasetCounts::new(4, 5).ready_for_training(5));
        assert_eq!(DatasetCounts::new(5, 4).total, 9);
    }

    #[test]
    fn test_missing_dirs_count_as_empty() {
        let tmp = TempDir::new().unwrap();
        let dataset = TumorDataset::new(tmp.path().join("nowhere"));
        assert_eq!(dataset.counts().unwrap(), DatasetCounts::default());
    }

    #[test]
    fn test_clear_only_touches_one_category() {
        let (_tmp, dataset) = dataset_with(3, 4);
        touch(&dataset.category_dir(Category::Yes), "README.txt");

        let deleted = dataset.clear(Category::Yes).unwrap();
        assert_eq!(deleted, 3);
        assert_eq!(dataset.counts().unwrap(), DatasetCounts::new(0, 4));
        assert!(dataset.category_dir(Category::Yes).join("README.txt").exists());
    }

    #[test]
    fn test_clear_empty_and_missing() {
        let (_tmp, dataset) = dataset_with(0, 0);
        assert_eq!(dataset.clear(Category::No).unwrap(), 0);

        std::fs::remove_dir_all(dataset.category_dir(Category::No)).unwrap();
        assert_eq!(dataset.clear(Category::No).unwrap(), 0);
        assert!(dataset.category_dir(Category::No).is_dir());
    }

    #[test]
    fn test_validate_for_training() {
        let (_tmp, dataset) = dataset_with(1, 1);
        assert_eq!(dataset.validate_for_training().unwrap().total, 2);

        let (_tmp, dataset) = dataset_with(3, 0);
        assert!(matches!(
            dataset.validate_for_training(),
            Err(TumorScanError::InsufficientData(_))
        ));

        let tmp = TempDir::new().unwrap();
        let dataset = TumorDataset::new(tmp.path().join("missing"));
        assert!(matches!(
            dataset.validate_for_training(),
            Err(TumorScanError::Dataset(_))
        ));
    }

    #[test]
    fn test_store_image() {
        let (_tmp, dataset) = dataset_with(0, 0);
        let path = dataset
            .store_image(Category::No, "images", "scan.PNG", b"png-bytes")
            .unwrap();
        assert!(path.starts_with(dataset.category_dir(Category::No)));
        assert_eq!(path.extension().unwrap(), "png");
        assert_eq!(dataset.counts().unwrap().no, 1);

        let rejected = dataset.store_image(Category::No, "images", "scan.gif", b"gif");
        assert!(matches!(rejected, Err(TumorScanError::InvalidInput(_))));
    }

    #[test]
    fn test_samples_carry_labels() {
        let (_tmp, dataset) = dataset_with(2, 3);
        let samples = dataset.samples().unwrap();
        assert_eq!(samples.len(), 5);
        assert_eq!(samples.iter().filter(|s| s.label() == 1).count(), 2);
        assert_eq!(samples[0].category, Category::Yes);
    }
}
