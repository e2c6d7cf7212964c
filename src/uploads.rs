//! Storage for uploaded scans
//!
//! Uploads keep their extension but get a generated name of the form
//! `<field>-<unix millis>-<random>.<ext>`, so two uploads of `scan.jpg`
//! never collide.

use std::path::{Path, PathBuf};

use chrono::Utc;
use rand::Rng;
use tracing::debug;

use crate::config::Workspace;
use crate::dataset::IMAGE_EXTENSIONS;
use crate::utils::error::{Result, TumorScanError};

/// Largest accepted upload, per file
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Most files accepted by one dataset upload
pub const MAX_DATASET_FILES: usize = 100;

/// URL under which a processed image is served
pub fn processed_url(file_name: &str) -> String {
    format!("/uploads/processed/{}", file_name)
}

/// URL under which an original upload is served
pub fn original_url(file_name: &str) -> String {
    format!("/uploads/original/{}", file_name)
}

/// Check an upload's name and size; returns its lowercased extension with the dot
pub fn validated_extension(original_name: &str, len: usize) -> Result<String> {
    if len == 0 {
        return Err(TumorScanError::InvalidInput(format!(
            "'{}' is empty",
            original_name
        )));
    }
    if len > MAX_UPLOAD_BYTES {
        return Err(TumorScanError::InvalidInput(format!(
            "'{}' exceeds the {} MB upload limit",
            original_name,
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }

    let ext = Path::new(original_name)
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .filter(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
        .ok_or_else(|| {
            TumorScanError::InvalidInput(format!(
                "'{}' is not an image. Only .jpg, .jpeg and .png files are allowed",
                original_name
            ))
        })?;
    Ok(format!(".{}", ext))
}

/// Collision-free file name for an upload field
pub fn unique_file_name(field: &str, ext: &str) -> String {
    let suffix: u32 = rand::thread_rng().gen_range(0..1_000_000_000);
    format!("{}-{}-{}{}", field, Utc::now().timestamp_millis(), suffix, ext)
}

/// A scan written to the originals folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub file_name: String,
    pub path: PathBuf,
}

impl StoredUpload {
    pub fn url(&self) -> String {
        original_url(&self.file_name)
    }
}

/// Original and processed scan folders
#[derive(Debug, Clone)]
pub struct UploadStore {
    original_dir: PathBuf,
    processed_dir: PathBuf,
}

impl UploadStore {
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(original_dir: P, processed_dir: Q) -> Self {
        Self {
            original_dir: original_dir.as_ref().to_path_buf(),
            processed_dir: processed_dir.as_ref().to_path_buf(),
        }
    }

    pub fn for_workspace(workspace: &Workspace) -> Self {
        Self::new(workspace.original_dir(), workspace.processed_dir())
    }

    pub fn original_dir(&self) -> &Path {
        &self.original_dir
    }

    pub fn processed_dir(&self) -> &Path {
        &self.processed_dir
    }

    /// Validate and store an upload under a generated name
    pub fn save_upload(&self, field: &str, original_name: &str, bytes: &[u8]) -> Result<StoredUpload> {
        let ext = validated_extension(original_name, bytes.len())?;
        std::fs::create_dir_all(&self.original_dir)?;

        let file_name = unique_file_name(field, &ext);
        let path = self.original_dir.join(&file_name);
        std::fs::write(&path, bytes)?;

        debug!("Stored upload {} as {}", original_name, file_name);
        Ok(StoredUpload { file_name, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validated_extension() {
        assert_eq!(validated_extension("scan.JPG", 10).unwrap(), ".jpg");
        assert_eq!(validated_extension("a.b.jpeg", 10).unwrap(), ".jpeg");
        assert!(validated_extension("scan.gif", 10).is_err());
        assert!(validated_extension("scan", 10).is_err());
        assert!(validated_extension("scan.png", 0).is_err());
        assert!(validated_extension("scan.png", MAX_UPLOAD_BYTES + 1).is_err());
        assert!(validated_extension("scan.png", MAX_UPLOAD_BYTES).is_ok());
    }

    #[test]
    fn test_unique_file_names() {
        let a = unique_file_name("image", ".png");
        let b = unique_file_name("image", ".png");
        assert!(a.starts_with("image-"));
        assert!(a.ends_with(".png"));
        assert_ne!(a, b);
    }

    #[test]
    fn test_save_upload() {
        let tmp = TempDir::new().unwrap();
        let store = UploadStore::new(tmp.path().join("original"), tmp.path().join("processed"));

        let stored = store.save_upload("image", "brain.png", b"bytes").unwrap();
        assert!(stored.path.is_file());
        assert_eq!(stored.url(), format!("/uploads/original/{}", stored.file_name));

        let err = store.save_upload("image", "brain.exe", b"bytes").unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_urls() {
        assert_eq!(processed_url("x.jpg"), "/uploads/processed/x.jpg");
        assert_eq!(original_url("x.jpg"), "/uploads/original/x.jpg");
    }
}
