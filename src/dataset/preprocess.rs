//! Scan preprocessing
//!
//! Every scan, whether it feeds training or a prediction, goes through the
//! same pipeline:
//!
//! 1. contrast stretch (1st luminance percentile to 0, 99th to 255)
//! 2. mild unsharp mask
//! 3. letterbox to 128x128 on a black canvas, aspect ratio preserved
//! 4. scale to `[0, 1]` floats in HWC order

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageReader, Rgb, RgbImage};

use crate::utils::error::{Result, TumorScanError};
use crate::{IMAGE_CHANNELS, IMAGE_SIZE};

/// Lower luminance percentile mapped to black
const LOW_PERCENTILE: f64 = 0.01;
/// Upper luminance percentile mapped to white
const HIGH_PERCENTILE: f64 = 0.99;
/// Gaussian sigma of the unsharp mask
const SHARPEN_SIGMA: f32 = 0.5;
/// Unsharp mask threshold (0 sharpens every pixel)
const SHARPEN_THRESHOLD: i32 = 0;

/// A scan after preprocessing
#[derive(Debug, Clone)]
pub struct PreprocessedImage {
    /// 128x128 RGB image, as written to the processed uploads folder
    pub rgb: RgbImage,
    /// Model input in HWC order, values in `[0, 1]`
    pub tensor: Vec<f32>,
}

impl PreprocessedImage {
    /// Tensor shape `[height, width, channels]`
    pub fn shape(&self) -> [usize; 3] {
        [IMAGE_SIZE, IMAGE_SIZE, IMAGE_CHANNELS]
    }

    /// Write the processed image, format chosen from the extension
    pub fn save(&self, path: &Path) -> Result<()> {
        self.rgb
            .save(path)
            .map_err(|e| TumorScanError::Image(format!("{}: {}", path.display(), e)))
    }
}

/// Run the full pipeline on a decoded image
pub fn preprocess_image(img: &DynamicImage) -> PreprocessedImage {
    let rgb = img.to_rgb8();
    let normalized = normalize_contrast(&rgb);
    let sharpened = sharpen(&normalized);
    let boxed = letterbox(&sharpened, IMAGE_SIZE as u32);
    let tensor = to_tensor(&boxed);

    PreprocessedImage {
        rgb: boxed,
        tensor,
    }
}

/// Decode and preprocess an image file
pub fn preprocess_path(path: &Path) -> Result<PreprocessedImage> {
    let img = ImageReader::open(path)
        .map_err(|e| TumorScanError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .with_guessed_format()
        .map_err(|e| TumorScanError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .decode()
        .map_err(|e| TumorScanError::ImageLoad(path.to_path_buf(), e.to_string()))?;

    Ok(preprocess_image(&img))
}

/// Decode and preprocess an in-memory image
pub fn preprocess_bytes(bytes: &[u8]) -> Result<PreprocessedImage> {
    let img = image::load_from_memory(bytes)?;
    Ok(preprocess_image(&img))
}

fn luminance(p: &Rgb<u8>) -> usize {
    (299 * p[0] as usize + 587 * p[1] as usize + 114 * p[2] as usize) / 1000
}

/// Smallest luminance whose cumulative count reaches `q` of all pixels
fn percentile(histogram: &[usize; 256], total: usize, q: f64) -> u8 {
    let target = ((total as f64) * q).ceil().max(1.0) as usize;
    let mut cumulative = 0usize;
    for (value, count) in histogram.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return value as u8;
        }
    }
    255
}

/// Stretch contrast so the 1st..99th luminance percentiles span 0..255
///
/// One linear map, computed on luminance, is applied to all three channels
/// so hue is kept. Flat images (both percentiles equal) pass through.
pub fn normalize_contrast(img: &RgbImage) -> RgbImage {
    let total = (img.width() as usize) * (img.height() as usize);
    if total == 0 {
        return img.clone();
    }

    let mut histogram = [0usize; 256];
    for p in img.pixels() {
        histogram[luminance(p)] += 1;
    }

    let low = percentile(&histogram, total, LOW_PERCENTILE) as f32;
    let high = percentile(&histogram, total, HIGH_PERCENTILE) as f32;
    if high <= low {
        return img.clone();
    }

    let scale = 255.0 / (high - low);
    let mut out = img.clone();
    for p in out.pixels_mut() {
        for c in p.0.iter_mut() {
            *c = ((*c as f32 - low) * scale).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}

/// Mild unsharp mask
pub fn sharpen(img: &RgbImage) -> RgbImage {
    imageops::unsharpen(img, SHARPEN_SIGMA, SHARPEN_THRESHOLD)
}

/// Fit inside a `size` x `size` square, centered on black
pub fn letterbox(img: &RgbImage, size: u32) -> RgbImage {
    let (w, h) = img.dimensions();
    let mut canvas = RgbImage::new(size, size);
    if w == 0 || h == 0 {
        return canvas;
    }

    let longest = w.max(h) as f64;
    let new_w = ((w as f64 * size as f64 / longest).round() as u32).clamp(1, size);
    let new_h = ((h as f64 * size as f64 / longest).round() as u32).clamp(1, size);

    let resized = imageops::resize(img, new_w, new_h, FilterType::Triangle);
    let x = (size - new_w) / 2;
    let y = (size - new_h) / 2;
    imageops::replace(&mut canvas, &resized, x as i64, y as i64);
    canvas
}

/// Flatten to HWC floats in `[0, 1]`
pub fn to_tensor(img: &RgbImage) -> Vec<f32> {
    img.as_raw().iter().map(|&v| v as f32 / 255.0).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            let v = ((x + y) * 255 / (width + height).max(1)) as u8;
            Rgb([v, v / 2 + 20, 255 - v])
        });
        DynamicImage::ImageRgb8(img)
    }

    #[test]
    fn test_output_shape_for_any_aspect_ratio() {
        for (w, h) in [(128, 128), (300, 200), (50, 400), (7, 3), (1, 1)] {
            let out = preprocess_image(&gradient(w, h));
            assert_eq!(out.rgb.dimensions(), (128, 128));
            assert_eq!(out.tensor.len(), 128 * 128 * 3);
            assert_eq!(out.shape(), [128, 128, 3]);
            assert!(out.tensor.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_preprocessing_is_deterministic() {
        let img = gradient(240, 180);
        let a = preprocess_image(&img);
        let b = preprocess_image(&img);
        assert_eq!(a.rgb.as_raw(), b.rgb.as_raw());
        assert_eq!(a.tensor, b.tensor);
    }

    #[test]
    fn test_letterbox_pads_with_black() {
        let wide = RgbImage::from_pixel(256, 64, Rgb([200, 200, 200]));
        let boxed = letterbox(&wide, 128);

        // 256x64 scales to 128x32, centered vertically at rows 48..80
        assert_eq!(boxed.get_pixel(64, 0), &Rgb([0, 0, 0]));
        assert_eq!(boxed.get_pixel(64, 127), &Rgb([0, 0, 0]));
        assert!(boxed.get_pixel(64, 64)[0] >= 190);
    }

    #[test]
    fn test_contrast_stretch_spans_full_range() {
        let img = RgbImage::from_fn(100, 1, |x, _| {
            let v = 100 + (x as u8) / 2;
            Rgb([v, v, v])
        });
        let out = normalize_contrast(&img);
        let min = out.pixels().map(|p| p[0]).min().unwrap();
        let max = out.pixels().map(|p| p[0]).max().unwrap();
        assert_eq!(min, 0);
        assert_eq!(max, 255);
    }

    #[test]
    fn test_flat_image_passes_through() {
        let img = RgbImage::from_pixel(10, 10, Rgb([90, 90, 90]));
        assert_eq!(normalize_contrast(&img), img);
    }

    #[test]
    fn test_preprocess_bytes_roundtrip_png() {
        let mut buf = Vec::new();
        gradient(64, 32)
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        let out = preprocess_bytes(&buf).unwrap();
        assert_eq!(out.tensor.len(), 128 * 128 * 3);
    }

    #[test]
    fn test_corrupt_bytes_fail() {
        let result = preprocess_bytes(b"definitely not an image");
        assert!(matches!(result, Err(TumorScanError::Image(_))));
    }

    #[test]
    fn test_missing_file_fails_with_path() {
        let result = preprocess_path(Path::new("/nonexistent/scan.jpg"));
        assert!(matches!(result, Err(TumorScanError::ImageLoad(_, _))));
    }
}
