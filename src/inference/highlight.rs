//! Highlight overlay for positive scans
//!
//! Draws a red ring at the center of the processed 128x128 image with a
//! small "Tumor" label above it. The ring marks the image, not a located
//! lesion.

use std::path::Path;

use image::{Rgb, RgbImage};
use imageproc::drawing::draw_hollow_circle_mut;

/// Ring color
pub const HIGHLIGHT_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
/// Ring center in processed-image pixels
pub const RING_CENTER: (i32, i32) = (64, 64);
pub const RING_RADIUS: i32 = 24;
pub const RING_STROKE: i32 = 2;

const LABEL: &str = "Tumor";
const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
const GLYPH_SPACING: i32 = 1;

/// 5x7 bitmaps, one row per byte, most significant of the low five bits leftmost
fn glyph(c: char) -> [u8; 7] {
    match c {
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'u' => [0b00000, 0b00000, 0b10001, 0b10001, 0b10001, 0b10011, 0b01101],
        'm' => [0b00000, 0b00000, 0b11010, 0b10101, 0b10101, 0b10001, 0b10001],
        'o' => [0b00000, 0b00000, 0b01110, 0b10001, 0b10001, 0b10001, 0b01110],
        'r' => [0b00000, 0b00000, 0b10110, 0b11001, 0b10000, 0b10000, 0b10000],
        _ => [0; 7],
    }
}

fn put(img: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, color);
    }
}

/// Ring of `stroke` concentric one-pixel circles around `radius`
pub fn draw_ring(img: &mut RgbImage, center: (i32, i32), radius: i32, stroke: i32, color: Rgb<u8>) {
    let first = radius - stroke / 2;
    for r in first..first + stroke.max(1) {
        if r > 0 {
            draw_hollow_circle_mut(img, center, r, color);
        }
    }
}

/// Draw `text` with the built-in 5x7 font, top-left corner at (x, y)
pub fn draw_label(img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    for (i, c) in text.chars().enumerate() {
        let left = x + i as i32 * (GLYPH_WIDTH + GLYPH_SPACING);
        for (row, bits) in glyph(c).iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if bits & (1 << (GLYPH_WIDTH - 1 - col)) != 0 {
                    put(img, left + col, y + row as i32, color);
                }
            }
        }
    }
}

/// Copy of `img` with the ring and label drawn on it
pub fn highlight(img: &RgbImage) -> RgbImage {
    let mut out = img.clone();
    let (cx, cy) = RING_CENTER;
    draw_ring(&mut out, RING_CENTER, RING_RADIUS, RING_STROKE, HIGHLIGHT_COLOR);

    let label_x = cx - RING_RADIUS;
    let label_y = cy - RING_RADIUS - RING_STROKE - GLYPH_HEIGHT - 1;
    draw_label(&mut out, label_x, label_y, LABEL, HIGHLIGHT_COLOR);
    out
}

/// `scan.jpg` -> `scan-highlighted.jpg`
pub fn highlighted_file_name(filename: &str) -> String {
    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| filename.to_string());

    match path.extension() {
        Some(ext) => format!("{}-highlighted.{}", stem, ext.to_string_lossy()),
        None => format!("{}-highlighted", stem),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_highlighted_file_name() {
        assert_eq!(highlighted_file_name("scan.jpg"), "scan-highlighted.jpg");
        assert_eq!(
            highlighted_file_name("image-1700000000000-42.png"),
            "image-1700000000000-42-highlighted.png"
        );
        assert_eq!(highlighted_file_name("raw"), "raw-highlighted");
    }

    #[test]
    fn test_ring_and_label_pixels() {
        let base = RgbImage::from_pixel(128, 128, Rgb([10, 10, 10]));
        let out = highlight(&base);

        // On the ring
        assert_eq!(out.get_pixel(64 + 24, 64), &HIGHLIGHT_COLOR);
        assert_eq!(out.get_pixel(64, 64 - 24), &HIGHLIGHT_COLOR);
        // Center and far corner untouched
        assert_eq!(out.get_pixel(64, 64), &Rgb([10, 10, 10]));
        assert_eq!(out.get_pixel(0, 127), &Rgb([10, 10, 10]));
        // Top bar of the 'T'
        assert_eq!(out.get_pixel(40, 30), &HIGHLIGHT_COLOR);
        // Source is not modified
        assert_eq!(base.get_pixel(64 + 24, 64), &Rgb([10, 10, 10]));
    }

    #[test]
    fn test_drawing_clips_at_edges() {
        let mut img = RgbImage::new(16, 16);
        draw_ring(&mut img, (0, 0), 10, 2, HIGHLIGHT_COLOR);
        draw_label(&mut img, 12, 12, "Tumor", HIGHLIGHT_COLOR);
        assert_eq!(img.get_pixel(10, 0), &HIGHLIGHT_COLOR);
    }

    #[test]
    fn test_ring_stroke_width() {
        let mut img = RgbImage::new(64, 64);
        draw_ring(&mut img, (32, 32), 10, 2, HIGHLIGHT_COLOR);
        // Two concentric circles at radius 9 and 10
        assert_eq!(img.get_pixel(32 + 9, 32), &HIGHLIGHT_COLOR);
        assert_eq!(img.get_pixel(32 + 10, 32), &HIGHLIGHT_COLOR);
        assert_eq!(img.get_pixel(32 + 11, 32), &Rgb([0, 0, 0]));
        assert_eq!(img.get_pixel(32 + 8, 32), &Rgb([0, 0, 0]));
    }
}
