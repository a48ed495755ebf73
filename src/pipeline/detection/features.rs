//! Pixel feature extraction: decode → per-pixel color bucket → histogram.
//!
//! Pure histogram, no spatial information. Each pixel lands in at most one
//! bucket and green is tested first, so a pixel that is green can never also
//! count as brown or yellow.

use image::RgbaImage;

use super::types::{ColorCategory, ColorCounts, PixelFeatures};
use super::DetectionError;

/// Green dominance margin over both other channels.
const GREEN_MARGIN: i32 = 20;

const BROWN_MIN_RED: u8 = 100;
const BROWN_MAX_GREEN: u8 = 100;
const BROWN_MAX_BLUE: u8 = 100;

const YELLOW_MIN_RED: u8 = 150;
const YELLOW_MIN_GREEN: u8 = 120;
const YELLOW_MAX_BLUE: u8 = 100;

/// Decode an image payload and compute its color-category counts.
pub fn extract_color_features(bytes: &[u8]) -> Result<PixelFeatures, DetectionError> {
    if bytes.is_empty() {
        return Err(DetectionError::ImageDecode("empty image payload".into()));
    }

    let decoded = image::load_from_memory(bytes)
        .map_err(|e| DetectionError::ImageDecode(e.to_string()))?;
    let rgba = decoded.to_rgba8();

    let features = features_from_rgba(&rgba);
    tracing::debug!(
        width = features.width,
        height = features.height,
        green = features.counts.green,
        brown = features.counts.brown,
        yellow = features.counts.yellow,
        "Color features extracted"
    );
    Ok(features)
}

/// Histogram an already-decoded RGBA buffer.
pub fn features_from_rgba(rgba: &RgbaImage) -> PixelFeatures {
    let counts = count_colors(rgba.as_raw());
    let (width, height) = rgba.dimensions();
    PixelFeatures {
        counts,
        total_sampled: u64::from(width) * u64::from(height),
        width,
        height,
    }
}

/// Count categories over a packed RGBA byte buffer. Alpha is ignored.
/// A trailing partial pixel (fewer than 4 bytes) is not sampled.
pub fn count_colors(rgba: &[u8]) -> ColorCounts {
    let mut counts = ColorCounts::default();
    for px in rgba.chunks_exact(4) {
        if let Some(category) = classify_pixel(px[0], px[1], px[2]) {
            counts.record(category);
        }
    }
    counts
}

/// Fixed-threshold bucket for one pixel. Order matters: green, brown, yellow.
pub fn classify_pixel(r: u8, g: u8, b: u8) -> Option<ColorCategory> {
    let (ri, gi, bi) = (i32::from(r), i32::from(g), i32::from(b));

    if gi > ri + GREEN_MARGIN && gi > bi + GREEN_MARGIN {
        Some(ColorCategory::Green)
    } else if r > BROWN_MIN_RED && g < BROWN_MAX_GREEN && b < BROWN_MAX_BLUE {
        Some(ColorCategory::Brown)
    } else if r > YELLOW_MIN_RED && g > YELLOW_MIN_GREEN && b < YELLOW_MAX_BLUE {
        Some(ColorCategory::Yellow)
    } else {
        None
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
