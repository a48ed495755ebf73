use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::models::enums::{DiseaseKind, Severity};

// ═══════════════════════════════════════════════════════════
// Input
// ═══════════════════════════════════════════════════════════

/// Uploaded photograph. Owned by the caller for one detection request.
#[derive(Debug, Clone)]
pub struct RawImage {
    pub bytes: Vec<u8>,
    /// Client-declared file name (used for the extension).
    pub file_name: Option<String>,
    /// Client-declared MIME type.
    pub mime_type: Option<String>,
}

impl RawImage {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            file_name: None,
            mime_type: None,
        }
    }

    pub fn with_file_name(mut self, name: impl Into<String>) -> Self {
        self.file_name = Some(name.into());
        self
    }

    pub fn with_mime_type(mut self, mime: impl Into<String>) -> Self {
        self.mime_type = Some(mime.into());
        self
    }

    /// Lower-case extension: declared file name first, then magic bytes.
    pub fn extension(&self) -> String {
        self.file_name
            .as_deref()
            .and_then(|name| name.rsplit_once('.'))
            .map(|(_, ext)| ext.trim().to_ascii_lowercase())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or_else(|| sniff_extension(&self.bytes).to_string())
    }

    /// MIME type: declared value first, then guessed from the extension.
    pub fn mime(&self) -> String {
        self.mime_type
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(String::from)
            .unwrap_or_else(|| {
                mime_guess::from_ext(&self.extension())
                    .first_or_octet_stream()
                    .essence_str()
                    .to_string()
            })
    }
}

/// Detect image extension from magic bytes.
pub fn sniff_extension(bytes: &[u8]) -> &'static str {
    if bytes.len() >= 3 && bytes[0..3] == [0xFF, 0xD8, 0xFF] {
        "jpg"
    } else if bytes.len() >= 8 && bytes[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]
    {
        "png"
    } else if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        "webp"
    } else {
        "bin"
    }
}

// ═══════════════════════════════════════════════════════════
// Feature extraction output
// ═══════════════════════════════════════════════════════════

/// Color bucket a single pixel may fall into. Buckets are mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorCategory {
    Green,
    Brown,
    Yellow,
}

/// Per-category pixel counts. `green + brown + yellow <= total sampled`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ColorCounts {
    pub green: u64,
    pub brown: u64,
    pub yellow: u64,
}

impl ColorCounts {
    pub fn new(green: u64, brown: u64, yellow: u64) -> Self {
        Self { green, brown, yellow }
    }

    pub fn record(&mut self, category: ColorCategory) {
        match category {
            ColorCategory::Green => self.green += 1,
            ColorCategory::Brown => self.brown += 1,
            ColorCategory::Yellow => self.yellow += 1,
        }
    }

    /// Sum of all categorized pixels.
    pub fn categorized(&self) -> u64 {
        self.green + self.brown + self.yellow
    }
}

/// Aggregate color statistics for one decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelFeatures {
    pub counts: ColorCounts,
    /// Number of pixels considered (width × height).
    pub total_sampled: u64,
    pub width: u32,
    pub height: u32,
}

// ═══════════════════════════════════════════════════════════
// Classification
// ═══════════════════════════════════════════════════════════

/// Heuristic verdict. Immutable once produced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassificationResult {
    pub disease: DiseaseKind,
    /// Always within `[0, 0.99]`.
    pub confidence: f64,
    pub severity: Severity,
}

impl ClassificationResult {
    pub fn disease_name(&self) -> &'static str {
        self.disease.as_str()
    }
}

// ═══════════════════════════════════════════════════════════
// Recommendation + asset
// ═══════════════════════════════════════════════════════════

/// Where recommendation text came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationSource {
    Generated,
    Fallback,
}

/// Markdown-structured treatment advice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub text: String,
    pub source: RecommendationSource,
}

impl Recommendation {
    pub fn is_fallback(&self) -> bool {
        self.source == RecommendationSource::Fallback
    }
}

/// How the image reference was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// Durable object storage URL.
    Stored,
    /// Inline `data:` URI fallback.
    Inline,
}

/// Reference usable later to display the submitted image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRef {
    pub reference: String,
    pub kind: AssetKind,
}

// ═══════════════════════════════════════════════════════════
// Orchestration
// ═══════════════════════════════════════════════════════════

/// Linear detection state machine. `Idle` is the state before `detect` is called.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    Persisting,
    Extracting,
    Classifying,
    Recommending,
    Assembling,
    Persisted,
    Failed,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Persisting => "persisting",
            Self::Extracting => "extracting",
            Self::Classifying => "classifying",
            Self::Recommending => "recommending",
            Self::Assembling => "assembling",
            Self::Persisted => "persisted",
            Self::Failed => "failed",
        }
    }
}

/// Receives every stage transition of one detection, in order.
pub trait StageObserver: Send + Sync {
    fn on_stage(&self, stage: PipelineStage);
}

/// Observer that ignores transitions.
pub struct NoopObserver;

impl StageObserver for NoopObserver {
    fn on_stage(&self, _stage: PipelineStage) {}
}

/// Cooperative cancellation signal shared between a caller and a running detection.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One detection request: the image and the optional owner identity.
#[derive(Debug, Clone)]
pub struct DetectionRequest {
    pub image: RawImage,
    pub owner_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_from_file_name() {
        let img = RawImage::new(vec![0xFF, 0xD8, 0xFF]).with_file_name("Leaf.Photo.JPEG");
        assert_eq!(img.extension(), "jpeg");
    }

    #[test]
    fn extension_sniffed_when_name_missing() {
        let png = RawImage::new(vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]);
        assert_eq!(png.extension(), "png");
        let webp = RawImage::new(b"RIFF\0\0\0\0WEBPVP8 ".to_vec());
        assert_eq!(webp.extension(), "webp");
        let junk = RawImage::new(vec![1, 2, 3]).with_file_name("noext");
        assert_eq!(junk.extension(), "bin");
    }

    #[test]
    fn mime_prefers_declared_then_extension() {
        let declared = RawImage::new(vec![]).with_mime_type("image/webp").with_file_name("a.png");
        assert_eq!(declared.mime(), "image/webp");
        let guessed = RawImage::new(vec![]).with_file_name("a.png");
        assert_eq!(guessed.mime(), "image/png");
        let unknown = RawImage::new(vec![9, 9]);
        assert_eq!(unknown.mime(), "application/octet-stream");
    }

    #[test]
    fn counts_record_each_category_once() {
        let mut counts = ColorCounts::default();
        counts.record(ColorCategory::Green);
        counts.record(ColorCategory::Green);
        counts.record(ColorCategory::Brown);
        counts.record(ColorCategory::Yellow);
        assert_eq!(counts, ColorCounts::new(2, 1, 1));
        assert_eq!(counts.categorized(), 4);
    }

    #[test]
    fn cancellation_flag_is_shared() {
        let flag = CancellationFlag::new();
        let clone = flag.clone();
        assert!(!clone.is_cancelled());
        flag.cancel();
        assert!(clone.is_cancelled());
    }
}
