//! Heuristic classifier: color ratios → disease label, confidence, severity.
//!
//! Deterministic and total. Ratios are taken over categorized pixels only
//! (`green + brown + yellow`), not over every sampled pixel.

use super::types::{ClassificationResult, ColorCounts};
use crate::models::enums::{DiseaseKind, Severity};

/// Brown share above which the leaf-spot branch fires.
pub const BROWN_THRESHOLD: f64 = 0.30;
/// Brown share above which leaf spot is rated high severity.
pub const BROWN_HIGH_SEVERITY: f64 = 0.50;
/// Yellow share above which the rust branch fires.
pub const YELLOW_THRESHOLD: f64 = 0.20;
/// Yellow share above which rust is rated high severity.
pub const YELLOW_HIGH_SEVERITY: f64 = 0.40;

const LEAF_SPOT_BASE_CONFIDENCE: f64 = 0.70;
const RUST_BASE_CONFIDENCE: f64 = 0.65;
const RATIO_CONFIDENCE_WEIGHT: f64 = 0.30;
const HEALTHY_CONFIDENCE: f64 = 0.60;
/// Confidence ceiling. The heuristic never claims certainty.
pub const MAX_CONFIDENCE: f64 = 0.99;

/// Brown and yellow shares of the categorized pixels. Both 0 when nothing was categorized.
pub fn color_ratios(counts: &ColorCounts) -> (f64, f64) {
    let total = counts.categorized();
    if total == 0 {
        return (0.0, 0.0);
    }
    let total = total as f64;
    (counts.brown as f64 / total, counts.yellow as f64 / total)
}

/// Map color counts to a verdict. Brown is checked before yellow.
pub fn classify(counts: &ColorCounts) -> ClassificationResult {
    let (brown_ratio, yellow_ratio) = color_ratios(counts);

    if brown_ratio > BROWN_THRESHOLD {
        ClassificationResult {
            disease: DiseaseKind::LeafSpot,
            confidence: clamp_confidence(
                LEAF_SPOT_BASE_CONFIDENCE + brown_ratio * RATIO_CONFIDENCE_WEIGHT,
            ),
            severity: if brown_ratio > BROWN_HIGH_SEVERITY {
                Severity::High
            } else {
                Severity::Medium
            },
        }
    } else if yellow_ratio > YELLOW_THRESHOLD {
        ClassificationResult {
            disease: DiseaseKind::RustOrYellowLeaf,
            confidence: clamp_confidence(
                RUST_BASE_CONFIDENCE + yellow_ratio * RATIO_CONFIDENCE_WEIGHT,
            ),
            severity: if yellow_ratio > YELLOW_HIGH_SEVERITY {
                Severity::High
            } else {
                Severity::Medium
            },
        }
    } else {
        ClassificationResult {
            disease: DiseaseKind::Healthy,
            confidence: HEALTHY_CONFIDENCE,
            severity: Severity::Low,
        }
    }
}

fn clamp_confidence(value: f64) -> f64 {
    value.clamp(0.0, MAX_CONFIDENCE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn all_zero_counts_are_healthy() {
        let result = classify(&ColorCounts::default());
        assert_eq!(result.disease, DiseaseKind::Healthy);
        assert_eq!(result.disease_name(), "Healthy Plant");
        assert!(approx(result.confidence, 0.60));
        assert_eq!(result.severity, Severity::Low);
    }

    #[test]
    fn brown_ratio_exactly_threshold_is_not_leaf_spot() {
        // 30 / 100 = 0.30 exactly
        let result = classify(&ColorCounts::new(70, 30, 0));
        assert_eq!(result.disease, DiseaseKind::Healthy);
    }

    #[test]
    fn brown_ratio_just_above_threshold_is_leaf_spot() {
        // 301 / 1000 = 0.301
        let result = classify(&ColorCounts::new(699, 301, 0));
        assert_eq!(result.disease, DiseaseKind::LeafSpot);
        assert_eq!(result.severity, Severity::Medium);
    }

    #[test]
    fn leaf_spot_reference_scenario() {
        let result = classify(&ColorCounts::new(200, 100, 0));
        assert_eq!(result.disease_name(), "Leaf Spot / Brown Spot Disease");
        assert!(approx(result.confidence, 0.70 + (100.0 / 300.0) * 0.30));
        assert!((result.confidence - 0.80).abs() < 0.001);
        assert_eq!(result.severity, Severity::Medium);
    }

    #[test]
    fn leaf_spot_high_severity_above_half() {
        let result = classify(&ColorCounts::new(40, 60, 0));
        assert_eq!(result.disease, DiseaseKind::LeafSpot);
        assert_eq!(result.severity, Severity::High);
        assert!(approx(result.confidence, 0.70 + 0.60 * 0.30));
    }

    #[test]
    fn leaf_spot_exactly_half_is_medium() {
        let result = classify(&ColorCounts::new(50, 50, 0));
        assert_eq!(result.severity, Severity::Medium);
    }

    #[test]
    fn all_brown_confidence_is_capped() {
        let result = classify(&ColorCounts::new(0, 500, 0));
        assert_eq!(result.disease, DiseaseKind::LeafSpot);
        assert!(approx(result.confidence, MAX_CONFIDENCE));
        assert_eq!(result.severity, Severity::High);
    }

    #[test]
    fn rust_branch_medium_and_high() {
        let medium = classify(&ColorCounts::new(70, 0, 30));
        assert_eq!(medium.disease, DiseaseKind::RustOrYellowLeaf);
        assert_eq!(medium.disease_name(), "Rust or Yellow Leaf Disease");
        assert_eq!(medium.severity, Severity::Medium);
        assert!(approx(medium.confidence, 0.65 + 0.30 * 0.30));

        let high = classify(&ColorCounts::new(50, 0, 50));
        assert_eq!(high.severity, Severity::High);
    }

    #[test]
    fn yellow_ratio_exactly_threshold_is_healthy() {
        let result = classify(&ColorCounts::new(80, 0, 20));
        assert_eq!(result.disease, DiseaseKind::Healthy);
    }

    #[test]
    fn brown_checked_before_yellow() {
        // brown 0.35, yellow 0.45: both exceed, brown wins
        let result = classify(&ColorCounts::new(20, 35, 45));
        assert_eq!(result.disease, DiseaseKind::LeafSpot);
    }

    #[test]
    fn classify_is_deterministic() {
        let counts = ColorCounts::new(123, 77, 41);
        assert_eq!(classify(&counts), classify(&counts));
    }

    #[test]
    fn confidence_always_within_bounds() {
        for green in (0..=100).step_by(10) {
            for brown in (0..=100).step_by(10) {
                for yellow in (0..=100).step_by(10) {
                    let result = classify(&ColorCounts::new(green, brown, yellow));
                    assert!(
                        (0.0..=MAX_CONFIDENCE).contains(&result.confidence),
                        "confidence {} out of range",
                        result.confidence
                    );
                }
            }
        }
    }
}
