use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::Severity;

/// The persisted outcome of one detection. Written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionRecord {
    pub id: Uuid,
    /// `None` for anonymous submissions.
    pub owner_id: Option<String>,
    /// Durable URL, or an inline `data:` URI when storage was unavailable.
    pub image_ref: String,
    pub disease_name: String,
    pub confidence: f64,
    pub severity: Severity,
    pub recommendations: String,
    pub created_at: DateTime<Utc>,
}

/// Result shape consumed by presentation layers. Field names are a stable contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionSummary {
    pub disease_name: String,
    pub confidence: f64,
    pub severity: Severity,
    pub recommendations: String,
}

impl DetectionRecord {
    pub fn summary(&self) -> DetectionSummary {
        DetectionSummary {
            disease_name: self.disease_name.clone(),
            confidence: self.confidence,
            severity: self.severity,
            recommendations: self.recommendations.clone(),
        }
    }

    pub fn has_inline_image(&self) -> bool {
        self.image_ref.starts_with("data:")
    }
}
