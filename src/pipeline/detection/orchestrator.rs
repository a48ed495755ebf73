//! Detection orchestrator: sequences the pipeline stages for one request.
//!
//! `Persisting → Extracting → Classifying → Recommending → Assembling →
//! Persisted | Failed`. Asset persistence runs on a scoped thread alongside
//! extraction, classification and the recommendation fetch; it is joined
//! before assembly. A run cancelled up front uploads nothing. Stage callbacks
//! are always issued from the calling thread.

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use super::assets::AssetPersister;
use super::classify::classify;
use super::features::extract_color_features;
use super::recommend::RecommendationFetcher;
use super::store::RecordStore;
use super::types::{
    AssetKind, CancellationFlag, ClassificationResult, DetectionRequest, PipelineStage,
    Recommendation, StageObserver,
};
use super::DetectionError;
use crate::models::DetectionRecord;

pub struct DetectionOrchestrator {
    assets: AssetPersister,
    recommender: RecommendationFetcher,
    records: Arc<dyn RecordStore>,
}

impl DetectionOrchestrator {
    pub fn new(
        assets: AssetPersister,
        recommender: RecommendationFetcher,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        Self {
            assets,
            recommender,
            records,
        }
    }

    pub fn recommendations_configured(&self) -> bool {
        self.recommender.is_configured()
    }

    /// Run one detection to a terminal stage. Exactly one of `Persisted` or
    /// `Failed` is reported to the observer.
    pub fn detect(
        &self,
        request: DetectionRequest,
        cancel: &CancellationFlag,
        observer: &dyn StageObserver,
    ) -> Result<DetectionRecord, DetectionError> {
        let detection_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "detect",
            detection_id = %detection_id,
            owner = request.owner_id.as_deref().unwrap_or("anonymous"),
            bytes = request.image.bytes.len(),
        );
        let _guard = span.enter();

        match self.run(detection_id, &request, cancel, observer) {
            Ok(record) => {
                enter(observer, PipelineStage::Persisted);
                tracing::info!(
                    disease = %record.disease_name,
                    confidence = record.confidence,
                    severity = record.severity.as_str(),
                    inline_image = record.has_inline_image(),
                    "Detection persisted"
                );
                Ok(record)
            }
            Err(e) => {
                enter(observer, PipelineStage::Failed);
                match e {
                    DetectionError::Cancelled => tracing::info!("Detection cancelled"),
                    _ => tracing::error!(error = %e, "Detection failed"),
                }
                Err(e)
            }
        }
    }

    fn run(
        &self,
        detection_id: Uuid,
        request: &DetectionRequest,
        cancel: &CancellationFlag,
        observer: &dyn StageObserver,
    ) -> Result<DetectionRecord, DetectionError> {
        checkpoint(cancel)?;
        std::thread::scope(|scope| {
            enter(observer, PipelineStage::Persisting);
            let persist = scope.spawn(|| {
                self.assets
                    .persist(&request.image, request.owner_id.as_deref())
            });

            let analysis = self.analyze(request, cancel, observer);
            let asset = persist
                .join()
                .map_err(|_| DetectionError::Internal("asset persistence panicked".into()))?;
            let (classification, recommendation) = analysis?;

            checkpoint(cancel)?;
            enter(observer, PipelineStage::Assembling);
            tracing::debug!(
                inline_image = asset.kind == AssetKind::Inline,
                fallback_recommendation = recommendation.is_fallback(),
                "Assembling record"
            );

            let record = DetectionRecord {
                id: detection_id,
                owner_id: request.owner_id.clone(),
                image_ref: asset.reference,
                disease_name: classification.disease_name().to_string(),
                confidence: classification.confidence,
                severity: classification.severity,
                recommendations: recommendation.text,
                created_at: Utc::now(),
            };

            self.records
                .insert(&record)
                .map_err(|e| DetectionError::RecordPersist(e.to_string()))?;
            Ok(record)
        })
    }

    /// Extracting → Classifying → Recommending.
    fn analyze(
        &self,
        request: &DetectionRequest,
        cancel: &CancellationFlag,
        observer: &dyn StageObserver,
    ) -> Result<(ClassificationResult, Recommendation), DetectionError> {
        checkpoint(cancel)?;
        enter(observer, PipelineStage::Extracting);
        let features = extract_color_features(&request.image.bytes)?;

        enter(observer, PipelineStage::Classifying);
        let classification = classify(&features.counts);
        tracing::debug!(
            disease = classification.disease_name(),
            confidence = classification.confidence,
            "Classified"
        );

        checkpoint(cancel)?;
        enter(observer, PipelineStage::Recommending);
        let recommendation = self.recommender.fetch(classification.disease_name());

        Ok((classification, recommendation))
    }
}

fn enter(observer: &dyn StageObserver, stage: PipelineStage) {
    tracing::debug!(stage = stage.as_str(), "Stage entered");
    observer.on_stage(stage);
}

fn checkpoint(cancel: &CancellationFlag) -> Result<(), DetectionError> {
    if cancel.is_cancelled() {
        Err(DetectionError::Cancelled)
    } else {
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════
