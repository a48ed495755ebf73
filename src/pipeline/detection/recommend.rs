use std::sync::Arc;

use super::prompt::{build_recommendation_prompt, FALLBACK_RECOMMENDATION};
use super::types::{Recommendation, RecommendationSource};
use crate::pipeline::gemini::{GenerateContentRequest, TextGenerator};

/// Fetches treatment advice for a disease label. Never fails: every error
/// path resolves to the fixed fallback text.
pub struct RecommendationFetcher {
    generator: Arc<dyn TextGenerator>,
}

impl RecommendationFetcher {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self { generator }
    }

    pub fn is_configured(&self) -> bool {
        self.generator.is_configured()
    }

    /// At most one outbound request. None when no credential is configured.
    pub fn fetch(&self, disease_name: &str) -> Recommendation {
        if !self.generator.is_configured() {
            tracing::info!(disease = disease_name, "Recommendations not configured, using fallback");
            return fallback();
        }

        let request = GenerateContentRequest::from_prompt(build_recommendation_prompt(disease_name));
        match self.generator.generate(&request) {
            Ok(response) => match response.first_text() {
                Some(text) => Recommendation {
                    text: text.to_string(),
                    source: RecommendationSource::Generated,
                },
                None => {
                    tracing::warn!(disease = disease_name, "Recommendation response had no text");
                    fallback()
                }
            },
            Err(e) => {
                tracing::warn!(disease = disease_name, error = %e, "Recommendation request failed");
                fallback()
            }
        }
    }
}

fn fallback() -> Recommendation {
    Recommendation {
        text: FALLBACK_RECOMMENDATION.to_string(),
        source: RecommendationSource::Fallback,
    }
}
