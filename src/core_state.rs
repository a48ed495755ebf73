//! Shared application state.
//!
//! `CoreState` owns the detection orchestrator, the chat assistant, the
//! record store, the bearer-token table and the in-flight detection guard.
//! Built once at startup and shared behind an `Arc` by every request.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::api::types::hash_token;
use crate::chat::AgronomyChat;
use crate::config::AppConfig;
use crate::db::DatabaseError;
use crate::models::DetectionRecord;
use crate::pipeline::detection::{
    AssetPersister, DetectionOrchestrator, LocalObjectStorage, ObjectStorage,
    RecommendationFetcher, RecordStore, SqliteRecordStore,
};
use crate::pipeline::gemini::{GeminiClient, GenerationError, TextGenerator};

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Internal lock error")]
    LockPoisoned,
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),
    #[error("Text generation client error: {0}")]
    Generation(#[from] GenerationError),
    #[error("A detection is already running for this session")]
    DetectionInProgress,
}

pub struct CoreState {
    pub config: AppConfig,
    orchestrator: DetectionOrchestrator,
    chat: AgronomyChat,
    records: Arc<dyn RecordStore>,
    /// SHA-256 of each bearer token → owner id.
    tokens: HashMap<[u8; 32], String>,
    in_flight: Arc<Mutex<HashSet<String>>>,
}

impl CoreState {
    /// Wire production components from configuration.
    ///
    /// Builds a blocking HTTP client, so call this outside any async runtime.
    pub fn from_config(config: AppConfig) -> Result<Self, CoreError> {
        let records: Arc<dyn RecordStore> =
            Arc::new(SqliteRecordStore::open(&config.database_path())?);
        let storage: Arc<dyn ObjectStorage> = Arc::new(LocalObjectStorage::new(
            config.storage_dir(),
            &config.storage_base_url(),
        ));
        let generator: Arc<dyn TextGenerator> = Arc::new(GeminiClient::new(
            &config.gemini_base_url,
            &config.gemini_model,
            config.gemini_api_key.clone(),
        )?);

        let api_key = if generator.is_configured() {
            "present"
        } else {
            "missing"
        };
        tracing::info!(
            data_dir = %config.data_dir.display(),
            model = %config.gemini_model,
            api_key,
            users = config.user_tokens.len(),
            "Core state initialized"
        );

        Ok(Self::with_components(config, generator, storage, records))
    }

    /// Assemble state from explicit components.
    pub fn with_components(
        config: AppConfig,
        generator: Arc<dyn TextGenerator>,
        storage: Arc<dyn ObjectStorage>,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        let tokens = config
            .user_tokens
            .iter()
            .map(|(owner, token)| (hash_token(token), owner.clone()))
            .collect();

        Self {
            orchestrator: DetectionOrchestrator::new(
                AssetPersister::new(storage),
                RecommendationFetcher::new(generator.clone()),
                records.clone(),
            ),
            chat: AgronomyChat::new(generator),
            records,
            tokens,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            config,
        }
    }

    pub fn orchestrator(&self) -> &DetectionOrchestrator {
        &self.orchestrator
    }

    pub fn chat(&self) -> &AgronomyChat {
        &self.chat
    }

    /// Owner id for a bearer token, if the token is known.
    pub fn authenticate(&self, token: &str) -> Option<&str> {
        self.tokens.get(&hash_token(token)).map(String::as_str)
    }

    pub fn recent_detections(
        &self,
        owner_id: &str,
        limit: u32,
    ) -> Result<Vec<DetectionRecord>, CoreError> {
        Ok(self.records.recent(owner_id, limit)?)
    }

    /// Claim the detection slot for a session key. Released when the guard drops.
    pub fn begin_detection(&self, session_key: &str) -> Result<InFlightDetection, CoreError> {
        let mut active = self.in_flight.lock().map_err(|_| CoreError::LockPoisoned)?;
        if !active.insert(session_key.to_string()) {
            return Err(CoreError::DetectionInProgress);
        }
        Ok(InFlightDetection {
            key: session_key.to_string(),
            active: self.in_flight.clone(),
        })
    }

    pub fn detections_in_flight(&self) -> usize {
        self.in_flight.lock().map(|set| set.len()).unwrap_or(0)
    }
}

/// RAII claim on one session's detection slot.
#[derive(Debug)]
pub struct InFlightDetection {
    key: String,
    active: Arc<Mutex<HashSet<String>>>,
}

impl Drop for InFlightDetection {
    fn drop(&mut self) {
        if let Ok(mut active) = self.active.lock() {
            active.remove(&self.key);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::pipeline::detection::assets::FailingStorage;
    use crate::pipeline::gemini::MockTextGenerator;

    fn state(tokens: &[(&str, &str)]) -> CoreState {
        test_state(
            Arc::new(MockTextGenerator::replying("ok")),
            Arc::new(FailingStorage),
            tokens,
        )
    }

    #[test]
    fn authenticate_known_and_unknown_tokens() {
        let core = state(&[("farmer-1", "tok-a"), ("farmer-2", "tok-b")]);
        assert_eq!(core.authenticate("tok-a"), Some("farmer-1"));
        assert_eq!(core.authenticate("tok-b"), Some("farmer-2"));
        assert_eq!(core.authenticate("tok-c"), None);
    }

    #[test]
    fn second_claim_for_same_session_is_rejected() {
        let core = state(&[]);
        let guard = core.begin_detection("session-1").unwrap();
        assert!(matches!(
            core.begin_detection("session-1"),
            Err(CoreError::DetectionInProgress)
        ));
        // Other sessions are independent.
        let other = core.begin_detection("session-2").unwrap();
        assert_eq!(core.detections_in_flight(), 2);

        drop(guard);
        drop(other);
        assert_eq!(core.detections_in_flight(), 0);
        assert!(core.begin_detection("session-1").is_ok());
    }

    #[test]
    fn recent_detections_empty_for_new_owner() {
        let core = state(&[]);
        assert!(core.recent_detections("nobody", 5).unwrap().is_empty());
    }

    #[test]
    fn components_share_generator_configuration() {
        let core = test_state(
            Arc::new(MockTextGenerator::unconfigured()),
            Arc::new(FailingStorage),
            &[],
        );
        assert!(!core.orchestrator().recommendations_configured());
        assert!(!core.chat().is_configured());
    }
}
