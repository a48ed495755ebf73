//! Plant disease detection pipeline.
//!
//! Image → color histogram → heuristic verdict → treatment advice → record.
//! Storage and recommendation failures degrade gracefully; only an
//! undecodable image, a failed record write or cancellation surface as errors.

pub mod assets;
pub mod classify;
pub mod features;
pub mod orchestrator;
pub mod prompt;
pub mod recommend;
pub mod store;
pub mod types;

pub use assets::{AssetPersister, LocalObjectStorage, ObjectStorage, StorageError};
pub use orchestrator::DetectionOrchestrator;
pub use recommend::RecommendationFetcher;
pub use store::{RecordStore, SqliteRecordStore};
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DetectionError {
    #[error("Image could not be decoded: {0}")]
    ImageDecode(String),

    #[error("{0}")]
    RecordPersist(String),

    #[error("Detection cancelled")]
    Cancelled,

    #[error("Internal pipeline error: {0}")]
    Internal(String),
}
