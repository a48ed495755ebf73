//! Image asset persistence with inline fallback.
//!
//! Upload to object storage first; on any storage failure the image is
//! embedded as a `data:` URI instead. `persist` itself never fails.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use base64::Engine;
use rand::Rng;
use thiserror::Error;

use super::types::{AssetKind, AssetRef, RawImage};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid object path: {0}")]
    InvalidPath(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// Object storage bucket abstraction (allows mocking).
pub trait ObjectStorage: Send + Sync {
    /// Write a new object. Existing objects are never overwritten.
    fn upload(&self, path: &str, bytes: &[u8], content_type: &str) -> Result<(), StorageError>;

    /// Public URL under which an uploaded object is served.
    fn public_url(&self, path: &str) -> String;
}

/// Filesystem-backed bucket, served over HTTP by the API router.
pub struct LocalObjectStorage {
    root: PathBuf,
    base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, base_url: &str) -> Self {
        Self {
            root: root.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(path);
        let is_clean = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_clean {
            return Err(StorageError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl ObjectStorage for LocalObjectStorage {
    fn upload(&self, path: &str, bytes: &[u8], _content_type: &str) -> Result<(), StorageError> {
        let target = self.resolve(path)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(path.to_string()),
                _ => StorageError::Io(e),
            })?;
        file.write_all(bytes)?;
        file.sync_all()?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

/// Produces a durable image reference for a detection record.
pub struct AssetPersister {
    storage: Arc<dyn ObjectStorage>,
}

impl AssetPersister {
    pub fn new(storage: Arc<dyn ObjectStorage>) -> Self {
        Self { storage }
    }

    /// Upload the image; fall back to an inline `data:` URI on failure.
    pub fn persist(&self, image: &RawImage, owner_id: Option<&str>) -> AssetRef {
        let path = object_path(owner_id, &image.extension());
        match self.storage.upload(&path, &image.bytes, &image.mime()) {
            Ok(()) => {
                tracing::debug!(path = %path, bytes = image.bytes.len(), "Image uploaded");
                AssetRef {
                    reference: self.storage.public_url(&path),
                    kind: AssetKind::Stored,
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Image upload failed, embedding inline");
                AssetRef {
                    reference: to_data_uri(image),
                    kind: AssetKind::Inline,
                }
            }
        }
    }
}

/// Object key for an upload. Owners get a per-owner prefix, anonymous
/// uploads land under `public/` with a millisecond timestamp.
pub fn object_path(owner_id: Option<&str>, extension: &str) -> String {
    match owner_id {
        Some(owner) => format!("{}/{}.{}", owner, uuid::Uuid::new_v4().simple(), extension),
        None => format!(
            "public/{}-{}.{}",
            chrono::Utc::now().timestamp_millis(),
            random_base36(7),
            extension
        ),
    }
}

fn random_base36(len: usize) -> String {
    const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

/// Encode the full image as `data:{mime};base64,{payload}`.
pub fn to_data_uri(image: &RawImage) -> String {
    format!(
        "data:{};base64,{}",
        image.mime(),
        base64::engine::general_purpose::STANDARD.encode(&image.bytes)
    )
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[cfg(test)]
pub(crate) struct FailingStorage;

#[cfg(test)]
impl ObjectStorage for FailingStorage {
    fn upload(&self, _path: &str, _bytes: &[u8], _content_type: &str) -> Result<(), StorageError> {
        Err(StorageError::Unavailable("bucket offline".into()))
    }

    fn public_url(&self, path: &str) -> String {
        format!("http://unused/{path}")
    }
}
