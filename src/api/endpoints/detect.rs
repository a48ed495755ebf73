//! Detection endpoint: multipart image upload → full pipeline run.
//!
//! `POST /api/detect`: anonymous and authenticated callers share this
//! route; the identity middleware decides which one a request is.

use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, State};
use axum::http::{HeaderMap, StatusCode};
use axum::{Extension, Json};
use serde::Serialize;

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OwnerContext};
use crate::models::{DetectionRecord, DetectionSummary};
use crate::pipeline::detection::{CancellationFlag, DetectionRequest, NoopObserver, RawImage};

/// Request body limit for uploads (10 MiB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// File extensions accepted for analysis.
const ACCEPTED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// Multipart field carrying the photograph.
const IMAGE_FIELD: &str = "image";

#[derive(Debug, Serialize)]
pub struct DetectionResponse {
    pub id: String,
    pub image_url: String,
    #[serde(flatten)]
    pub summary: DetectionSummary,
    pub created_at: String,
}

impl From<DetectionRecord> for DetectionResponse {
    fn from(record: DetectionRecord) -> Self {
        Self {
            summary: record.summary(),
            id: record.id.to_string(),
            created_at: record.created_at.to_rfc3339(),
            image_url: record.image_ref,
        }
    }
}

/// Trips the cancellation flag if the handler future is dropped
/// (client disconnected) before the pipeline finishes.
struct CancelOnDrop(CancellationFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// `POST /api/detect`: analyze one plant photograph.
pub async fn detect(
    State(ctx): State<ApiContext>,
    Extension(owner): Extension<OwnerContext>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DetectionResponse>, ApiError> {
    let multipart = multipart.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let slot = ctx.core.begin_detection(&session_key(&owner, &headers))?;
    let image = read_image(multipart).await?;

    let cancel = CancellationFlag::new();
    let _cancel_on_drop = CancelOnDrop(cancel.clone());
    let core = ctx.core.clone();
    let request = DetectionRequest {
        image,
        owner_id: owner.owner_id,
    };

    let record = tokio::task::spawn_blocking(move || {
        // Released when the pipeline stops, not when the client goes away.
        let _slot = slot;
        core.orchestrator().detect(request, &cancel, &NoopObserver)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("detection task failed: {e}")))??;

    Ok(Json(record.into()))
}

/// Re-entrancy key: owner id, else the client-supplied session id, else
/// a fresh per-request key.
fn session_key(owner: &OwnerContext, headers: &HeaderMap) -> String {
    if let Some(owner_id) = &owner.owner_id {
        return format!("owner:{owner_id}");
    }
    headers
        .get("X-Session-Id")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("session:{s}"))
        .unwrap_or_else(|| format!("request:{}", uuid::Uuid::new_v4()))
}

async fn read_image(mut multipart: Multipart) -> Result<RawImage, ApiError> {
    let mut image: Option<RawImage> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        if image.is_some() {
            return Err(ApiError::BadRequest("Only one image per request".into()));
        }

        let file_name = field.file_name().map(String::from);
        let mime_type = field
            .content_type()
            .filter(|m| *m != "application/octet-stream")
            .map(String::from);
        let bytes = field.bytes().await.map_err(multipart_error)?;

        let mut raw = RawImage::new(bytes.to_vec());
        raw.file_name = file_name;
        raw.mime_type = mime_type;
        image = Some(raw);
    }

    let image = image.ok_or_else(|| {
        ApiError::BadRequest(format!("Missing multipart field \"{IMAGE_FIELD}\""))
    })?;

    let extension = image.extension();
    if !ACCEPTED_EXTENSIONS.contains(&extension.as_str()) {
        return Err(ApiError::UnprocessableImage(format!(
            "Unsupported image type .{extension} (accepted: .jpg, .jpeg, .png, .webp)"
        )));
    }
    Ok(image)
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(format!(
            "Image exceeds {} MB",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        ))
    } else {
        ApiError::BadRequest(err.body_text())
    }
}
