//! Detection history endpoint.

use axum::extract::{Query, State};
use axum::{Extension, Json};
use serde::Deserialize;

use crate::api::endpoints::detect::DetectionResponse;
use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OwnerContext};

/// Dashboard default.
pub const DEFAULT_RECENT_LIMIT: u32 = 5;
const MAX_RECENT_LIMIT: u32 = 50;

#[derive(Deserialize)]
pub struct RecentQuery {
    pub limit: Option<u32>,
}

/// `GET /api/detections/recent?limit=N`: caller's latest detections, newest first.
pub async fn recent(
    State(ctx): State<ApiContext>,
    Extension(owner): Extension<OwnerContext>,
    Query(query): Query<RecentQuery>,
) -> Result<Json<Vec<DetectionResponse>>, ApiError> {
    let owner_id = owner.owner_id.ok_or(ApiError::Unauthorized)?;

    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LIMIT);
    if limit == 0 || limit > MAX_RECENT_LIMIT {
        return Err(ApiError::BadRequest(format!(
            "limit must be between 1 and {MAX_RECENT_LIMIT}"
        )));
    }

    let records = ctx.core.recent_detections(&owner_id, limit)?;
    Ok(Json(records.into_iter().map(DetectionResponse::from).collect()))
}
