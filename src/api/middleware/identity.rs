//! Optional bearer token identity.
//!
//! No `Authorization` header ⇒ anonymous caller. A header that is present
//! must carry a known `Bearer <token>`; anything else is rejected with 401
//! rather than silently downgraded to anonymous.

use axum::http::Request;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::api::error::ApiError;
use crate::api::types::{ApiContext, OwnerContext};

/// Resolve the caller and inject `OwnerContext` for downstream handlers.
///
/// Accesses `ApiContext` from request extensions (injected by Extension layer).
pub async fn resolve_owner(req: Request<axum::body::Body>, next: Next) -> Response {
    match resolve_owner_inner(req, next).await {
        Ok(resp) => resp,
        Err(err) => err.into_response(),
    }
}

async fn resolve_owner_inner(
    mut req: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ctx: ApiContext = req
        .extensions()
        .get::<ApiContext>()
        .cloned()
        .ok_or(ApiError::Internal("missing API context".into()))?;

    let owner = match req.headers().get("Authorization") {
        None => OwnerContext::anonymous(),
        Some(value) => {
            let token = value
                .to_str()
                .ok()
                .and_then(|v| v.strip_prefix("Bearer "))
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .ok_or(ApiError::Unauthorized)?;
            let owner_id = ctx.core.authenticate(token).ok_or_else(|| {
                tracing::warn!("Rejected unknown bearer token");
                ApiError::Unauthorized
            })?;
            OwnerContext::owner(owner_id)
        }
    };

    req.extensions_mut().insert(owner);
    Ok(next.run(req).await)
}
