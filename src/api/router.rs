//! HTTP API router.
//!
//! Returns a composable `Router`. JSON routes are nested under `/api/`;
//! stored images are served read-only under `/storage/crop-images/`.
//!
//! Middleware stack (outermost → innermost):
//! 1. CORS → 2. Extension(ApiContext) → 3. Owner identity

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::endpoints::detect::MAX_UPLOAD_BYTES;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::config::IMAGE_BUCKET;
use crate::core_state::CoreState;

/// Build the API router.
///
/// Middleware uses `Extension<ApiContext>` (injected outside the identity layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    let storage_dir = ctx.core.config.storage_dir();

    let api = Router::new()
        .route("/health", get(endpoints::health::check))
        .route(
            "/detect",
            post(endpoints::detect::detect).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/detections/recent", get(endpoints::detections::recent))
        .route("/chat/send", post(endpoints::chat::send))
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::identity::resolve_owner))
        // Extension must sit outside the identity layer so it can read ApiContext
        .layer(axum::Extension(ctx))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ));

    let images = Router::new()
        .nest_service(&format!("/storage/{IMAGE_BUCKET}"), ServeDir::new(storage_dir))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ));

    Router::new()
        .nest("/api", api)
        .merge(images)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET, Method::POST])
                .allow_headers(Any),
        )
}
