pub mod health;
pub mod media;
pub mod schemas;

use std::sync::Arc;
use std::time::Duration;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;

use glimpse_pipeline::MediaPipeline;

/// Per-request budget; a client disconnect or stall past this aborts the
/// in-flight transfer.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The media pipeline instance.
    pub pipeline: Arc<MediaPipeline>,
}

/// Build the axum router with all routes and middleware.
///
/// `body_limit` caps the upload request body; everything else about
/// request sizing is the front proxy's concern.
pub fn router(state: AppState, body_limit: u64) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/upload", post(media::upload))
        .route("/media/{key}", get(media::view))
        .route("/media/{key}/preview", get(media::preview))
        .route("/media/{key}/download", get(media::download))
        .layer(DefaultBodyLimit::max(usize::try_from(body_limit).unwrap_or(usize::MAX)))
        .with_state(state)
        // Spans record the path only: query strings may carry enc_key, which
        // must never reach the logs.
        .layer(TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
            info_span!(
                "request",
                method = %request.method(),
                path = request.uri().path(),
            )
        }))
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .layer(CorsLayer::permissive())
}
