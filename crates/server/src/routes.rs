//! Route configuration.

use crate::error::ApiError;
use crate::handlers;
use crate::state::AppState;
use axum::Router;
use axum::http::Uri;
use axum::routing::get;
use tower_http::trace::TraceLayer;

/// Create the binary cache router.
///
/// Names like `{hash}.narinfo` can't be expressed as axum route patterns,
/// so the last segment is captured whole and parsed by the handlers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/cache/nix-cache-info", get(handlers::get_nix_cache_info))
        .route(
            "/cache/nar/{file}",
            get(handlers::get_nar_alias)
                .head(handlers::head_nar_alias)
                .put(handlers::put_nar_alias),
        )
        .route(
            "/cache/{file}",
            get(handlers::get_object)
                .head(handlers::head_object)
                .put(handlers::put_object),
        )
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(uri.path().to_string())
}
