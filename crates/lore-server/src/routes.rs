use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use lore_core::AppConfig;

use crate::handlers;
use crate::state::AppState;

pub fn create_router() -> Router<AppState> {
    Router::new()
        // Health
        .route("/health", get(handlers::health::health_check))
        // Pipeline
        .route("/api/ingest", post(handlers::ingest::ingest))
        .route("/api/chat", post(handlers::chat::chat))
}

/// `*` anywhere in the configured origins allows every origin.
pub fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.cors_allow_origins.is_empty() || config.cors_allow_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .cors_allow_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(origin = %origin, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(Any)
        .allow_headers(Any)
}
