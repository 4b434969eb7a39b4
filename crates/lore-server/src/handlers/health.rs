use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use chrono::Utc;
use tracing::info;

use lore_core::api_types::HealthResponse;

use crate::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    info!("Health check requested");

    let (neo4j_connected, entity_count, relationship_count) =
        match state.graph.entity_count().await {
            Ok(ec) => {
                let rc = state.graph.relationship_count().await.unwrap_or(0);
                (true, ec, rc)
            }
            Err(e) => {
                tracing::warn!("Neo4j connectivity check failed: {e}");
                (false, 0, 0)
            }
        };

    let status = if neo4j_connected { "ok" } else { "degraded" };

    let response = HealthResponse {
        status: status.to_string(),
        version: VERSION.to_string(),
        llm_model: state.config.llama_model.clone(),
        neo4j_uri: state.config.neo4j_uri.clone(),
        neo4j_connected,
        entity_count,
        relationship_count,
        checked_at: Utc::now(),
    };

    (StatusCode::OK, Json(response))
}
