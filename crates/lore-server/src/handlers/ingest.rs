use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info, instrument};

use lore_core::api_types::{IngestRequest, IngestResponse};
use lore_core::state::PipelineState;

use crate::state::AppState;

#[instrument(skip_all, fields(text_len = req.text.len(), source = req.source.as_deref().unwrap_or("none")))]
pub async fn ingest(
    State(state): State<AppState>,
    Json(req): Json<IngestRequest>,
) -> impl IntoResponse {
    info!("Received ingest request");

    let initial = PipelineState::ingest(req.text, req.source);

    match state.orchestrator.run(initial).await {
        Ok(final_state) => {
            let response: IngestResponse = final_state.into();
            info!(entities = response.entities.len(), "Ingest completed");
            Ok(Json(response))
        }
        Err(e) => {
            error!(error = %e, "Ingest failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": format!("Ingest failed: {e}")
                })),
            ))
        }
    }
}
