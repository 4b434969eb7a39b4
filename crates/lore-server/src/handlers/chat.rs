use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{error, info, instrument};

use lore_core::api_types::{ChatRequest, ChatResponse};
use lore_core::state::PipelineState;

use crate::state::AppState;

#[instrument(skip_all, fields(message_len = req.message.len(), history = req.history.len()))]
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> impl IntoResponse {
    info!("Received chat request");

    let initial = PipelineState::retrieve(req.message, req.history);

    match state.orchestrator.run(initial).await {
        Ok(final_state) => {
            let response: ChatResponse = final_state.into();
            info!(context = response.context.len(), "Chat completed");
            Ok(Json(response))
        }
        Err(e) => {
            error!(error = %e, "Chat failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": format!("Chat failed: {e}")
                })),
            ))
        }
    }
}
