use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::ContextEdge;
use crate::llm::ChatMessage;
use crate::state::PipelineState;

pub const DEFAULT_INGEST_MESSAGE: &str = "Ingestion complete.";

// --- Health ---

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub llm_model: String,
    pub neo4j_uri: String,
    pub neo4j_connected: bool,
    pub entity_count: u64,
    pub relationship_count: u64,
    pub checked_at: DateTime<Utc>,
}

// --- Ingest ---

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestRequest {
    pub text: String,
    #[serde(default)]
    pub source: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestResponse {
    pub message: String,
    pub entities: Vec<String>,
}

impl From<PipelineState> for IngestResponse {
    fn from(state: PipelineState) -> Self {
        let entities = state.resolved_names();
        let message = state
            .response
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_INGEST_MESSAGE.to_string());
        Self { message, entities }
    }
}

// --- Chat ---

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextChunk {
    pub source: String,
    pub target: String,
    pub relationship: String,
    pub summary: Option<String>,
}

impl From<&ContextEdge> for ContextChunk {
    fn from(edge: &ContextEdge) -> Self {
        Self {
            source: edge.source.clone(),
            target: edge.target.clone(),
            relationship: edge.relationship.clone(),
            summary: Some(edge.summary()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub reply: String,
    #[serde(default)]
    pub context: Vec<ContextChunk>,
}

impl From<PipelineState> for ChatResponse {
    fn from(state: PipelineState) -> Self {
        Self {
            reply: state.response.unwrap_or_default(),
            context: state.context.iter().map(ContextChunk::from).collect(),
        }
    }
}
