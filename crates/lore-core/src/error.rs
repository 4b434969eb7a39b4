use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoreError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Graph database error: {0}")]
    Graph(String),

    #[error("Language model error: {0}")]
    Llm(String),

    #[error("Enrichment error: {0}")]
    Enrichment(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Stage {stage} failed: {message}")]
    Stage { stage: String, message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, LoreError>;
