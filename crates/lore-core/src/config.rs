use serde::{Deserialize, Serialize};

const DEFAULT_LLAMA_API_URL: &str = "http://localhost:8000/v1/chat/completions";
const DEFAULT_LLAMA_MODEL: &str = "llama-3.1-8b-instruct";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub llama_api_url: String,
    pub llama_model: String,
    #[serde(skip_serializing)]
    pub llm_api_key: Option<String>,
    pub llm_timeout_secs: u64,
    /// Skip TLS certificate verification for the model endpoint. Some
    /// self-hosted inference gateways run with self-signed certificates.
    pub llm_accept_invalid_certs: bool,
    pub neo4j_uri: String,
    pub neo4j_user: String,
    #[serde(skip_serializing)]
    pub neo4j_password: String,
    pub neo4j_database: String,
    pub wikipedia_lang: String,
    pub enrichment_enabled: bool,
    pub cors_allow_origins: Vec<String>,
    pub server_host: String,
    pub server_port: u16,
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self {
            llama_api_url: env_or("LLAMA_API_URL", DEFAULT_LLAMA_API_URL),
            llama_model: env_or("LLAMA_MODEL", DEFAULT_LLAMA_MODEL),
            llm_api_key: std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            llm_timeout_secs: std::env::var("LLM_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
            llm_accept_invalid_certs: env_flag("LLM_ACCEPT_INVALID_CERTS", false),
            neo4j_uri: env_or("NEO4J_URI", "bolt://localhost:7687"),
            neo4j_user: env_or("NEO4J_USER", "neo4j"),
            neo4j_password: env_or("NEO4J_PASSWORD", "neo4j"),
            neo4j_database: env_or("NEO4J_DATABASE", "neo4j"),
            wikipedia_lang: env_or("WIKIPEDIA_LANG", "en"),
            enrichment_enabled: env_flag("ENRICHMENT_ENABLED", true),
            cors_allow_origins: parse_origins(&env_or("CORS_ALLOW_ORIGINS", "*")),
            server_host: env_or("SERVER_HOST", "0.0.0.0"),
            server_port: std::env::var("SERVER_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8000),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

/// Split a comma-separated origin list, dropping blanks.
pub fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
