use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use lore_core::enrich::ContextEnricher;
use lore_core::error::Result;
use lore_core::llm::{ChatMessage, GenerationOptions, LanguageModel};
use lore_core::state::{Mode, PipelineState};

use crate::json::{parse_json_object, string_list, Recovery};
use crate::stage::{Stage, StageId};

const MAX_TOKENS: u32 = 256;
const UNKNOWN_INTENT: &str = "unknown";

const SYSTEM_PROMPT: &str = "You are a query analyzer that determines the user's intent, key focus, \
and high-level entities for downstream knowledge graph tasks. Always output JSON with \
`intent` (a short string) and `entities` (a list of entity names) fields.";

/// Classifies intent and proposes candidate entity names.
pub struct QueryAnalyzer {
    llm: Arc<dyn LanguageModel>,
    enricher: Option<Arc<dyn ContextEnricher>>,
}

impl QueryAnalyzer {
    pub fn new(llm: Arc<dyn LanguageModel>, enricher: Option<Arc<dyn ContextEnricher>>) -> Self {
        Self { llm, enricher }
    }

    /// Background text for retrieve requests. Lookup failures are swallowed.
    async fn lookup_context(&self, mode: Mode, text: &str) -> String {
        if mode != Mode::Retrieve || text.trim().is_empty() {
            return String::new();
        }
        let Some(enricher) = &self.enricher else {
            return String::new();
        };

        match enricher.summary(text).await {
            Ok(Some(summary)) => summary,
            Ok(None) => String::new(),
            Err(e) => {
                warn!(enricher = enricher.name(), error = %e, "Context lookup failed, continuing without it");
                String::new()
            }
        }
    }

    fn build_user_prompt(mode: Mode, text: &str, context: &str) -> String {
        format!("Mode: {mode}\nUser Input: {text}\nWikipedia Context: {context}\n")
    }
}

#[async_trait]
impl Stage for QueryAnalyzer {
    fn id(&self) -> StageId {
        StageId::QueryAnalyzer
    }

    async fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        let text = state.user_text().to_string();
        let context = self.lookup_context(state.mode, &text).await;

        debug!(
            mode = %state.mode,
            text_len = text.len(),
            context_len = context.len(),
            "Analyzing request"
        );

        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(Self::build_user_prompt(state.mode, &text, &context)),
        ];
        let raw = self
            .llm
            .generate(&messages, GenerationOptions::with_max_tokens(MAX_TOKENS))
            .await?;

        let (data, recovery) = parse_json_object(&raw);
        if recovery == Recovery::Failed {
            state.note("query analyzer: model output was not JSON");
        }

        state.intent = Some(
            data.get("intent")
                .and_then(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(UNKNOWN_INTENT)
                .to_string(),
        );
        state.entities = string_list(data.get("entities"));

        info!(
            intent = state.intent.as_deref().unwrap_or(UNKNOWN_INTENT),
            entities = state.entities.len(),
            "Query analyzed"
        );

        Ok(state)
    }
}
