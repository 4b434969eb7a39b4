use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use lore_core::entity::ContextEdge;
use lore_core::error::Result;
use lore_core::llm::{ChatMessage, GenerationOptions, LanguageModel};
use lore_core::state::PipelineState;

use crate::stage::{Stage, StageId};

const MAX_TOKENS: u32 = 512;

const SYSTEM_PROMPT: &str = "You are a helpful assistant answering from a knowledge graph. \
Use the graph context when it is relevant and say so when it is missing. For ingest \
requests, briefly confirm what was stored.";

/// Produces the final reply.
pub struct ResponseSynthesizer {
    llm: Arc<dyn LanguageModel>,
}

impl ResponseSynthesizer {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    fn render_context(edges: &[ContextEdge]) -> String {
        edges
            .iter()
            .map(ContextEdge::render)
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn build_user_prompt(state: &PipelineState) -> String {
        format!(
            "Mode: {}\nIntent: {}\nQuery: {}\nContext:\n{}\n",
            state.mode,
            state.intent.as_deref().unwrap_or(""),
            state.user_text(),
            Self::render_context(&state.context)
        )
    }
}

#[async_trait]
impl Stage for ResponseSynthesizer {
    fn id(&self) -> StageId {
        StageId::ResponseSynthesizer
    }

    async fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        let mut messages = Vec::with_capacity(state.history.len() + 2);
        messages.push(ChatMessage::system(SYSTEM_PROMPT));
        messages.extend(state.history.iter().cloned());
        messages.push(ChatMessage::user(Self::build_user_prompt(&state)));

        let reply = self
            .llm
            .generate(&messages, GenerationOptions::with_max_tokens(MAX_TOKENS))
            .await?;

        info!(reply_len = reply.len(), context = state.context.len(), "Response synthesized");
        state.response = Some(reply);
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use lore_core::llm::Role;
    use serde_json::json;

    #[tokio::test]
    async fn history_sits_between_system_and_user() {
        let model = Arc::new(ScriptedModel::new(["  Alice works at Acme.  "]));
        let history = vec![
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ];
        let mut state = PipelineState::retrieve("where does Alice work?", history);
        state.intent = Some("lookup".into());

        let state = ResponseSynthesizer::new(model.clone()).run(state).await.unwrap();

        assert_eq!(state.response.as_deref(), Some("  Alice works at Acme.  "));
        let call = &model.calls()[0];
        let roles: Vec<Role> = call.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(call.options.max_tokens, 512);
        assert!(call.messages[3].content.contains("Intent: lookup"));
        assert!(call.messages[3].content.contains("Query: where does Alice work?"));
    }

    #[tokio::test]
    async fn context_is_rendered_one_line_per_edge() {
        let model = Arc::new(ScriptedModel::new(["ok"]));
        let mut edge = ContextEdge::new("Alice", "works_at", "Acme");
        edge.source_properties.insert("role".into(), json!("engineer"));
        let mut state = PipelineState::retrieve("q", vec![]);
        state.context = vec![edge, ContextEdge::new("Acme", "located_in", "Berlin")];

        ResponseSynthesizer::new(model.clone()).run(state).await.unwrap();

        let prompt = &model.calls()[0].messages[1].content;
        assert!(prompt.contains(
            "Alice -[works_at]-> Acme | source_props={\"role\":\"engineer\"} target_props={}\n\
             Acme -[located_in]-> Berlin | source_props={} target_props={}"
        ));
    }

    #[tokio::test]
    async fn ingest_prompt_uses_text() {
        let model = Arc::new(ScriptedModel::new(["Stored."]));
        let state = PipelineState::ingest("Alice works at Acme.", None);

        let state = ResponseSynthesizer::new(model.clone()).run(state).await.unwrap();

        assert_eq!(state.response.as_deref(), Some("Stored."));
        let prompt = &model.calls()[0].messages[1].content;
        assert!(prompt.contains("Mode: ingest\nIntent: ingest\nQuery: Alice works at Acme."));
    }
}
