use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{ContextEdge, RelationshipRecord, ResolvedEntity};
use crate::error::{LoreError, Result};
use crate::llm::ChatMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Ingest,
    Retrieve,
}

impl Mode {
    pub const ALL: [Mode; 2] = [Mode::Ingest, Mode::Retrieve];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Ingest => "ingest",
            Mode::Retrieve => "retrieve",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = LoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ingest" => Ok(Mode::Ingest),
            "retrieve" => Ok(Mode::Retrieve),
            other => Err(LoreError::Config(format!("unknown pipeline mode: {other:?}"))),
        }
    }
}

/// The record threaded through every stage of one pipeline run.
///
/// Field ownership:
/// - request boundary: `mode`, `query`, `text`, `source`, `history`
/// - query analyzer: `intent`, `entities`
/// - entity resolver: `entity_graph`, `relationships`, `entities`
/// - data loader: `sources` inside `entity_graph` properties
/// - traversal: `context`
/// - response synthesizer: `response`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    pub run_id: Uuid,
    pub mode: Mode,
    pub query: Option<String>,
    pub text: Option<String>,
    pub source: Option<String>,
    pub intent: Option<String>,
    pub entities: Vec<String>,
    pub entity_graph: Vec<ResolvedEntity>,
    pub relationships: Vec<RelationshipRecord>,
    pub context: Vec<ContextEdge>,
    pub response: Option<String>,
    pub history: Vec<ChatMessage>,
    /// Advisory diagnostics. Never returned to API callers.
    pub error: Option<String>,
}

impl PipelineState {
    pub fn new(mode: Mode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            query: None,
            text: None,
            source: None,
            intent: None,
            entities: Vec::new(),
            entity_graph: Vec::new(),
            relationships: Vec::new(),
            context: Vec::new(),
            response: None,
            history: Vec::new(),
            error: None,
        }
    }

    /// State for an ingest request. The text doubles as the query so the
    /// synthesizer has something to acknowledge.
    pub fn ingest(text: impl Into<String>, source: Option<String>) -> Self {
        let text = text.into();
        let mut state = Self::new(Mode::Ingest);
        state.query = Some(text.clone());
        state.text = Some(text);
        state.source = source.filter(|s| !s.trim().is_empty());
        state.intent = Some("ingest".to_string());
        state
    }

    pub fn retrieve(query: impl Into<String>, history: Vec<ChatMessage>) -> Self {
        let mut state = Self::new(Mode::Retrieve);
        state.query = Some(query.into());
        state.history = history;
        state
    }

    /// `text` in ingest mode, `query` in retrieve mode; empty when unset.
    pub fn user_text(&self) -> &str {
        let field = match self.mode {
            Mode::Ingest => &self.text,
            Mode::Retrieve => &self.query,
        };
        field.as_deref().unwrap_or("")
    }

    /// Names of resolved entities, in order, skipping unnamed ones.
    pub fn resolved_names(&self) -> Vec<String> {
        self.entity_graph
            .iter()
            .filter(|e| !e.name.trim().is_empty())
            .map(|e| e.name.clone())
            .collect()
    }

    /// Append an advisory note to `error`.
    pub fn note(&mut self, message: impl AsRef<str>) {
        match &mut self.error {
            Some(existing) => {
                existing.push_str("; ");
                existing.push_str(message.as_ref());
            }
            None => self.error = Some(message.as_ref().to_string()),
        }
    }

    /// Checks the invariants that must hold between stages.
    pub fn check_invariants(&self, expected_mode: Mode) -> Result<()> {
        if self.mode != expected_mode {
            return Err(LoreError::Internal(format!(
                "pipeline mode changed mid-run from {expected_mode} to {}",
                self.mode
            )));
        }
        if let Some(pos) = self.entities.iter().position(|e| e.trim().is_empty()) {
            return Err(LoreError::Internal(format!(
                "entities[{pos}] is empty"
            )));
        }
        Ok(())
    }
}
