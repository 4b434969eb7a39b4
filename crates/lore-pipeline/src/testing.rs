//! In-memory gateways with scripted behavior, for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use lore_core::enrich::ContextEnricher;
use lore_core::entity::{ContextEdge, RelationshipRecord, ResolvedEntity};
use lore_core::error::{LoreError, Result};
use lore_core::graph::GraphStore;
use lore_core::llm::{ChatMessage, GenerationOptions, LanguageModel};

#[derive(Debug, Clone)]
pub struct ModelCall {
    pub messages: Vec<ChatMessage>,
    pub options: GenerationOptions,
}

/// Replies with canned responses in order and records every request.
/// Fails once the script runs out, or on every call when built with
/// [`ScriptedModel::failing`].
pub struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<ModelCall>>,
    fail: bool,
}

impl ScriptedModel {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            calls: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn calls(&self) -> Vec<ModelCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LanguageModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn generate(
        &self,
        messages: &[ChatMessage],
        options: GenerationOptions,
    ) -> Result<String> {
        self.calls.lock().unwrap().push(ModelCall {
            messages: messages.to_vec(),
            options,
        });
        if self.fail {
            return Err(LoreError::Llm("model endpoint returned status 503".into()));
        }
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| LoreError::Llm("script exhausted".into()))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteCall {
    pub entities: Vec<ResolvedEntity>,
    pub relationships: Vec<RelationshipRecord>,
}

/// Records writes and queries; queries answer with a fixed edge list.
#[derive(Default)]
pub struct RecordingStore {
    edges: Vec<ContextEdge>,
    writes: Mutex<Vec<WriteCall>>,
    queries: Mutex<Vec<Vec<String>>>,
    fail: bool,
}

impl RecordingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_edges(edges: Vec<ContextEdge>) -> Self {
        Self {
            edges,
            ..Self::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn writes(&self) -> Vec<WriteCall> {
        self.writes.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<Vec<String>> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl GraphStore for RecordingStore {
    async fn write(
        &self,
        entities: &[ResolvedEntity],
        relationships: &[RelationshipRecord],
    ) -> Result<()> {
        if self.fail {
            return Err(LoreError::Graph("Neo4j not connected".into()));
        }
        self.writes.lock().unwrap().push(WriteCall {
            entities: entities.to_vec(),
            relationships: relationships.to_vec(),
        });
        Ok(())
    }

    async fn query(&self, names: &[String]) -> Result<Vec<ContextEdge>> {
        if self.fail {
            return Err(LoreError::Graph("Neo4j not connected".into()));
        }
        self.queries.lock().unwrap().push(names.to_vec());
        Ok(self
            .edges
            .iter()
            .filter(|e| names.contains(&e.source) || names.contains(&e.target))
            .cloned()
            .collect())
    }

    async fn entity_count(&self) -> Result<u64> {
        if self.fail {
            return Err(LoreError::Graph("Neo4j not connected".into()));
        }
        Ok(self.writes().iter().map(|w| w.entities.len() as u64).sum())
    }

    async fn relationship_count(&self) -> Result<u64> {
        if self.fail {
            return Err(LoreError::Graph("Neo4j not connected".into()));
        }
        Ok(self.edges.len() as u64)
    }
}

/// Always answers with the same summary and remembers the topics asked for.
pub struct StaticEnricher {
    summary: String,
    topics: Mutex<Vec<String>>,
}

impl StaticEnricher {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            topics: Mutex::new(Vec::new()),
        }
    }

    pub fn topics(&self) -> Vec<String> {
        self.topics.lock().unwrap().clone()
    }
}

#[async_trait]
impl ContextEnricher for StaticEnricher {
    fn name(&self) -> &str {
        "static"
    }

    async fn summary(&self, topic: &str) -> Result<Option<String>> {
        self.topics.lock().unwrap().push(topic.to_string());
        Ok(Some(self.summary.clone()))
    }
}

pub struct FailingEnricher;

#[async_trait]
impl ContextEnricher for FailingEnricher {
    fn name(&self) -> &str {
        "failing"
    }

    async fn summary(&self, _topic: &str) -> Result<Option<String>> {
        Err(LoreError::Enrichment("lookup timed out".into()))
    }
}
