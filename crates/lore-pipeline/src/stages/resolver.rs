use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::{debug, info};

use lore_core::entity::{Properties, RelationshipRecord, ResolvedEntity, DEFAULT_RELATION_TYPE};
use lore_core::error::Result;
use lore_core::llm::{ChatMessage, GenerationOptions, LanguageModel};
use lore_core::state::PipelineState;

use crate::json::{parse_json_object, Recovery};
use crate::stage::{Stage, StageId};

const MAX_TOKENS: u32 = 512;

const SYSTEM_PROMPT: &str = "You are an entity resolver. Disambiguate the candidate entities and \
ground them in the text. Output JSON with `entities` (a list of objects with `name` and \
`properties`) and `relationships` (a list of objects with `start`, `end`, `type` and \
`properties`).";

// ---------------------------------------------------------------------------
// Model output records
// ---------------------------------------------------------------------------

/// Text of a scalar value; numbers and booleans are stringified.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

fn object_properties(value: Option<Value>) -> Properties {
    match value {
        Some(Value::Object(map)) => map,
        _ => Properties::new(),
    }
}

/// First non-empty text among `keys`, in order.
fn first_text(record: &Map<String, Value>, keys: &[&str]) -> String {
    keys.iter()
        .filter_map(|key| record.get(*key).and_then(scalar_text))
        .find(|text| !text.is_empty())
        .unwrap_or_default()
}

/// A bare string is a named entity. Objects keep `properties` and fold in
/// other scalar keys that `properties` does not already have. A missing or
/// null name becomes empty.
fn decode_entity(item: &Value) -> Option<ResolvedEntity> {
    match item {
        Value::String(name) => Some(ResolvedEntity::new(name.trim())),
        Value::Object(record) => {
            let mut record = record.clone();
            let name = record
                .remove("name")
                .and_then(|v| v.as_str().map(|s| s.trim().to_string()))
                .unwrap_or_default();
            let mut properties = object_properties(record.remove("properties"));
            for (key, value) in record {
                if is_scalar(&value) && !properties.contains_key(&key) {
                    properties.insert(key, value);
                }
            }
            Some(ResolvedEntity { name, properties })
        }
        _ => None,
    }
}

/// `start`/`end` win over their `source`/`target` aliases. A non-string
/// scalar `type` is stringified; a missing or blank one is `related_to`.
fn decode_relationship(item: &Value) -> Option<RelationshipRecord> {
    let Value::Object(record) = item else {
        return None;
    };

    let relation_type = record
        .get("type")
        .and_then(scalar_text)
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_RELATION_TYPE.to_string());

    Some(RelationshipRecord {
        start: first_text(record, &["start", "source"]),
        end: first_text(record, &["end", "target"]),
        relation_type,
        properties: object_properties(record.get("properties").cloned()),
    })
}

/// Decode each element on its own so one malformed record does not sink
/// the rest of the list.
fn decode_list<T>(value: Option<&Value>, what: &str, decode: fn(&Value) -> Option<T>) -> Vec<T> {
    let Some(Value::Array(items)) = value else {
        return Vec::new();
    };

    items
        .iter()
        .filter_map(|item| {
            let decoded = decode(item);
            if decoded.is_none() {
                debug!(kind = what, record = %item, "Skipping malformed record");
            }
            decoded
        })
        .collect()
}

/// Turns candidate names into entity records and the relationships between them.
pub struct EntityResolver {
    llm: Arc<dyn LanguageModel>,
}

impl EntityResolver {
    pub fn new(llm: Arc<dyn LanguageModel>) -> Self {
        Self { llm }
    }

    fn build_user_prompt(state: &PipelineState) -> String {
        let candidates = Value::from(state.entities.clone());
        format!(
            "Mode: {}\nCandidate Entities: {}\nText: {}\n",
            state.mode,
            candidates,
            state.user_text()
        )
    }
}

#[async_trait]
impl Stage for EntityResolver {
    fn id(&self) -> StageId {
        StageId::EntityResolver
    }

    async fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        let messages = [
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(Self::build_user_prompt(&state)),
        ];
        let raw = self
            .llm
            .generate(&messages, GenerationOptions::with_max_tokens(MAX_TOKENS))
            .await?;

        let (data, recovery) = parse_json_object(&raw);
        if recovery == Recovery::Failed {
            state.note("entity resolver: model output was not JSON");
        }

        state.entity_graph = decode_list(data.get("entities"), "entity", decode_entity);
        state.relationships =
            decode_list(data.get("relationships"), "relationship", decode_relationship);

        let names = state.resolved_names();
        if !names.is_empty() {
            state.entities = names;
        }

        info!(
            entities = state.entity_graph.len(),
            relationships = state.relationships.len(),
            "Entities resolved"
        );

        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedModel;
    use serde_json::json;

    async fn resolve(reply: &str, state: PipelineState) -> PipelineState {
        let model = Arc::new(ScriptedModel::new([reply]));
        EntityResolver::new(model).run(state).await.unwrap()
    }

    #[tokio::test]
    async fn records_are_decoded_and_names_replace_candidates() {
        let mut state = PipelineState::ingest("Alice works at Acme.", None);
        state.entities = vec!["alice".into()];
        let reply = r#"{
            "entities": [
                {"name": "Alice", "properties": {"role": "engineer"}},
                {"name": "Acme", "properties": {}}
            ],
            "relationships": [
                {"start": "Alice", "end": "Acme", "type": "works_at", "properties": {"since": 2020}}
            ]
        }"#;

        let state = resolve(reply, state).await;

        assert_eq!(state.entities, vec!["Alice", "Acme"]);
        assert_eq!(state.entity_graph[0].properties["role"], "engineer");
        assert_eq!(state.relationships.len(), 1);
        assert_eq!(state.relationships[0].relation_type, "works_at");
        assert_eq!(state.relationships[0].properties["since"], 2020);
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn lenient_record_shapes() {
        let reply = json!({
            "entities": [
                "Bob",
                {"name": "Acme", "type": "organization", "description": "anvils",
                 "properties": {"type": "company"}, "tags": ["x"]},
                42
            ],
            "relationships": [
                {"source": "Bob", "target": "Acme"},
                {"start": "Acme", "end": "Bob", "type": "  "}
            ]
        })
        .to_string();

        let state = resolve(&reply, PipelineState::retrieve("q", vec![])).await;

        assert_eq!(state.entity_graph.len(), 2);
        assert_eq!(state.entity_graph[0], ResolvedEntity::new("Bob"));
        let acme = &state.entity_graph[1].properties;
        assert_eq!(acme["type"], "company");
        assert_eq!(acme["description"], "anvils");
        assert!(!acme.contains_key("tags"));

        assert_eq!(state.relationships[0].start, "Bob");
        assert_eq!(state.relationships[0].end, "Acme");
        assert_eq!(state.relationships[0].relation_type, "related_to");
        assert_eq!(state.relationships[1].relation_type, "related_to");
    }

    #[tokio::test]
    async fn canonical_endpoints_win_over_aliases() {
        let reply = json!({
            "entities": ["A", "B"],
            "relationships": [
                {"start": "A", "end": "B", "source": "doc", "type": "knows"},
                {"start": "A", "end": "B", "type": 7},
                {"source": "B", "end": "A", "target": "ignored", "type": true}
            ]
        })
        .to_string();

        let state = resolve(&reply, PipelineState::ingest("A knows B.", None)).await;

        let edges: Vec<(&str, &str, &str)> = state
            .relationships
            .iter()
            .map(|r| (r.start.as_str(), r.end.as_str(), r.relation_type.as_str()))
            .collect();
        assert_eq!(
            edges,
            vec![("A", "B", "knows"), ("A", "B", "7"), ("B", "A", "true")]
        );
    }

    #[tokio::test]
    async fn null_name_keeps_the_record() {
        let mut state = PipelineState::retrieve("q", vec![]);
        state.entities = vec!["Acme".into()];
        let reply = r#"{"entities": [{"name": null, "description": "unknown"}, {"name": "Acme"}]}"#;

        let state = resolve(reply, state).await;

        assert_eq!(state.entity_graph.len(), 2);
        assert_eq!(state.entity_graph[0].name, "");
        assert_eq!(state.entity_graph[0].properties["description"], "unknown");
        assert_eq!(state.entities, vec!["Acme"]);
    }

    #[tokio::test]
    async fn unnamed_entities_leave_candidates_untouched() {
        let mut state = PipelineState::retrieve("q", vec![]);
        state.entities = vec!["Acme".into()];

        let state = resolve(r#"{"entities": [{"properties": {"a": 1}}]}"#, state).await;

        assert_eq!(state.entities, vec!["Acme"]);
        assert_eq!(state.entity_graph.len(), 1);
        assert!(state.relationships.is_empty());
    }

    #[tokio::test]
    async fn unparseable_output_yields_empty_graph() {
        let mut state = PipelineState::retrieve("q", vec![]);
        state.entities = vec!["Acme".into()];

        let state = resolve("I could not find anything.", state).await;

        assert!(state.entity_graph.is_empty());
        assert!(state.relationships.is_empty());
        assert_eq!(state.entities, vec!["Acme"]);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn prompt_carries_candidates_and_budget() {
        let model = Arc::new(ScriptedModel::new(["{}"]));
        let mut state = PipelineState::ingest("Alice works at Acme.", None);
        state.entities = vec!["Alice".into(), "Acme".into()];

        EntityResolver::new(model.clone()).run(state).await.unwrap();

        let call = &model.calls()[0];
        assert_eq!(call.options.max_tokens, 512);
        assert!(call.messages[1].content.contains(r#"Candidate Entities: ["Alice","Acme"]"#));
        assert!(call.messages[1].content.contains("Text: Alice works at Acme."));
    }
}
