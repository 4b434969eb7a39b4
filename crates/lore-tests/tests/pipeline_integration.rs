use std::sync::Arc;

use lore_core::entity::ContextEdge;
use lore_core::enrich::ContextEnricher;
use lore_core::error::LoreError;
use lore_core::state::PipelineState;
use lore_core::ChatMessage;
use lore_pipeline::testing::{FailingEnricher, RecordingStore, ScriptedModel, StaticEnricher};
use lore_pipeline::{Gateways, Orchestrator};
use serde_json::json;

const INGEST_ANALYSIS: &str = r#"{"intent": "store_fact", "entities": ["Alice", "Acme"]}"#;
const INGEST_RESOLUTION: &str = r#"Here you go:
{"entities": [
    {"name": "Alice", "properties": {"type": "person"}},
    {"name": "Acme", "properties": {"type": "organization"}}
 ],
 "relationships": [{"start": "Alice", "end": "Acme", "type": "works_at"}]}"#;

fn orchestrator(
    model: &Arc<ScriptedModel>,
    store: &Arc<RecordingStore>,
    enricher: Option<Arc<dyn ContextEnricher>>,
) -> Orchestrator {
    Orchestrator::new(Gateways {
        llm: model.clone(),
        store: store.clone(),
        enricher,
    })
    .expect("standard graph compiles")
}

fn alice_at_acme() -> ContextEdge {
    let mut edge = ContextEdge::new("Alice", "works_at", "Acme");
    edge.source_properties.insert("type".into(), json!("person"));
    edge.target_properties.insert("type".into(), json!("organization"));
    edge
}

// ---------------------------------------------------------------------------
// Ingest
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ingest_writes_tagged_entities() {
    let model = Arc::new(ScriptedModel::new([
        INGEST_ANALYSIS,
        INGEST_RESOLUTION,
        "Stored Alice and Acme.",
    ]));
    let store = Arc::new(RecordingStore::new());

    let state = orchestrator(&model, &store, None)
        .run(PipelineState::ingest("Alice works at Acme.", Some("doc1".into())))
        .await
        .expect("ingest run succeeds");

    assert!(state.entities.contains(&"Alice".to_string()));
    assert!(state.entities.contains(&"Acme".to_string()));
    assert_eq!(state.response.as_deref(), Some("Stored Alice and Acme."));

    let writes = store.writes();
    assert_eq!(writes.len(), 1, "exactly one write per ingest");
    let names: Vec<&str> = writes[0].entities.iter().map(|e| e.name.as_str()).collect();
    assert_eq!(names, vec!["Alice", "Acme"]);
    for entity in &writes[0].entities {
        assert_eq!(entity.sources(), vec!["doc1"], "{} is tagged", entity.name);
    }
    assert_eq!(writes[0].relationships.len(), 1);
    assert_eq!(writes[0].relationships[0].relation_type, "works_at");
    assert!(store.queries().is_empty());
}

#[tokio::test]
async fn ingest_never_consults_the_enricher() {
    let model = Arc::new(ScriptedModel::new([INGEST_ANALYSIS, INGEST_RESOLUTION, "ok"]));
    let store = Arc::new(RecordingStore::new());
    let enricher = Arc::new(StaticEnricher::new("Alice is a name."));

    orchestrator(&model, &store, Some(enricher.clone() as Arc<dyn ContextEnricher>))
        .run(PipelineState::ingest("Alice works at Acme.", None))
        .await
        .expect("ingest run succeeds");

    assert!(enricher.topics().is_empty());
}

#[tokio::test]
async fn failing_store_aborts_ingest() {
    let model = Arc::new(ScriptedModel::new([INGEST_ANALYSIS, INGEST_RESOLUTION, "unused"]));
    let store = Arc::new(RecordingStore::failing());

    let err = orchestrator(&model, &store, None)
        .run(PipelineState::ingest("Alice works at Acme.", Some("doc1".into())))
        .await
        .expect_err("store failure must fail the run");

    match err {
        LoreError::Stage { stage, message } => {
            assert_eq!(stage, "data_loader");
            assert!(message.contains("Neo4j not connected"));
        }
        other => panic!("expected stage error, got {other:?}"),
    }
    assert_eq!(model.calls().len(), 2, "synthesizer must not run");
}

// ---------------------------------------------------------------------------
// Retrieve
// ---------------------------------------------------------------------------

#[tokio::test]
async fn retrieve_answers_from_graph_context() {
    let model = Arc::new(ScriptedModel::new([
        r#"{"intent": "lookup", "entities": ["Alice"]}"#,
        r#"{"entities": [{"name": "Alice"}], "relationships": []}"#,
        "Alice works at Acme.",
    ]));
    let store = Arc::new(RecordingStore::with_edges(vec![
        alice_at_acme(),
        ContextEdge::new("Bob", "knows", "Carol"),
    ]));
    let enricher = Arc::new(StaticEnricher::new("Alice is a common given name."));
    let history = vec![
        ChatMessage::user("hello"),
        ChatMessage::assistant("Hi, what would you like to know?"),
    ];

    let state = orchestrator(&model, &store, Some(enricher.clone() as Arc<dyn ContextEnricher>))
        .run(PipelineState::retrieve("Where does Alice work?", history))
        .await
        .expect("retrieve run succeeds");

    assert_eq!(state.response.as_deref(), Some("Alice works at Acme."));
    assert_eq!(state.context, vec![alice_at_acme()]);
    assert_eq!(store.queries(), vec![vec!["Alice".to_string()]]);
    assert!(store.writes().is_empty());
    assert_eq!(enricher.topics(), vec!["Where does Alice work?"]);

    let calls = model.calls();
    assert_eq!(calls.len(), 3);
    let synthesis = &calls[2].messages;
    assert_eq!(synthesis.len(), 4, "system, two history turns, user");
    assert!(synthesis[3].content.contains(
        "Alice -[works_at]-> Acme | source_props={\"type\":\"person\"} target_props={\"type\":\"organization\"}"
    ));
}

#[tokio::test]
async fn retrieve_without_entities_skips_the_store() {
    let model = Arc::new(ScriptedModel::new([
        "not json at all",
        "still not json",
        "I could not find anything about that.",
    ]));
    let store = Arc::new(RecordingStore::with_edges(vec![alice_at_acme()]));

    let state = orchestrator(&model, &store, None)
        .run(PipelineState::retrieve("Tell me something", vec![]))
        .await
        .expect("malformed model output is not fatal");

    assert_eq!(state.intent.as_deref(), Some("unknown"));
    assert!(state.entities.is_empty());
    assert!(state.context.is_empty());
    assert!(store.queries().is_empty());
    assert!(state.error.is_some(), "recovery failures leave an advisory note");
    assert_eq!(
        state.response.as_deref(),
        Some("I could not find anything about that.")
    );
}

#[tokio::test]
async fn failing_enricher_does_not_fail_retrieve() {
    let model = Arc::new(ScriptedModel::new([
        r#"{"intent": "lookup", "entities": ["Acme"]}"#,
        "{}",
        "Acme employs Alice.",
    ]));
    let store = Arc::new(RecordingStore::with_edges(vec![alice_at_acme()]));

    let state = orchestrator(&model, &store, Some(Arc::new(FailingEnricher) as Arc<dyn ContextEnricher>))
        .run(PipelineState::retrieve("Who works at Acme?", vec![]))
        .await
        .expect("enricher failure is swallowed");

    assert_eq!(state.entities, vec!["Acme"]);
    assert_eq!(state.context.len(), 1);
    assert_eq!(state.response.as_deref(), Some("Acme employs Alice."));
}

#[tokio::test]
async fn model_failure_aborts_at_first_stage() {
    let model = Arc::new(ScriptedModel::failing());
    let store = Arc::new(RecordingStore::new());

    let err = orchestrator(&model, &store, None)
        .run(PipelineState::retrieve("anything", vec![]))
        .await
        .expect_err("model failure must fail the run");

    assert!(matches!(err, LoreError::Stage { ref stage, .. } if stage == "query_analyzer"));
    assert_eq!(model.calls().len(), 1);
    assert!(store.queries().is_empty());
}
