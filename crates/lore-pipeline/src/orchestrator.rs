use std::sync::Arc;

use tracing::info;

use lore_core::enrich::ContextEnricher;
use lore_core::error::Result;
use lore_core::graph::GraphStore;
use lore_core::llm::LanguageModel;
use lore_core::state::{Mode, PipelineState};

use crate::graph::{StageGraph, StageGraphBuilder};
use crate::stage::StageId;
use crate::stages::{DataLoader, EntityResolver, QueryAnalyzer, ResponseSynthesizer, Traversal};

/// External collaborators shared by every stage.
#[derive(Clone)]
pub struct Gateways {
    pub llm: Arc<dyn LanguageModel>,
    pub store: Arc<dyn GraphStore>,
    pub enricher: Option<Arc<dyn ContextEnricher>>,
}

/// Branch selector after entity resolution.
pub fn route_by_mode(state: &PipelineState) -> Mode {
    state.mode
}

/// The five-stage knowledge pipeline, compiled once and shared.
pub struct Orchestrator {
    graph: StageGraph,
}

impl Orchestrator {
    pub fn new(gateways: Gateways) -> Result<Self> {
        let Gateways { llm, store, enricher } = gateways;

        let graph = StageGraphBuilder::new()
            .add_stage(Arc::new(QueryAnalyzer::new(llm.clone(), enricher)))
            .add_stage(Arc::new(EntityResolver::new(llm.clone())))
            .add_stage(Arc::new(DataLoader::new(store.clone())))
            .add_stage(Arc::new(Traversal::new(store)))
            .add_stage(Arc::new(ResponseSynthesizer::new(llm.clone())))
            .set_entry(StageId::QueryAnalyzer)
            .add_edge(StageId::QueryAnalyzer, StageId::EntityResolver)
            .add_branch(
                StageId::EntityResolver,
                route_by_mode,
                [
                    (Mode::Ingest, StageId::DataLoader),
                    (Mode::Retrieve, StageId::Traversal),
                ],
            )
            .add_edge(StageId::DataLoader, StageId::ResponseSynthesizer)
            .add_edge(StageId::Traversal, StageId::ResponseSynthesizer)
            .add_finish(StageId::ResponseSynthesizer)
            .compile()?;

        info!(model = llm.model_name(), "Pipeline compiled");
        Ok(Self { graph })
    }

    pub async fn run(&self, state: PipelineState) -> Result<PipelineState> {
        self.graph.run(state).await
    }

    pub fn graph(&self) -> &StageGraph {
        &self.graph
    }
}
