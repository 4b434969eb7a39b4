use std::fmt;

use async_trait::async_trait;

use lore_core::error::Result;
use lore_core::state::PipelineState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StageId {
    QueryAnalyzer,
    EntityResolver,
    DataLoader,
    Traversal,
    ResponseSynthesizer,
}

impl StageId {
    pub fn as_str(&self) -> &'static str {
        match self {
            StageId::QueryAnalyzer => "query_analyzer",
            StageId::EntityResolver => "entity_resolver",
            StageId::DataLoader => "data_loader",
            StageId::Traversal => "traversal",
            StageId::ResponseSynthesizer => "response_synthesizer",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step of the pipeline. A stage writes only its own output fields and
/// hands the state on.
#[async_trait]
pub trait Stage: Send + Sync {
    fn id(&self) -> StageId;

    async fn run(&self, state: PipelineState) -> Result<PipelineState>;
}
