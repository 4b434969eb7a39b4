use std::sync::Arc;

use lore_core::graph::GraphStore;
use lore_core::AppConfig;
use lore_pipeline::Orchestrator;

#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub orchestrator: Arc<Orchestrator>,
    pub graph: Arc<dyn GraphStore>,
}
