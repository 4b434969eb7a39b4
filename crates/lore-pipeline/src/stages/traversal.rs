use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use lore_core::error::Result;
use lore_core::graph::GraphStore;
use lore_core::state::{Mode, PipelineState};

use crate::stage::{Stage, StageId};

/// Reads the edges around the resolved entities. Retrieve only.
pub struct Traversal {
    store: Arc<dyn GraphStore>,
}

impl Traversal {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Stage for Traversal {
    fn id(&self) -> StageId {
        StageId::Traversal
    }

    async fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        if state.mode != Mode::Retrieve {
            return Ok(state);
        }
        if state.entities.is_empty() {
            state.context = Vec::new();
            return Ok(state);
        }

        state.context = self.store.query(&state.entities).await?;
        info!(
            entities = state.entities.len(),
            edges = state.context.len(),
            "Traversed graph"
        );
        Ok(state)
    }
}
