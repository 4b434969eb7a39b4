use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use lore_core::entity::{RelationshipRecord, ResolvedEntity};
use lore_core::error::Result;
use lore_core::graph::GraphStore;
use lore_core::state::{Mode, PipelineState};

use crate::stage::{Stage, StageId};

fn is_named(entity: &ResolvedEntity) -> bool {
    !entity.name.trim().is_empty()
}

/// Writes the resolved entity graph to the store. Ingest only.
pub struct DataLoader {
    store: Arc<dyn GraphStore>,
}

impl DataLoader {
    pub fn new(store: Arc<dyn GraphStore>) -> Self {
        Self { store }
    }

    /// Add `source` to every named entity, in place.
    fn tag_sources(state: &mut PipelineState) {
        let Some(source) = state.source.clone() else {
            return;
        };
        for entity in state.entity_graph.iter_mut().filter(|e| is_named(e)) {
            entity.add_source(&source);
        }
    }

    /// Relationships whose endpoints are both among `entities`.
    fn connected(
        relationships: &[RelationshipRecord],
        entities: &[ResolvedEntity],
    ) -> Vec<RelationshipRecord> {
        let names: HashSet<&str> = entities.iter().map(|e| e.name.as_str()).collect();
        relationships
            .iter()
            .filter(|r| {
                let keep = names.contains(r.start.as_str()) && names.contains(r.end.as_str());
                if !keep {
                    debug!(start = %r.start, end = %r.end, "Dropping dangling relationship");
                }
                keep
            })
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Stage for DataLoader {
    fn id(&self) -> StageId {
        StageId::DataLoader
    }

    async fn run(&self, mut state: PipelineState) -> Result<PipelineState> {
        if state.mode != Mode::Ingest {
            return Ok(state);
        }

        Self::tag_sources(&mut state);
        let entities: Vec<ResolvedEntity> = state
            .entity_graph
            .iter()
            .filter(|e| is_named(e))
            .cloned()
            .collect();
        if entities.is_empty() {
            info!("Nothing to load");
            return Ok(state);
        }
        let relationships = Self::connected(&state.relationships, &entities);

        self.store.write(&entities, &relationships).await?;
        info!(
            entities = entities.len(),
            relationships = relationships.len(),
            source = state.source.as_deref().unwrap_or(""),
            "Loaded entity graph"
        );

        Ok(state)
    }
}
