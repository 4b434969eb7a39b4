use async_trait::async_trait;

use crate::entity::{ContextEdge, RelationshipRecord, ResolvedEntity};
use crate::error::Result;

/// Maximum number of edges a traversal returns. No ordering is guaranteed
/// when more edges match.
pub const TRAVERSAL_LIMIT: usize = 50;

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Upsert nodes by name and edges by `(start, end, type)`, merging
    /// properties. Relationships missing a start or end are skipped.
    async fn write(
        &self,
        entities: &[ResolvedEntity],
        relationships: &[RelationshipRecord],
    ) -> Result<()>;

    /// Edges incident to any of `names`, at most [`TRAVERSAL_LIMIT`].
    async fn query(&self, names: &[String]) -> Result<Vec<ContextEdge>>;

    async fn entity_count(&self) -> Result<u64>;
    async fn relationship_count(&self) -> Result<u64>;
}
