use async_trait::async_trait;

use crate::error::Result;

/// Best-effort background lookup for a topic. Callers treat any error as
/// "no context".
#[async_trait]
pub trait ContextEnricher: Send + Sync {
    fn name(&self) -> &str;

    /// A short plain-text summary, or `None` when nothing matched.
    async fn summary(&self, topic: &str) -> Result<Option<String>>;
}
