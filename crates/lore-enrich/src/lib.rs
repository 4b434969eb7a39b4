use std::sync::Arc;

use lore_core::{AppConfig, ContextEnricher, Result};

mod wikipedia;

pub use wikipedia::{first_sentences, WikipediaEnricher};

/// The configured context enricher, or `None` when enrichment is disabled.
pub fn enricher_from_config(config: &AppConfig) -> Result<Option<Arc<dyn ContextEnricher>>> {
    if !config.enrichment_enabled {
        tracing::info!("Context enrichment disabled");
        return Ok(None);
    }
    let enricher = WikipediaEnricher::new(&config.wikipedia_lang)?;
    Ok(Some(Arc::new(enricher)))
}
