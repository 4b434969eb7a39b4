pub mod api_types;
pub mod config;
pub mod enrich;
pub mod entity;
pub mod error;
pub mod graph;
pub mod llm;
pub mod state;

pub use config::AppConfig;
pub use enrich::ContextEnricher;
pub use entity::{ContextEdge, Properties, RelationshipRecord, ResolvedEntity};
pub use error::{LoreError, Result};
pub use graph::{GraphStore, TRAVERSAL_LIMIT};
pub use llm::{ChatMessage, GenerationOptions, LanguageModel, Role};
pub use state::{Mode, PipelineState};
