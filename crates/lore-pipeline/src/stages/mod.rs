mod analyzer;
mod loader;
mod resolver;
mod synthesizer;
mod traversal;

pub use analyzer::QueryAnalyzer;
pub use loader::DataLoader;
pub use resolver::EntityResolver;
pub use synthesizer::ResponseSynthesizer;
pub use traversal::Traversal;
