use std::sync::Arc;

use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use lore_core::graph::GraphStore;
use lore_core::llm::LanguageModel;
use lore_pipeline::{Gateways, Orchestrator};
use lore_server::{cors_layer, create_router, AppState};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("lore=info".parse().unwrap()))
        .init();

    let config = lore_core::AppConfig::from_env();
    let host = config.server_host.clone();
    let port = config.server_port;

    let llm: Arc<dyn LanguageModel> =
        Arc::new(lore_llm::LlamaClient::new(&config).expect("Failed to build model client"));
    let graph: Arc<dyn GraphStore> = Arc::new(lore_graph::Neo4jGraphStore::new(&config).await);
    let enricher =
        lore_enrich::enricher_from_config(&config).expect("Failed to build Wikipedia client");

    let orchestrator = Orchestrator::new(Gateways {
        llm,
        store: graph.clone(),
        enricher,
    })
    .expect("Invalid pipeline graph");

    let cors = cors_layer(&config);
    let state = AppState {
        config,
        orchestrator: Arc::new(orchestrator),
        graph,
    };

    let app = create_router()
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{host}:{port}");
    tracing::info!("Lore server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
