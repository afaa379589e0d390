use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use benefits_search::{
    config::Config,
    documents::DocumentStore,
    plans::PlanRegistry,
    routes::create_router,
    search::{HybridSearcher, QdrantClient},
    utils::init_logging,
    AppState,
};

/// Hybrid search and visual grounding API over extracted plan documents
#[derive(Debug, Parser)]
#[command(name = "benefits-search", version, about)]
struct Args {
    /// Address to bind (overrides HOST)
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on (overrides PORT)
    #[arg(long)]
    port: Option<u16>,

    /// Plan registry JSON file (overrides PLANS_PATH)
    #[arg(long)]
    plans: Option<PathBuf>,

    /// Directory of extraction artifacts (overrides DOC_STORE_DIR)
    #[arg(long)]
    doc_store: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::from_env()?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(plans) = args.plans {
        config.storage.plans_path = plans;
    }
    if let Some(doc_store) = args.doc_store {
        config.storage.doc_store_dir = doc_store;
    }

    let _log_guard = init_logging(&config.logging);
    info!("Configuration loaded: {:?}", config.server);
    info!("Qdrant: {:?}", config.qdrant);

    // The registry is immutable once loaded; refuse to start on a bad file.
    let plans = PlanRegistry::load(&config.storage.plans_path)
        .with_context(|| format!("Failed to load plans from {}", config.storage.plans_path.display()))?;

    let qdrant = QdrantClient::new(&config.qdrant, &config.embedding)?;
    info!(endpoint = qdrant.endpoint(), "Hybrid search client ready");

    let documents = DocumentStore::new(&config.storage.doc_store_dir);
    if !documents.root().is_dir() {
        warn!(
            path = %documents.root().display(),
            "Document store directory does not exist; grounding and annotation will fail"
        );
    }

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .with_context(|| format!("Invalid bind address {}:{}", config.server.host, config.server.port))?;

    // Create shared state
    let state = AppState {
        config: Arc::new(config),
        plans: Arc::new(plans),
        searcher: HybridSearcher::new(Arc::new(qdrant)),
        documents,
    };

    let app = create_router(state);

    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .await
        .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

    Ok(())
}
