//! Page bridge HTTP server
//!
//! Serves plugin pages that claim asynchronous protocol replies, and accepts
//! those replies on `POST <path>/messages`.
//!
//! ## Usage
//!
//! ```bash
//! PAGEBRIDGE_ENTRY_TTL_SECS=600 cargo run --bin pagebridge_server --features server
//!
//! curl -X POST http://127.0.0.1:8888/pagebridge/messages \
//!   -H "Content-Type: application/json" \
//!   -d '{"kind": "DataFound", "fields": {"Identifier": "get_abc123_1"}}'
//!
//! curl "http://127.0.0.1:8888/pagebridge/status?id=abc123&kind=DataFound"
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::info;
use tracing_subscriber::EnvFilter;

use pagebridge::server::{create_router, AppState};
use pagebridge::{
    run_eviction_sweep, run_ingest_loop, BridgeConfig, CorrelationService, FilePropertyStore,
    PageRegistry, PageRenderer, PageSpec,
};

#[derive(Debug, Parser)]
#[command(name = "pagebridge_server", about = "Plugin page bridge server")]
struct Args {
    /// Address to listen on (overrides PAGEBRIDGE_BIND)
    #[arg(long)]
    bind: Option<SocketAddr>,

    /// Path prefix for all pages (overrides PAGEBRIDGE_PATH)
    #[arg(long)]
    path: Option<String>,

    /// Property file (overrides PAGEBRIDGE_PROPERTIES)
    #[arg(long)]
    properties: Option<PathBuf>,

    /// Alternative .env file to load before reading the environment
    #[arg(long, env = "PAGEBRIDGE_ENV_FILE")]
    env_file: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pagebridge=info,tower_http=debug")),
        )
        .init();

    let args = Args::parse();

    // Load environment variables
    match &args.env_file {
        Some(path) => {
            dotenvy::from_path(path).with_context(|| format!("loading {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let mut config = BridgeConfig::from_env();
    if let Some(bind) = args.bind {
        config.bind = bind;
    }
    if let Some(path) = args.path {
        config.plugin_path = format!("/{}", path.trim_matches('/'));
    }
    if let Some(properties) = args.properties {
        config.properties_path = properties;
    }
    let config = Arc::new(config);

    let service = Arc::new(CorrelationService::new());
    let properties = Arc::new(
        FilePropertyStore::open(&config.properties_path)
            .await
            .context("opening property store")?,
    );

    let pages = Arc::new(PageRegistry::new(config.plugin_path.clone()));
    pages
        .register(PageSpec::new("status", "Request status", false))
        .await;
    pages
        .register(PageSpec::new("insert", "Insert status", true))
        .await;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (inbound_tx, inbound_rx) = mpsc::channel(config.ingest_buffer);

    let ingest = tokio::spawn(run_ingest_loop(
        service.clone(),
        inbound_rx,
        shutdown_rx.clone(),
    ));
    if let Some(ttl) = config.entry_ttl {
        tokio::spawn(run_eviction_sweep(
            service.clone(),
            ttl,
            config.sweep_interval,
            shutdown_rx.clone(),
        ));
    }

    let state = AppState {
        config: config.clone(),
        service,
        pages,
        renderer: Arc::new(PageRenderer::new().context("compiling page layout")?),
        properties,
        inbound: inbound_tx,
    };
    let app = create_router(state);

    info!(addr = %config.bind, path = %config.plugin_path, "Starting server");
    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async {
        tokio::signal::ctrl_c().await.ok();
        info!("Shutdown requested");
    })
    .await?;

    shutdown_tx.send(true).ok();
    let stats = ingest.await.context("joining ingest loop")?;
    info!(accepted = stats.accepted, dropped = stats.dropped, "Server stopped");

    Ok(())
}
