//! InsightDeck API Server
//!
//! Run with: cargo run --bin insightdeck-api
//!
//! Serves the dashboard tables over `/rest/v1` and their change feed over
//! `/realtime`. Configuration comes from the standard config locations with
//! `INSIGHTDECK_*` environment overrides (see `insightdeck config`); set
//! `store.data_file` to keep tables across restarts. `RUST_LOG` overrides
//! the configured log level.

use anyhow::Context;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing_subscriber::{
    fmt::writer::BoxMakeWriter, layer::SubscriberExt, util::SubscriberInitExt, Layer,
};

use insightdeck::api::{serve, AppState};
use insightdeck::config::{Config, LoggingConfig};
use insightdeck::store::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match std::env::var("INSIGHTDECK_CONFIG") {
        Ok(path) => Config::load_with_env(Path::new(&path))?,
        Err(_) => Config::load_default(),
    };

    init_tracing(&config.logging)?;

    tracing::info!("Starting InsightDeck API server v{}", env!("CARGO_PKG_VERSION"));

    let store = match &config.store.data_file {
        Some(file) => {
            let path = Path::new(file);
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                std::fs::create_dir_all(dir)
                    .with_context(|| format!("creating data directory {:?}", dir))?;
            }
            tracing::info!("Data file: {:?}", path);
            Arc::new(MemoryStore::open(path)?)
        }
        None => {
            tracing::info!("No data file configured, tables are kept in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let persist_handle = store
        .path()
        .is_some()
        .then(|| store.start_background_persist(config.store.persist_interval()));

    let api_config = config.api.api_config();
    let state = AppState::new(Arc::clone(&store), api_config.clone());

    tracing::info!("Starting server on {}:{}", api_config.host, api_config.port);
    serve(state, &api_config).await?;

    if let Some(handle) = persist_handle {
        handle.abort();
    }
    tracing::info!("Persisting tables...");
    store.persist().await?;
    tracing::info!("InsightDeck API server stopped");

    Ok(())
}

/// Install the subscriber: pretty or JSON lines, to stderr or `logging.file`
fn init_tracing(logging: &LoggingConfig) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("insightdeck={},tower_http=debug", logging.level).into());

    let writer = match &logging.file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("opening log file {:?}", path))?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let fmt_layer = if logging.format == "json" {
        tracing_subscriber::fmt::layer()
            .json()
            .with_writer(writer)
            .boxed()
    } else {
        tracing_subscriber::fmt::layer().with_writer(writer).boxed()
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();

    Ok(())
}
