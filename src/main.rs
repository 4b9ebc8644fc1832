//! Stowage Server
//!
//! Runs the query API and, unless disabled, the in-process notification
//! consumer.
//!
//! # Configuration
//!
//! Loaded from a TOML file (see `--config`) with environment overrides:
//! - `STOWAGE_DB_PATH`: SQLite index database path
//! - `STOWAGE_API_HOST` / `STOWAGE_API_PORT`: listen address
//! - `STOWAGE_INGEST_ENABLED`: run the consumer (default: true)
//! - `STOWAGE_LOG_LEVEL` / `STOWAGE_LOG_FORMAT`: logging
//! - `RUST_LOG`: overrides the log level filter entirely

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use stowage::api::{serve, ApiConfig, AppState};
use stowage::config::Config;
use stowage::ingest::{
    HttpObjectStore, HttpObjectStoreConfig, IngestionPipeline, LocalQueue, LogReportSink,
};
use stowage::query::QueryEngine;
use stowage::store::SqliteStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

#[derive(Parser, Debug)]
#[command(name = "stowage", version, about = "Archived-file index server")]
struct Args {
    /// Path to a TOML config file; default locations are tried when absent
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serve queries only, without the ingestion consumer
    #[arg(long)]
    no_ingest: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load_with_env(path)?,
        None => Config::load_default(),
    };

    init_tracing(&config);

    tracing::info!("Starting Stowage v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Index database: {}", config.store.db_path);

    let db_path = PathBuf::from(&config.store.db_path);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = Arc::new(SqliteStore::open(&db_path)?);
    let engine = Arc::new(QueryEngine::new(store.clone()));

    let api_config = ApiConfig {
        host: config.api.host.clone(),
        port: config.api.port,
        request_timeout_ms: config.api.request_timeout_secs * 1000,
    };

    let ingest_enabled = config.ingest.enabled && !args.no_ingest;
    let (state, consumer) = if ingest_enabled {
        let queue = Arc::new(LocalQueue::new());
        let object_store = Arc::new(HttpObjectStore::new(HttpObjectStoreConfig {
            request_timeout_ms: config.ingest.object_store_timeout_ms,
        })?);
        let pipeline = IngestionPipeline::new(object_store, store.clone())
            .with_report_sink(Arc::new(LogReportSink));

        let consumer_queue = queue.clone();
        let batch_size = config.ingest.batch_size;
        let wait = Duration::from_secs(config.ingest.queue_wait_secs);
        let handle = tokio::spawn(async move {
            if let Err(e) = pipeline.run(consumer_queue, batch_size, wait, None).await {
                tracing::error!("ingestion consumer stopped: {}", e);
            }
        });

        tracing::info!("Ingestion consumer started");
        (
            AppState::with_queue(engine, queue, api_config.clone()),
            Some(handle),
        )
    } else {
        tracing::info!("Ingestion disabled, serving queries only");
        (AppState::new(engine, api_config.clone()), None)
    };

    serve(state, &api_config).await?;

    if let Some(handle) = consumer {
        handle.abort();
    }
    tracing::info!("Stowage stopped");

    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!(
            "stowage={},tower_http=info",
            config.logging.level
        ))
    });

    let fmt_layer = match config.logging.format.as_str() {
        "json" => tracing_subscriber::fmt::layer().json().boxed(),
        _ => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}
