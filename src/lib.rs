//! # Stowage
//!
//! A time- and work-unit-addressable index over files archived in an
//! object store. Notifications about archived files are consumed from a
//! queue, validated, fanned out into day-bucket index records, and served
//! back through paginated query APIs.
//!
//! ## Features
//!
//! - **Idempotent ingestion**: redelivered notifications never corrupt
//!   the index
//! - **Bucketed time index**: range queries touch only the day buckets
//!   they overlap
//! - **Work-unit index**: every file a job produced, one scan
//! - **Latest pointers**: constant-maintenance "most recent file" lookups
//!
//! ## Modules
//!
//! - [`record`]: Metadata validation and index record derivation
//! - [`store`]: The index store (SQLite and in-memory backends)
//! - [`query`]: Paginated time-range, work-id, and latest queries
//! - [`ingest`]: Notification consumption pipeline
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use stowage::query::QueryEngine;
//! use stowage::store::SqliteStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(SqliteStore::open("index.db")?);
//!     let engine = QueryEngine::new(store);
//!
//!     let page = engine
//!         .query_by_time(1_700_000_000_000, 1_700_086_400_000, "syslog", None, None)
//!         .await?;
//!
//!     println!("Found {} files", page.records.len());
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod ingest;
pub mod query;
pub mod record;
pub mod store;

// Re-export top-level types for convenience
pub use record::{
    derive_records, IndexRecord, Metadata, MetadataError, DAY_MS, MAX_BUCKET_SPAN,
};

pub use store::{
    IndexSelect, IndexStore, MemoryStore, ScanPage, ScanParams, SqliteStore, StoreError,
    StoreResult,
};

pub use query::{Cursor, QueryEngine, QueryError, QueryPage, QueryResult};

pub use ingest::{
    HttpObjectStore, IngestError, IngestionPipeline, IngestionReport, LocalQueue,
    NotificationQueue, ObjectStore, ReportSink,
};

pub use api::{build_router, serve, ApiError, AppState};

pub use config::{Config, ConfigError, LoggingConfig};
