//! Application State
//!
//! Shared state accessible by all API handlers.
//! Wrapped in Arc for thread-safe sharing across async tasks.

use crate::ingest::LocalQueue;
use crate::query::QueryEngine;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state for all handlers
#[derive(Clone)]
pub struct AppState {
    /// Query engine serving the read endpoints
    pub engine: Arc<QueryEngine>,
    /// In-process notification queue, present when ingestion is enabled
    pub queue: Option<Arc<LocalQueue>>,
    /// API configuration
    pub config: Arc<ApiConfig>,
    /// Server start time for uptime tracking
    pub start_time: Instant,
}

impl AppState {
    /// Create state for a query-only node.
    pub fn new(engine: Arc<QueryEngine>, config: ApiConfig) -> Self {
        Self {
            engine,
            queue: None,
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Create state with an ingestion queue behind the notify endpoint.
    pub fn with_queue(engine: Arc<QueryEngine>, queue: Arc<LocalQueue>, config: ApiConfig) -> Self {
        Self {
            engine,
            queue: Some(queue),
            config: Arc::new(config),
            start_time: Instant::now(),
        }
    }

    /// Get server uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Whether this node accepts notifications
    pub fn has_ingest(&self) -> bool {
        self.queue.is_some()
    }
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8088,
            request_timeout_ms: 30_000,
        }
    }
}

impl ApiConfig {
    /// Create config with custom host and port
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Default::default()
        }
    }

    /// Get the socket address string
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
