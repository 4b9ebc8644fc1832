//! Ingestion
//!
//! This module turns object-store notifications into index writes:
//! - Notification envelope parsing and event classification
//! - Collaborator traits for the object store, notification queue, and
//!   report sink
//! - The pipeline driving describe -> derive -> write -> report -> delete
//!
//! Errors split into two classes. Safe errors (a malformed envelope, an
//! unsupported event version, bad metadata, an over-long time range) are
//! tied to one message and cannot succeed on retry; the pipeline reports
//! them and moves on. Everything else is treated as an operational fault
//! and stops the consumer so the message stays on the queue.

mod http;
mod local_queue;
mod pipeline;
mod report;

pub use http::{HttpObjectStore, HttpObjectStoreConfig};
pub use local_queue::LocalQueue;
pub use pipeline::IngestionPipeline;
pub use report::{AffectedFile, IngestionReport, LogReportSink, ReportStatus};

use crate::record::{DeriveError, MetadataError};
use crate::store::StoreError;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Major version of the notification event schema this consumer accepts
pub const SUPPORTED_EVENT_MAJOR: &str = "2";

/// Errors that can occur during ingestion
#[derive(Debug, Error)]
pub enum IngestError {
    /// Notification body is not a valid envelope
    #[error("Malformed notification: {0}")]
    MalformedNotification(String),

    /// Event schema version this consumer does not speak
    #[error("Unsupported event version: {0}")]
    UnsupportedEventVersion(String),

    /// Object metadata failed validation
    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    /// Index record derivation failed
    #[error("Derive error: {0}")]
    Derive(DeriveError),

    /// Object named by a notification does not exist
    #[error("Object not found: {0}")]
    NotFound(String),

    /// Object store request failed
    #[error("Object store error: {0}")]
    ObjectStore(String),

    /// Index store write failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Queue operation failed
    #[error("Queue error: {0}")]
    Queue(String),

    /// Report could not be published
    #[error("Report error: {0}")]
    Report(String),
}

impl From<DeriveError> for IngestError {
    fn from(e: DeriveError) -> Self {
        match e {
            DeriveError::Metadata(m) => IngestError::Metadata(m),
            other => IngestError::Derive(other),
        }
    }
}

impl IngestError {
    /// Whether this error is scoped to one message and safe to report and
    /// skip. A missing object is deliberately NOT safe: the notification
    /// claims the object exists, so either the store is unhealthy or the
    /// index would silently lose a file.
    pub fn is_safe(&self) -> bool {
        matches!(
            self,
            IngestError::MalformedNotification(_)
                | IngestError::UnsupportedEventVersion(_)
                | IngestError::Metadata(_)
                | IngestError::Derive(_)
        )
    }
}

/// Result type for ingestion operations
pub type IngestResult<T> = Result<T, IngestError>;

/// What the object store knows about one archived file
#[derive(Debug, Clone)]
pub struct ObjectInfo {
    /// Object size in bytes
    pub size: u64,
    /// Object creation time, epoch millis
    pub created_ms: i64,
    /// The metadata document attached to the object
    pub metadata: serde_json::Value,
}

/// Read-side view of the archive holding the indexed files
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Size, creation time and metadata for the object at `url`.
    /// A nonexistent object is [`IngestError::NotFound`].
    async fn describe(&self, url: &str) -> IngestResult<ObjectInfo>;
}

/// One message as pulled off the notification queue
#[derive(Debug, Clone)]
pub struct QueueMessage {
    /// Queue-assigned id, used for the delete acknowledgement
    pub id: String,
    /// Raw notification body
    pub body: String,
}

/// Source of object-store notifications
#[async_trait]
pub trait NotificationQueue: Send + Sync {
    /// Wait up to `wait` for messages; an empty batch means the wait
    /// elapsed with nothing to deliver.
    async fn receive(&self, max: usize, wait: Duration) -> IngestResult<Vec<QueueMessage>>;

    /// Acknowledge a message so it is never redelivered. Called strictly
    /// after the message's index writes have succeeded.
    async fn delete(&self, message_id: &str) -> IngestResult<()>;
}

/// Destination for per-message ingestion reports
#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn publish(&self, report: &IngestionReport) -> IngestResult<()>;
}

/// Notification envelope: a batch of object events
#[derive(Debug, Deserialize)]
pub struct Notification {
    pub records: Vec<EventRecord>,
}

/// One object event inside a notification
#[derive(Debug, Clone, Deserialize)]
pub struct EventRecord {
    /// Event schema version, `major.minor`
    pub event_version: String,
    /// Event kind, e.g. `created:put` or `created:copy`
    pub event_name: String,
    /// Full URL of the affected object
    pub url: String,
}

/// How an event's index records should be written
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// First sight of an object: idempotent, never clobbers
    Put,
    /// Object replaced in place: clobbers existing records
    Overwrite,
}

impl WriteKind {
    /// Classify an event, checking its schema version first.
    ///
    /// Events that are not object creations (deletions, lifecycle noise)
    /// come back as `None` and are skipped per record, not failed.
    pub fn from_event(event: &EventRecord) -> IngestResult<Option<Self>> {
        let major = event.event_version.split('.').next().unwrap_or("");
        if major != SUPPORTED_EVENT_MAJOR {
            return Err(IngestError::UnsupportedEventVersion(
                event.event_version.clone(),
            ));
        }
        match event.event_name.rsplit(':').next() {
            Some("copy") => Ok(Some(WriteKind::Overwrite)),
            Some("put") | Some("post") | Some("multipart") => Ok(Some(WriteKind::Put)),
            _ => Ok(None),
        }
    }
}

/// Parse a raw queue message body into a notification envelope.
pub fn parse_notification(body: &str) -> IngestResult<Notification> {
    serde_json::from_str(body).map_err(|e| IngestError::MalformedNotification(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(version: &str, name: &str) -> EventRecord {
        EventRecord {
            event_version: version.to_string(),
            event_name: name.to_string(),
            url: "stow://bucket/f-001".to_string(),
        }
    }

    #[test]
    fn test_parse_notification() {
        let body = r#"{"records":[
            {"event_version":"2.1","event_name":"created:put","url":"stow://b/x"},
            {"event_version":"2.1","event_name":"created:copy","url":"stow://b/y"}
        ]}"#;
        let n = parse_notification(body).unwrap();
        assert_eq!(n.records.len(), 2);
        assert_eq!(n.records[1].url, "stow://b/y");
    }

    #[test]
    fn test_malformed_body_is_safe_error() {
        let err = parse_notification("not json").unwrap_err();
        assert!(matches!(err, IngestError::MalformedNotification(_)));
        assert!(err.is_safe());

        // Valid JSON, wrong shape.
        let err = parse_notification(r#"{"events":[]}"#).unwrap_err();
        assert!(err.is_safe());
    }

    #[test]
    fn test_event_classification() {
        assert_eq!(
            WriteKind::from_event(&event("2.0", "created:put")).unwrap(),
            Some(WriteKind::Put)
        );
        assert_eq!(
            WriteKind::from_event(&event("2.3", "created:multipart")).unwrap(),
            Some(WriteKind::Put)
        );
        assert_eq!(
            WriteKind::from_event(&event("2.0", "created:copy")).unwrap(),
            Some(WriteKind::Overwrite)
        );
    }

    #[test]
    fn test_unsupported_version_rejected() {
        let err = WriteKind::from_event(&event("1.9", "created:put")).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedEventVersion(_)));
        assert!(err.is_safe());

        // Version is checked before the event name.
        let err = WriteKind::from_event(&event("3.0", "garbage")).unwrap_err();
        assert!(matches!(err, IngestError::UnsupportedEventVersion(_)));
    }

    #[test]
    fn test_non_creation_event_skipped() {
        assert_eq!(
            WriteKind::from_event(&event("2.0", "removed:delete")).unwrap(),
            None
        );
    }

    #[test]
    fn test_fatal_errors_are_not_safe() {
        assert!(!IngestError::NotFound("stow://b/gone".to_string()).is_safe());
        assert!(!IngestError::ObjectStore("timeout".to_string()).is_safe());
        assert!(!IngestError::Queue("receive failed".to_string()).is_safe());
    }
}
