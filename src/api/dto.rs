//! Data Transfer Objects
//!
//! Request and response types for the API endpoints.
//! These types are serialized/deserialized to/from JSON.

use crate::record::{IndexRecord, Metadata};
use serde::{Deserialize, Serialize};

/// One indexed file as returned by the query endpoints
#[derive(Debug, Clone, Serialize)]
pub struct RecordDto {
    /// Full URL of the archived file
    pub url: String,
    /// File size in bytes
    pub size: u64,
    /// Archive creation time, epoch millis
    pub create_time: i64,
    /// The file's metadata document
    pub metadata: Metadata,
}

impl From<IndexRecord> for RecordDto {
    fn from(record: IndexRecord) -> Self {
        Self {
            url: record.url,
            size: record.size,
            create_time: record.create_time,
            metadata: record.metadata,
        }
    }
}

/// One page of query results
#[derive(Debug, Serialize)]
pub struct RecordPageResponse {
    pub records: Vec<RecordDto>,
    /// Opaque token for the next page; absent on the terminal page
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

/// Query string for GET /api/v1/records/time
#[derive(Debug, Deserialize)]
pub struct TimeQueryParams {
    /// Range start, epoch millis inclusive
    pub start: i64,
    /// Range end, epoch millis inclusive
    pub end: i64,
    pub what: String,
    #[serde(rename = "where")]
    pub where_: Option<String>,
    pub cursor: Option<String>,
}

/// Query string for GET /api/v1/records/work/:work_id
#[derive(Debug, Deserialize)]
pub struct WorkQueryParams {
    pub what: String,
    #[serde(rename = "where")]
    pub where_: Option<String>,
    pub cursor: Option<String>,
}

/// Query string for GET /api/v1/records/latest
#[derive(Debug, Deserialize)]
pub struct LatestQueryParams {
    pub what: String,
    #[serde(rename = "where")]
    pub where_: String,
    /// Lookback window in buckets; server default when absent
    pub lookback: Option<String>,
}

/// Response for POST /api/v1/notify
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    /// Queue-assigned id of the accepted notification
    pub message_id: String,
}
