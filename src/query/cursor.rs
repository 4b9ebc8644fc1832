//! Pagination cursors
//!
//! A cursor is an opaque token telling a paginated query where to resume.
//! On the wire it is URL-safe base64 (padding stripped) of a small JSON
//! object, so clients can embed it in a query string and hand it back
//! verbatim. Two shapes exist: work-id queries only need the store's
//! continuation key, while time-range queries also track which bucket the
//! previous page stopped in.

use crate::query::error::QueryError;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

/// Opaque pagination token
///
/// The untagged representation keeps the wire format minimal: a time cursor
/// is any object carrying `current_time_bucket`, everything else is a
/// work-id cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cursor {
    /// Resume point for a time-range query
    Time {
        /// Bucket the previous page stopped in
        current_time_bucket: i64,
        /// Store continuation key, set when that bucket was not drained
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_evaluated: Option<String>,
        /// Sort key of the last delivered item, set when the page hit the
        /// soft size limit at a bucket boundary
        #[serde(default, skip_serializing_if = "Option::is_none")]
        last_range_key: Option<String>,
    },
    /// Resume point for a work-id query
    WorkId {
        /// Store continuation key from the previous page
        last_evaluated: String,
    },
}

impl Cursor {
    /// Serialize to the wire form: unpadded URL-safe base64 of JSON.
    pub fn encode(&self) -> String {
        // Serialization of these shapes cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Parse a wire-form cursor. Any padding a client preserved is
    /// tolerated; anything that does not decode to a known shape is
    /// [`QueryError::InvalidCursor`].
    pub fn decode(token: &str) -> Result<Self, QueryError> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim_end_matches('='))
            .map_err(|e| QueryError::InvalidCursor(e.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|e| QueryError::InvalidCursor(e.to_string()))
    }
}
