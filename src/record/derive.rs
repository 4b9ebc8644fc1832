//! Index record derivation
//!
//! The object store behind this system answers point lookups only, so each
//! archived file is denormalized into one index record per day-long time
//! bucket its `[start, end]` interval touches. The keys are built so that a
//! single-partition range scan answers the common questions:
//!
//! ```text
//! time_index_key    = "<bucket>:<what>"              (primary partition)
//! range_key         = "<where>:<id>"                 (sort key, both indexes)
//! work_id_index_key = "<work_id or null+id>:<what>"  (secondary partition)
//! ```
//!
//! Derivation is pure: the same metadata always yields the same records,
//! which is what makes at-least-once re-ingestion safe.

use crate::record::metadata::{Metadata, MetadataError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Width of one time bucket: one day in milliseconds.
pub const DAY_MS: i64 = 86_400_000;

/// Maximum bucket span (`last - first`) a single file may cover.
///
/// Each spanned bucket duplicates the record, so this bounds write
/// amplification for a single ingested file.
pub const MAX_BUCKET_SPAN: i64 = 30;

/// Errors raised while deriving index records
#[derive(Error, Debug)]
pub enum DeriveError {
    /// The file spans more time buckets than the fan-out guard allows
    #[error("Unsupported time range: file spans {span} buckets (limit {MAX_BUCKET_SPAN})")]
    UnsupportedTimeRange { span: i64 },

    /// The raw metadata document failed validation
    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// One denormalized index entry for an archived file
///
/// A file produces one of these per bucket it spans; all of them embed the
/// same metadata and differ only in `time_index_key`. Never mutated after
/// derivation; re-deriving the same file yields equal records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexRecord {
    /// Primary partition key: `<bucket>:<what>`
    pub time_index_key: String,
    /// Sort key on both indexes: `<where>:<id>`
    pub range_key: String,
    /// Secondary-index partition key: `<work_id or null+id>:<what>`
    pub work_id_index_key: String,
    /// Object-store URL of the archived file
    pub url: String,
    /// Epoch-ms creation time of the underlying object
    pub create_time: i64,
    /// Byte length of the underlying object
    pub size: u64,
    /// The full embedded metadata
    pub metadata: Metadata,
}

impl IndexRecord {
    /// Key for the latest-record side index: `<what>:<where>`.
    pub fn latest_key(&self) -> String {
        format!("{}:{}", self.metadata.what, self.metadata.where_)
    }
}

/// Compute the contiguous ascending list of buckets touched by
/// `[start, end]`.
pub fn get_time_buckets(start: i64, end: i64, bucket_ms: i64) -> Vec<i64> {
    let first = start.div_euclid(bucket_ms);
    let last = end.div_euclid(bucket_ms);
    (first..=last).collect()
}

/// Bucket containing a single timestamp.
pub fn bucket_of(ts: i64, bucket_ms: i64) -> i64 {
    ts.div_euclid(bucket_ms)
}

/// Derive the index records for one archived file.
///
/// Pure and deterministic given validated metadata. Produces one record per
/// bucket in `[start, end]` (a null `end` is treated as `end = start`), and
/// fails with [`DeriveError::UnsupportedTimeRange`] when the bucket span
/// exceeds [`MAX_BUCKET_SPAN`].
pub fn derive_records(
    url: &str,
    metadata: &Metadata,
    size: u64,
    create_time: i64,
    bucket_ms: i64,
) -> Result<Vec<IndexRecord>, DeriveError> {
    let first = bucket_of(metadata.start, bucket_ms);
    let last = bucket_of(metadata.effective_end(), bucket_ms);
    let span = last - first;
    if span > MAX_BUCKET_SPAN {
        return Err(DeriveError::UnsupportedTimeRange { span });
    }

    let range_key = format!("{}:{}", metadata.where_, metadata.id);
    // A missing work_id still gets a partition key; folding the file's own
    // id in keeps unrelated work-less files off a single hot partition.
    let work_id_index_key = match &metadata.work_id {
        Some(work_id) => format!("{}:{}", work_id, metadata.what),
        None => format!("null{}:{}", metadata.id, metadata.what),
    };

    Ok((first..=last)
        .map(|bucket| IndexRecord {
            time_index_key: format!("{}:{}", bucket, metadata.what),
            range_key: range_key.clone(),
            work_id_index_key: work_id_index_key.clone(),
            url: url.to_string(),
            create_time,
            size,
            metadata: metadata.clone(),
        })
        .collect())
}

/// Derive records straight from a raw metadata document, validating it
/// first.
pub fn derive_from_value(
    url: &str,
    raw: &Value,
    size: u64,
    create_time: i64,
    bucket_ms: i64,
) -> Result<Vec<IndexRecord>, DeriveError> {
    let metadata = Metadata::from_value(raw)?;
    derive_records(url, &metadata, size, create_time, bucket_ms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(start: i64, end: Option<i64>) -> Metadata {
        let doc = json!({
            "id": "f-001",
            "version": 0,
            "what": "syslog",
            "where": "host-a",
            "work_id": "job0",
            "start": start,
            "end": end,
            "hash": "abc123",
            "data_version": "1.0",
            "path": "/var/log/syslog"
        });
        Metadata::from_value(&doc).unwrap()
    }

    #[test]
    fn test_bucket_sequence() {
        // Scaled buckets: B = 1000 for readable arithmetic.
        let b = 1000;
        assert_eq!(get_time_buckets(4 * b / 5, 11 * b / 5, b), vec![0, 1, 2]);
        assert_eq!(get_time_buckets(0, 0, b), vec![0]);
        assert_eq!(get_time_buckets(999, 1000, b), vec![0, 1]);
    }

    #[test]
    fn test_bucket_sequence_is_contiguous() {
        let b = 1000;
        for (start, end) in [(0, 0), (1, 9999), (500, 30_500), (2999, 3000)] {
            let buckets = get_time_buckets(start, end, b);
            let expected_len = (end.div_euclid(b) - start.div_euclid(b) + 1) as usize;
            assert_eq!(buckets.len(), expected_len);
            for w in buckets.windows(2) {
                assert_eq!(w[1], w[0] + 1);
            }
        }
    }

    #[test]
    fn test_one_record_per_bucket() {
        let b = 1000;
        let m = meta(800, Some(2200));
        let records = derive_records("stow://b/f", &m, 42, 5, b).unwrap();
        assert_eq!(records.len(), 3);
        let keys: Vec<&str> = records.iter().map(|r| r.time_index_key.as_str()).collect();
        assert_eq!(keys, vec!["0:syslog", "1:syslog", "2:syslog"]);
        for r in &records {
            assert_eq!(r.range_key, "host-a:f-001");
            assert_eq!(r.work_id_index_key, "job0:syslog");
            assert_eq!(r.url, "stow://b/f");
            assert_eq!(r.size, 42);
            assert_eq!(r.create_time, 5);
        }
    }

    #[test]
    fn test_null_end_occupies_one_bucket() {
        let b = 1000;
        let m = meta(2500, None);
        let records = derive_records("stow://b/f", &m, 1, 0, b).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time_index_key, "2:syslog");
    }

    #[test]
    fn test_span_guard() {
        let b = 1000;
        // Span of exactly MAX_BUCKET_SPAN succeeds.
        let m = meta(0, Some(MAX_BUCKET_SPAN * b));
        let records = derive_records("stow://b/f", &m, 1, 0, b).unwrap();
        assert_eq!(records.len(), (MAX_BUCKET_SPAN + 1) as usize);

        // One bucket further fails.
        let m = meta(0, Some((MAX_BUCKET_SPAN + 1) * b));
        let err = derive_records("stow://b/f", &m, 1, 0, b).unwrap_err();
        assert!(matches!(
            err,
            DeriveError::UnsupportedTimeRange { span } if span == MAX_BUCKET_SPAN + 1
        ));
    }

    #[test]
    fn test_null_work_id_key_uses_file_id() {
        let doc = json!({
            "id": "f-002",
            "version": 0,
            "what": "syslog",
            "where": "host-a",
            "start": 100,
            "hash": "abc123",
            "data_version": "1.0",
            "path": "/var/log/syslog"
        });
        let records = derive_from_value("stow://b/f2", &doc, 1, 0, 1000).unwrap();
        assert_eq!(records[0].work_id_index_key, "nullf-002:syslog");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let m = meta(800, Some(2200));
        let a = derive_records("stow://b/f", &m, 42, 5, 1000).unwrap();
        let b = derive_records("stow://b/f", &m, 42, 5, 1000).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_derive_from_value_propagates_metadata_errors() {
        let doc = json!({"version": 3});
        let err = derive_from_value("stow://b/f", &doc, 1, 0, 1000).unwrap_err();
        assert!(matches!(
            err,
            DeriveError::Metadata(MetadataError::UnsupportedVersion(3))
        ));
    }
}
