//! Validated file metadata
//!
//! Every archived file carries a metadata document describing what it is,
//! where it came from, when it covers, and (optionally) which work unit
//! produced it. Producers send this document as loose JSON; this module
//! validates and normalizes it in a single pass so that everything
//! downstream (derivation, storage, queries) can rely on well-formed
//! fields.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;

/// The only metadata schema version this build understands.
pub const METADATA_VERSION: u64 = 0;

fn slug_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^[a-z0-9_-]+$").unwrap())
}

fn data_version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("^[a-z0-9_.-]+$").unwrap())
}

/// Errors raised while constructing [`Metadata`] from a raw document
#[derive(Error, Debug)]
pub enum MetadataError {
    /// A required field is missing or malformed
    #[error("Invalid metadata: {0}")]
    Invalid(String),

    /// The document declares a schema version this build does not understand
    #[error("Unsupported metadata version: {0}")]
    UnsupportedVersion(u64),
}

/// Validated, normalized description of one archived file
///
/// Immutable once constructed. Build it with [`Metadata::from_value`],
/// which performs all validation and normalization in one pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Opaque unique identifier (assigned at construction if absent)
    pub id: String,
    /// Metadata schema version
    pub version: u64,
    /// What kind of file this is (slug)
    pub what: String,
    /// Where the file was produced (slug)
    #[serde(rename = "where")]
    pub where_: String,
    /// Work unit that produced the file, if any (slug)
    #[serde(default)]
    pub work_id: Option<String>,
    /// Start of the interval the file covers, epoch milliseconds
    pub start: i64,
    /// End of the interval, epoch milliseconds; None means ongoing/unbounded
    #[serde(default)]
    pub end: Option<i64>,
    /// Content hash
    pub hash: String,
    /// Data format version (slug, dots allowed)
    pub data_version: String,
    /// Original path of the file at the producer
    pub path: String,
}

impl Metadata {
    /// Construct from a raw JSON document, validating and normalizing
    /// every field.
    ///
    /// Timestamps accept integer epoch-milliseconds, float epoch-seconds,
    /// or an RFC 3339 date string, and normalize to epoch-milliseconds.
    pub fn from_value(value: &Value) -> Result<Self, MetadataError> {
        let obj = value
            .as_object()
            .ok_or_else(|| MetadataError::Invalid("metadata is not an object".to_string()))?;

        let version = obj
            .get("version")
            .and_then(Value::as_u64)
            .ok_or_else(|| MetadataError::Invalid("missing field: version".to_string()))?;
        if version != METADATA_VERSION {
            return Err(MetadataError::UnsupportedVersion(version));
        }

        let what = required_slug(obj, "what")?;
        let where_ = required_slug(obj, "where")?;

        let work_id = match obj.get("work_id") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => {
                if s == "null" {
                    return Err(MetadataError::Invalid(
                        "work_id must not be the literal string \"null\"".to_string(),
                    ));
                }
                check_slug(s, "work_id")?;
                Some(s.clone())
            }
            Some(_) => {
                return Err(MetadataError::Invalid(
                    "work_id must be a string or null".to_string(),
                ))
            }
        };

        let start = obj
            .get("start")
            .map(|v| normalize_timestamp(v, "start"))
            .transpose()?
            .ok_or_else(|| MetadataError::Invalid("missing field: start".to_string()))?;

        let end = match obj.get("end") {
            None | Some(Value::Null) => None,
            Some(v) => Some(normalize_timestamp(v, "end")?),
        };
        if let Some(end) = end {
            if end < start {
                return Err(MetadataError::Invalid(format!(
                    "end {} precedes start {}",
                    end, start
                )));
            }
        }

        let hash = required_string(obj, "hash")?;
        let path = required_string(obj, "path")?;

        let data_version = required_string(obj, "data_version")?;
        if !data_version_re().is_match(&data_version) {
            return Err(MetadataError::Invalid(format!(
                "data_version is not a valid version slug: {:?}",
                data_version
            )));
        }

        let id = match obj.get("id") {
            None | Some(Value::Null) => uuid::Uuid::new_v4().to_string(),
            Some(Value::String(s)) if !s.is_empty() => s.clone(),
            Some(_) => return Err(MetadataError::Invalid("id must be a string".to_string())),
        };

        Ok(Self {
            id,
            version,
            what,
            where_,
            work_id,
            start,
            end,
            hash,
            data_version,
            path,
        })
    }

    /// End of the covered interval, treating an unbounded file as a point
    /// at `start`.
    pub fn effective_end(&self) -> i64 {
        self.end.unwrap_or(self.start)
    }

    /// Whether `[start, effective_end]` overlaps the closed interval
    /// `[range_start, range_end]`.
    pub fn overlaps(&self, range_start: i64, range_end: i64) -> bool {
        self.effective_end() >= range_start && self.start <= range_end
    }
}

fn required_string(
    obj: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<String, MetadataError> {
    match obj.get(key) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) => Err(MetadataError::Invalid(format!("empty field: {}", key))),
        Some(_) => Err(MetadataError::Invalid(format!(
            "field {} must be a string",
            key
        ))),
        None => Err(MetadataError::Invalid(format!("missing field: {}", key))),
    }
}

fn required_slug(
    obj: &serde_json::Map<String, Value>,
    key: &str,
) -> Result<String, MetadataError> {
    let s = required_string(obj, key)?;
    check_slug(&s, key)?;
    Ok(s)
}

fn check_slug(s: &str, key: &str) -> Result<(), MetadataError> {
    if slug_re().is_match(s) {
        Ok(())
    } else {
        Err(MetadataError::Invalid(format!(
            "field {} is not a valid slug: {:?}",
            key, s
        )))
    }
}

/// Normalize a timestamp value to epoch-milliseconds.
///
/// Integers are already epoch-ms; floats are epoch-seconds; strings are
/// parsed as RFC 3339 dates.
fn normalize_timestamp(value: &Value, field: &str) -> Result<i64, MetadataError> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(f) = n.as_f64() {
                Ok((f * 1000.0).round() as i64)
            } else {
                Err(MetadataError::Invalid(format!(
                    "field {} is not a representable timestamp",
                    field
                )))
            }
        }
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.timestamp_millis())
            .map_err(|e| {
                MetadataError::Invalid(format!("field {} is not a parseable date: {}", field, e))
            }),
        _ => Err(MetadataError::Invalid(format!(
            "field {} must be a number or date string",
            field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn base_doc() -> Value {
        json!({
            "id": "f-001",
            "version": 0,
            "what": "syslog",
            "where": "host-a",
            "work_id": "job0",
            "start": 1000,
            "end": 2000,
            "hash": "abc123",
            "data_version": "1.0",
            "path": "/var/log/syslog"
        })
    }

    #[test]
    fn test_valid_construction() {
        let meta = Metadata::from_value(&base_doc()).unwrap();
        assert_eq!(meta.id, "f-001");
        assert_eq!(meta.what, "syslog");
        assert_eq!(meta.where_, "host-a");
        assert_eq!(meta.work_id.as_deref(), Some("job0"));
        assert_eq!(meta.start, 1000);
        assert_eq!(meta.end, Some(2000));
    }

    #[test]
    fn test_id_assigned_when_absent() {
        let mut doc = base_doc();
        doc.as_object_mut().unwrap().remove("id");
        let meta = Metadata::from_value(&doc).unwrap();
        assert!(!meta.id.is_empty());

        let again = Metadata::from_value(&doc).unwrap();
        assert_ne!(meta.id, again.id);
    }

    #[test]
    fn test_missing_required_field() {
        for field in ["version", "what", "where", "start", "hash", "data_version", "path"] {
            let mut doc = base_doc();
            doc.as_object_mut().unwrap().remove(field);
            let err = Metadata::from_value(&doc).unwrap_err();
            assert!(
                matches!(err, MetadataError::Invalid(_)),
                "expected Invalid for missing {}, got {:?}",
                field,
                err
            );
        }
    }

    #[test]
    fn test_unsupported_version() {
        let mut doc = base_doc();
        doc["version"] = json!(7);
        let err = Metadata::from_value(&doc).unwrap_err();
        assert!(matches!(err, MetadataError::UnsupportedVersion(7)));
    }

    #[test]
    fn test_bad_slug_rejected() {
        let mut doc = base_doc();
        doc["what"] = json!("Sys Log!");
        assert!(matches!(
            Metadata::from_value(&doc),
            Err(MetadataError::Invalid(_))
        ));

        let mut doc = base_doc();
        doc["where"] = json!("HOST");
        assert!(matches!(
            Metadata::from_value(&doc),
            Err(MetadataError::Invalid(_))
        ));
    }

    #[test]
    fn test_work_id_literal_null_rejected() {
        let mut doc = base_doc();
        doc["work_id"] = json!("null");
        assert!(matches!(
            Metadata::from_value(&doc),
            Err(MetadataError::Invalid(_))
        ));
    }

    #[test]
    fn test_work_id_json_null_is_absent() {
        let mut doc = base_doc();
        doc["work_id"] = Value::Null;
        let meta = Metadata::from_value(&doc).unwrap();
        assert!(meta.work_id.is_none());
    }

    #[test]
    fn test_float_seconds_normalized() {
        let mut doc = base_doc();
        doc["start"] = json!(1.5);
        doc["end"] = json!(2.5);
        let meta = Metadata::from_value(&doc).unwrap();
        assert_eq!(meta.start, 1500);
        assert_eq!(meta.end, Some(2500));
    }

    #[test]
    fn test_date_string_normalized() {
        let mut doc = base_doc();
        doc["start"] = json!("1970-01-01T00:00:01Z");
        doc["end"] = Value::Null;
        let meta = Metadata::from_value(&doc).unwrap();
        assert_eq!(meta.start, 1000);
        assert_eq!(meta.end, None);
    }

    #[test]
    fn test_end_before_start_rejected() {
        let mut doc = base_doc();
        doc["start"] = json!(2000);
        doc["end"] = json!(1000);
        assert!(matches!(
            Metadata::from_value(&doc),
            Err(MetadataError::Invalid(_))
        ));
    }

    #[test]
    fn test_null_end_is_point_interval() {
        let mut doc = base_doc();
        doc["end"] = Value::Null;
        let meta = Metadata::from_value(&doc).unwrap();
        assert_eq!(meta.effective_end(), meta.start);
        assert!(meta.overlaps(500, 1500));
        assert!(!meta.overlaps(1001, 2000));
    }

    #[test]
    fn test_serde_round_trip_keeps_where_name() {
        let meta = Metadata::from_value(&base_doc()).unwrap();
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["where"], "host-a");
        let restored: Metadata = serde_json::from_value(json).unwrap();
        assert_eq!(meta, restored);
    }
}
