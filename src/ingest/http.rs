//! HTTP object store
//!
//! Archive access over plain HTTP: object facts come from a HEAD request,
//! the metadata document from a GET of a sidecar object next to the file
//! (`<url> + ".meta.json"`). Works against any HTTP-fronted object store
//! that serves `Content-Length` and `Last-Modified`.

use crate::ingest::{IngestError, IngestResult, ObjectInfo, ObjectStore};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{Client, StatusCode};

/// Suffix of the metadata sidecar object
pub const METADATA_SUFFIX: &str = ".meta.json";

/// Configuration for the HTTP object store
#[derive(Debug, Clone)]
pub struct HttpObjectStoreConfig {
    /// Request timeout in milliseconds
    pub request_timeout_ms: u64,
}

impl Default for HttpObjectStoreConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 10_000,
        }
    }
}

/// [`ObjectStore`] backed by HTTP HEAD/GET requests
pub struct HttpObjectStore {
    client: Client,
}

impl HttpObjectStore {
    pub fn new(config: HttpObjectStoreConfig) -> IngestResult<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_millis(config.request_timeout_ms))
            .build()
            .map_err(|e| IngestError::ObjectStore(format!("http client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    async fn describe(&self, url: &str) -> IngestResult<ObjectInfo> {
        let head = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| IngestError::ObjectStore(e.to_string()))?;
        if head.status() == StatusCode::NOT_FOUND {
            return Err(IngestError::NotFound(url.to_string()));
        }
        if !head.status().is_success() {
            return Err(IngestError::ObjectStore(format!(
                "HEAD {} returned {}",
                url,
                head.status()
            )));
        }

        let size = head
            .headers()
            .get(reqwest::header::CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let created_ms = head
            .headers()
            .get(reqwest::header::LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_http_date)
            .unwrap_or_else(|| chrono::Utc::now().timestamp_millis());

        // The sidecar is part of the object's contract; a file without one
        // cannot be indexed and the store is considered to not have it.
        let sidecar_url = format!("{}{}", url, METADATA_SUFFIX);
        let sidecar = self
            .client
            .get(&sidecar_url)
            .send()
            .await
            .map_err(|e| IngestError::ObjectStore(e.to_string()))?;
        if sidecar.status() == StatusCode::NOT_FOUND {
            return Err(IngestError::NotFound(sidecar_url));
        }
        if !sidecar.status().is_success() {
            return Err(IngestError::ObjectStore(format!(
                "GET {} returned {}",
                sidecar_url,
                sidecar.status()
            )));
        }
        let metadata: serde_json::Value = sidecar
            .json()
            .await
            .map_err(|e| IngestError::ObjectStore(e.to_string()))?;

        Ok(ObjectInfo {
            size,
            created_ms,
            metadata,
        })
    }
}

fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_http_date() {
        let ms = parse_http_date("Wed, 21 Oct 2015 07:28:00 GMT").unwrap();
        assert_eq!(ms, 1_445_412_480_000);
        assert!(parse_http_date("yesterday").is_none());
    }
}
