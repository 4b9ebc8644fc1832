//! Ingestion reports
//!
//! Every queue message produces exactly one report: which files were
//! indexed, how many records each produced, and whether the message
//! succeeded or died of a message-scoped error.

use crate::ingest::{IngestResult, ReportSink};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Outcome of processing one queue message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Success,
    Error,
}

/// One file touched while processing a message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AffectedFile {
    pub url: String,
    /// Index records written for this file (one per bucket spanned)
    pub records_written: usize,
}

/// Report for one processed queue message
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionReport {
    pub message_id: String,
    pub status: ReportStatus,
    /// Epoch millis when processing started / finished
    pub started_at: i64,
    pub finished_at: i64,
    /// Files indexed before the message succeeded or failed
    pub files: Vec<AffectedFile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl IngestionReport {
    /// Start a report for a message; status is set at finish time.
    pub fn begin(message_id: &str) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            message_id: message_id.to_string(),
            status: ReportStatus::Error,
            started_at: now,
            finished_at: now,
            files: Vec::new(),
            error: None,
        }
    }

    /// Record one indexed file, keyed by URL: a message naming the same
    /// object twice (say a put followed by a copy) keeps a single entry
    /// carrying the most recent write's record count.
    pub fn record_file(&mut self, url: &str, records_written: usize) {
        if let Some(existing) = self.files.iter_mut().find(|f| f.url == url) {
            existing.records_written = records_written;
            return;
        }
        self.files.push(AffectedFile {
            url: url.to_string(),
            records_written,
        });
    }

    pub fn finish_success(mut self) -> Self {
        self.status = ReportStatus::Success;
        self.finished_at = chrono::Utc::now().timestamp_millis();
        self
    }

    pub fn finish_error(mut self, error: String) -> Self {
        self.status = ReportStatus::Error;
        self.error = Some(error);
        self.finished_at = chrono::Utc::now().timestamp_millis();
        self
    }
}

/// Report sink that emits reports to the log stream
#[derive(Debug, Default)]
pub struct LogReportSink;

#[async_trait]
impl ReportSink for LogReportSink {
    async fn publish(&self, report: &IngestionReport) -> IngestResult<()> {
        match report.status {
            ReportStatus::Success => tracing::info!(
                message_id = %report.message_id,
                files = report.files.len(),
                "ingestion report"
            ),
            ReportStatus::Error => tracing::warn!(
                message_id = %report.message_id,
                files = report.files.len(),
                error = report.error.as_deref().unwrap_or(""),
                "ingestion report"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_lifecycle() {
        let mut report = IngestionReport::begin("msg-1");
        report.record_file("stow://b/x", 3);
        report.record_file("stow://b/y", 1);
        let report = report.finish_success();

        assert_eq!(report.status, ReportStatus::Success);
        assert_eq!(report.files.len(), 2);
        assert!(report.error.is_none());
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn test_repeated_url_keeps_one_entry() {
        let mut report = IngestionReport::begin("msg-3");
        report.record_file("stow://b/x", 3);
        report.record_file("stow://b/y", 1);
        report.record_file("stow://b/x", 5);
        let report = report.finish_success();

        assert_eq!(report.files.len(), 2);
        assert_eq!(report.files[0].url, "stow://b/x");
        assert_eq!(report.files[0].records_written, 5);
        assert_eq!(report.files[1].url, "stow://b/y");
    }

    #[test]
    fn test_error_report_serialization() {
        let report = IngestionReport::begin("msg-2").finish_error("bad envelope".to_string());
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "bad envelope");
    }
}
