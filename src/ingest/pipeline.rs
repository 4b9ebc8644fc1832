//! Ingestion pipeline
//!
//! The consumer loop: receive a batch of notifications, and for every
//! event describe the object, validate its metadata, derive index records,
//! and write them. Put-class events use idempotent writes so redelivered
//! notifications are harmless; copy-class events overwrite, so a file
//! replaced in the archive refreshes its index entries. Each message ends
//! with a report and, only after its writes succeeded, a queue delete.

use crate::ingest::{
    parse_notification, IngestError, IngestResult, IngestionReport, NotificationQueue,
    ObjectStore, QueueMessage, ReportSink, WriteKind,
};
use crate::record::{derive_records, Metadata, DAY_MS};
use crate::store::IndexStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Notification consumer wired to an object store and an index store
pub struct IngestionPipeline {
    object_store: Arc<dyn ObjectStore>,
    index_store: Arc<dyn IndexStore>,
    report_sink: Option<Arc<dyn ReportSink>>,
    bucket_ms: i64,
}

impl IngestionPipeline {
    pub fn new(object_store: Arc<dyn ObjectStore>, index_store: Arc<dyn IndexStore>) -> Self {
        Self {
            object_store,
            index_store,
            report_sink: None,
            bucket_ms: DAY_MS,
        }
    }

    pub fn with_report_sink(mut self, sink: Arc<dyn ReportSink>) -> Self {
        self.report_sink = Some(sink);
        self
    }

    pub fn with_bucket_ms(mut self, bucket_ms: i64) -> Self {
        self.bucket_ms = bucket_ms;
        self
    }

    /// Consume messages until a fatal error, or until `idle_timeout`
    /// passes without a delivery (when set).
    pub async fn run(
        &self,
        queue: Arc<dyn NotificationQueue>,
        batch_size: usize,
        wait: Duration,
        idle_timeout: Option<Duration>,
    ) -> IngestResult<()> {
        let mut idle_since = Instant::now();
        loop {
            let batch = queue.receive(batch_size, wait).await?;
            if batch.is_empty() {
                if let Some(limit) = idle_timeout {
                    if idle_since.elapsed() >= limit {
                        tracing::info!("ingestion consumer idle, stopping");
                        return Ok(());
                    }
                }
                continue;
            }
            idle_since = Instant::now();

            for msg in batch {
                let report = self.handle_message(&msg).await?;
                if let Some(sink) = &self.report_sink {
                    sink.publish(&report).await?;
                }
                // The message is consumed only once its outcome is
                // durable. A fatal error above leaves it on the queue.
                queue.delete(&msg.id).await?;
            }
        }
    }

    /// Process one message into a report.
    ///
    /// Message-scoped failures (bad envelope, bad metadata, over-long
    /// range) come back as an error report; anything else is an `Err` and
    /// must stop the consumer.
    pub async fn handle_message(&self, msg: &QueueMessage) -> IngestResult<IngestionReport> {
        let mut report = IngestionReport::begin(&msg.id);
        match self.apply(msg, &mut report).await {
            Ok(()) => Ok(report.finish_success()),
            Err(e) if e.is_safe() => {
                tracing::warn!(message_id = %msg.id, error = %e, "skipping message");
                Ok(report.finish_error(e.to_string()))
            }
            Err(e) => Err(e),
        }
    }

    async fn apply(&self, msg: &QueueMessage, report: &mut IngestionReport) -> IngestResult<()> {
        let notification = parse_notification(&msg.body)?;
        for event in &notification.records {
            let Some(kind) = WriteKind::from_event(event)? else {
                tracing::debug!(event = %event.event_name, url = %event.url, "skipping non-creation event");
                continue;
            };
            let written = self.process_object(&event.url, kind).await?;
            report.record_file(&event.url, written);
        }
        Ok(())
    }

    /// Index one object: describe, validate, derive, write.
    pub async fn process_object(&self, url: &str, kind: WriteKind) -> IngestResult<usize> {
        let info = self.object_store.describe(url).await?;
        let metadata = Metadata::from_value(&info.metadata)?;
        let records = derive_records(url, &metadata, info.size, info.created_ms, self.bucket_ms)?;

        for record in &records {
            match kind {
                WriteKind::Put => self.index_store.put(record).await?,
                WriteKind::Overwrite => self.index_store.overwrite(record).await?,
            }
        }
        // The fan-out shares one metadata document, so any one record can
        // carry the latest-pointer update.
        if let Some(first) = records.first() {
            self.index_store.store_latest(first).await?;
        }

        tracing::debug!(url = %url, records = records.len(), ?kind, "indexed object");
        Ok(records.len())
    }
}
