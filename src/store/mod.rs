//! Index store: a partitioned key-value abstraction
//!
//! The backing store is primitive by design: records are addressed by a
//! partition key and an ordered sort key, either through the primary index
//! (`time_index_key`, `range_key`) or the work-id secondary index
//! (`work_id_index_key`, `range_key`). Everything the query engine needs is
//! expressed as single-partition range scans.
//!
//! Writes are idempotent: [`IndexStore::put`] silently ignores a record
//! whose primary keys already exist, which is what makes at-least-once
//! redelivery safe without coordination between writers.

mod error;
mod memory;
mod sqlite;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::record::IndexRecord;
use async_trait::async_trait;

/// Which index a range scan runs against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexSelect {
    /// Primary index: partition = `time_index_key`
    Primary,
    /// Secondary index: partition = `work_id_index_key`
    WorkId,
}

/// Parameters for one single-partition range scan
#[derive(Debug, Clone)]
pub struct ScanParams {
    /// Restrict to sort keys beginning with this prefix (the `where` filter)
    pub range_key_prefix: Option<String>,
    /// Maximum number of items returned
    pub limit: usize,
    /// Resume strictly after this sort key
    pub exclusive_start: Option<String>,
    /// Drop this exact sort key from the results (boundary-duplicate
    /// suppression on cursor resume)
    pub exclude_range_key: Option<String>,
}

impl ScanParams {
    pub fn new(limit: usize) -> Self {
        Self {
            range_key_prefix: None,
            limit,
            exclusive_start: None,
            exclude_range_key: None,
        }
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.range_key_prefix = Some(prefix.into());
        self
    }

    pub fn start_after(mut self, key: impl Into<String>) -> Self {
        self.exclusive_start = Some(key.into());
        self
    }

    pub fn exclude(mut self, key: impl Into<String>) -> Self {
        self.exclude_range_key = Some(key.into());
        self
    }
}

/// One page of scan results
#[derive(Debug, Clone)]
pub struct ScanPage {
    /// Matching records in ascending sort-key order, at most `limit` of them
    pub items: Vec<IndexRecord>,
    /// Sort key of the last evaluated item when more matches remain;
    /// `None` means the partition is drained
    pub continuation: Option<String>,
}

/// The partitioned key-value store behind the index
///
/// Implementations must keep sort keys ordered within a partition and honor
/// the insert-if-absent contract of `put`.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Insert-if-absent keyed by (`time_index_key`, `range_key`).
    ///
    /// A duplicate put is silently ignored, never an error.
    async fn put(&self, record: &IndexRecord) -> StoreResult<()>;

    /// Unconditional upsert, used when a file is copied or updated in
    /// place.
    async fn overwrite(&self, record: &IndexRecord) -> StoreResult<()>;

    /// One paginated range scan over a single partition.
    async fn scan_partition(
        &self,
        partition_key: &str,
        index: IndexSelect,
        params: &ScanParams,
    ) -> StoreResult<ScanPage>;

    /// Keep, per `latest_key`, the record with the greatest
    /// `metadata.start` (ties broken by greatest `create_time`). Stale
    /// writes are silently dropped.
    ///
    /// This pointer tracks the newest record ever written with no time
    /// bound, so it cannot answer a lookback-windowed latest query; the
    /// serving path scans buckets instead and this stays a write-side
    /// summary, read back for diagnostics and store tests.
    async fn store_latest(&self, record: &IndexRecord) -> StoreResult<()>;

    /// Read back the tracked latest record for (`what`, `where`).
    async fn fetch_latest(&self, what: &str, where_: &str) -> StoreResult<Option<IndexRecord>>;
}

