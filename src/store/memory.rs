//! In-memory index store
//!
//! A `BTreeMap`-backed implementation of [`IndexStore`] with the same scan
//! semantics as the SQLite backend. Used by engine tests and embedders that
//! do not need persistence.

use crate::record::IndexRecord;
use crate::store::error::{StoreError, StoreResult};
use crate::store::{IndexSelect, IndexStore, ScanPage, ScanParams};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

#[derive(Default)]
struct Inner {
    /// (time_key, range_key) -> record; BTreeMap keeps sort-key order
    records: BTreeMap<(String, String), IndexRecord>,
    /// latest_key -> record
    latest: HashMap<String, IndexRecord>,
}

/// In-memory implementation of [`IndexStore`]
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of index records (tests).
    pub fn count_records(&self) -> usize {
        self.inner
            .lock()
            .map(|inner| inner.records.len())
            .unwrap_or(0)
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn put(&self, record: &IndexRecord) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let key = (record.time_index_key.clone(), record.range_key.clone());
        inner.records.entry(key).or_insert_with(|| record.clone());
        Ok(())
    }

    async fn overwrite(&self, record: &IndexRecord) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let key = (record.time_index_key.clone(), record.range_key.clone());
        inner.records.insert(key, record.clone());
        Ok(())
    }

    async fn scan_partition(
        &self,
        partition_key: &str,
        index: IndexSelect,
        params: &ScanParams,
    ) -> StoreResult<ScanPage> {
        let inner = self.lock()?;

        // Gather the partition's records in range_key order. The primary
        // index comes straight off the BTreeMap ordering; the work-id index
        // is re-sorted from a filtered pass.
        let mut partition: Vec<&IndexRecord> = match index {
            IndexSelect::Primary => inner
                .records
                .range(
                    (partition_key.to_string(), String::new())
                        ..(format!("{}\u{0}", partition_key), String::new()),
                )
                .map(|(_, r)| r)
                .collect(),
            IndexSelect::WorkId => {
                let mut found: Vec<&IndexRecord> = inner
                    .records
                    .values()
                    .filter(|r| r.work_id_index_key == partition_key)
                    .collect();
                found.sort_by(|a, b| a.range_key.cmp(&b.range_key));
                found
            }
        };
        partition.retain(|r| {
            if let Some(prefix) = &params.range_key_prefix {
                if !r.range_key.starts_with(prefix.as_str()) {
                    return false;
                }
            }
            if let Some(start) = &params.exclusive_start {
                if r.range_key.as_str() <= start.as_str() {
                    return false;
                }
            }
            params.exclude_range_key.as_deref() != Some(r.range_key.as_str())
        });

        let more = partition.len() > params.limit;
        let items: Vec<IndexRecord> = partition
            .into_iter()
            .take(params.limit)
            .cloned()
            .collect();
        let continuation = if more {
            items.last().map(|r| r.range_key.clone())
        } else {
            None
        };

        Ok(ScanPage {
            items,
            continuation,
        })
    }

    async fn store_latest(&self, record: &IndexRecord) -> StoreResult<()> {
        let mut inner = self.lock()?;
        let key = record.latest_key();
        let newer = match inner.latest.get(&key) {
            Some(current) => {
                (record.metadata.start, record.create_time)
                    > (current.metadata.start, current.create_time)
            }
            None => true,
        };
        if newer {
            inner.latest.insert(key, record.clone());
        }
        Ok(())
    }

    async fn fetch_latest(&self, what: &str, where_: &str) -> StoreResult<Option<IndexRecord>> {
        let inner = self.lock()?;
        Ok(inner.latest.get(&format!("{}:{}", what, where_)).cloned())
    }
}
