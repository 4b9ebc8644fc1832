//! SQLite-backed index store
//!
//! One table holds every index record as a JSON payload addressed by its
//! primary keys; a covering index on (`work_key`, `range_key`) plays the
//! role of the work-id secondary index. A second table tracks the latest
//! record per (`what`, `where`) with a conditional upsert.
//!
//! The connection runs in WAL mode behind a mutex, matching how the rest of
//! the system treats the store: short, blocking, single-statement calls.

use crate::record::IndexRecord;
use crate::store::error::{StoreError, StoreResult};
use crate::store::{IndexSelect, IndexStore, ScanPage, ScanParams};
use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// SQLite implementation of [`IndexStore`]
pub struct SqliteStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Create or open a store at `path`.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        Self::init(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Open a transient in-memory store.
    pub fn open_in_memory() -> StoreResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    fn init(conn: &Connection) -> StoreResult<()> {
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA cache_size = 10000;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS records (
                time_key TEXT NOT NULL,
                range_key TEXT NOT NULL,
                work_key TEXT NOT NULL,
                record TEXT NOT NULL,
                PRIMARY KEY (time_key, range_key)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_work ON records(work_key, range_key)",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS latest (
                latest_key TEXT PRIMARY KEY,
                start INTEGER NOT NULL,
                create_time INTEGER NOT NULL,
                record TEXT NOT NULL
            )",
            [],
        )?;

        Ok(())
    }

    /// The database file path, if file-backed.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Total number of index records (diagnostics and tests).
    pub fn count_records(&self) -> StoreResult<u64> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn write_record(&self, record: &IndexRecord, sql: &str) -> StoreResult<()> {
        let payload = serde_json::to_string(record)?;
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))?;
        conn.execute(
            sql,
            params![
                record.time_index_key,
                record.range_key,
                record.work_id_index_key,
                payload
            ],
        )?;
        Ok(())
    }
}

#[async_trait]
impl IndexStore for SqliteStore {
    async fn put(&self, record: &IndexRecord) -> StoreResult<()> {
        // OR IGNORE is the idempotency contract: a second put of the same
        // (time_key, range_key) is a no-op, not an error.
        self.write_record(
            record,
            "INSERT OR IGNORE INTO records (time_key, range_key, work_key, record)
             VALUES (?1, ?2, ?3, ?4)",
        )
    }

    async fn overwrite(&self, record: &IndexRecord) -> StoreResult<()> {
        self.write_record(
            record,
            "INSERT OR REPLACE INTO records (time_key, range_key, work_key, record)
             VALUES (?1, ?2, ?3, ?4)",
        )
    }

    async fn scan_partition(
        &self,
        partition_key: &str,
        index: IndexSelect,
        params: &ScanParams,
    ) -> StoreResult<ScanPage> {
        let partition_col = match index {
            IndexSelect::Primary => "time_key",
            IndexSelect::WorkId => "work_key",
        };

        let mut sql = format!("SELECT record FROM records WHERE {} = ?", partition_col);
        let mut args: Vec<String> = vec![partition_key.to_string()];

        if let Some(prefix) = &params.range_key_prefix {
            sql.push_str(" AND range_key >= ? AND range_key < ?");
            args.push(prefix.clone());
            args.push(format!("{}\u{10FFFF}", prefix));
        }
        if let Some(start) = &params.exclusive_start {
            sql.push_str(" AND range_key > ?");
            args.push(start.clone());
        }
        if let Some(exclude) = &params.exclude_range_key {
            sql.push_str(" AND range_key != ?");
            args.push(exclude.clone());
        }

        // Fetch one extra row to learn whether the partition is drained.
        sql.push_str(&format!(
            " ORDER BY range_key ASC LIMIT {}",
            params.limit + 1
        ));

        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))?;
        let mut stmt = conn.prepare_cached(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(args.iter()), |row| {
            row.get::<_, String>(0)
        })?;

        let mut items = Vec::with_capacity(params.limit + 1);
        for payload in rows {
            let record: IndexRecord = serde_json::from_str(&payload?)?;
            items.push(record);
        }

        let continuation = if items.len() > params.limit {
            items.truncate(params.limit);
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
        let payload = serde_json::to_string(record)?;
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))?;
        // Conditional upsert: only a strictly newer (start, create_time)
        // wins; stale writes fall through silently.
        conn.execute(
            "INSERT INTO latest (latest_key, start, create_time, record)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(latest_key) DO UPDATE SET
                 start = excluded.start,
                 create_time = excluded.create_time,
                 record = excluded.record
             WHERE excluded.start > latest.start
                OR (excluded.start = latest.start
                    AND excluded.create_time > latest.create_time)",
            params![
                record.latest_key(),
                record.metadata.start,
                record.create_time,
                payload
            ],
        )?;
        Ok(())
    }

    async fn fetch_latest(&self, what: &str, where_: &str) -> StoreResult<Option<IndexRecord>> {
        let key = format!("{}:{}", what, where_);
        let conn = self
            .conn
            .lock()
            .map_err(|e| StoreError::Backend(format!("store lock poisoned: {}", e)))?;
        let mut stmt = conn.prepare_cached("SELECT record FROM latest WHERE latest_key = ?1")?;
        let payload: Option<String> = stmt
            .query_row(params![key], |row| row.get(0))
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => Err(other),
            })?;

        match payload {
            Some(p) => Ok(Some(serde_json::from_str(&p)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{derive_records, Metadata};
    use serde_json::json;
    use tempfile::tempdir;

    fn record(id: &str, where_: &str, bucket: i64) -> IndexRecord {
        let doc = json!({
            "id": id,
            "version": 0,
            "what": "syslog",
            "where": where_,
            "work_id": "job0",
            "start": bucket * 1000 + 10,
            "hash": "h",
            "data_version": "1.0",
            "path": "/f"
        });
        let meta = Metadata::from_value(&doc).unwrap();
        derive_records(&format!("stow://b/{}", id), &meta, 7, 1, 1000)
            .unwrap()
            .remove(0)
    }

    #[tokio::test]
    async fn test_idempotent_put() {
        let store = SqliteStore::open_in_memory().unwrap();
        let r = record("f-001", "host-a", 0);

        store.put(&r).await.unwrap();
        store.put(&r).await.unwrap();

        assert_eq!(store.count_records().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_replaces() {
        let store = SqliteStore::open_in_memory().unwrap();
        let mut r = record("f-001", "host-a", 0);
        store.put(&r).await.unwrap();

        r.size = 99;
        store.overwrite(&r).await.unwrap();

        let page = store
            .scan_partition(&r.time_index_key, IndexSelect::Primary, &ScanParams::new(10))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].size, 99);
    }

    #[tokio::test]
    async fn test_scan_orders_and_paginates() {
        let store = SqliteStore::open_in_memory().unwrap();
        for i in 0..5 {
            store
                .put(&record(&format!("f-{:03}", i), "host-a", 0))
                .await
                .unwrap();
        }

        let first = store
            .scan_partition("0:syslog", IndexSelect::Primary, &ScanParams::new(2))
            .await
            .unwrap();
        assert_eq!(first.items.len(), 2);
        let cont = first.continuation.clone().unwrap();
        assert_eq!(cont, first.items[1].range_key);

        let second = store
            .scan_partition(
                "0:syslog",
                IndexSelect::Primary,
                &ScanParams::new(10).start_after(cont),
            )
            .await
            .unwrap();
        assert_eq!(second.items.len(), 3);
        assert!(second.continuation.is_none());

        // Full page with nothing beyond it is drained, not continued.
        let exact = store
            .scan_partition("0:syslog", IndexSelect::Primary, &ScanParams::new(5))
            .await
            .unwrap();
        assert_eq!(exact.items.len(), 5);
        assert!(exact.continuation.is_none());
    }

    #[tokio::test]
    async fn test_scan_prefix_and_exclude() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(&record("f-001", "host-a", 0)).await.unwrap();
        store.put(&record("f-002", "host-a", 0)).await.unwrap();
        store.put(&record("f-003", "host-b", 0)).await.unwrap();

        let page = store
            .scan_partition(
                "0:syslog",
                IndexSelect::Primary,
                &ScanParams::new(10).prefix("host-a:"),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.items.iter().all(|r| r.metadata.where_ == "host-a"));

        let page = store
            .scan_partition(
                "0:syslog",
                IndexSelect::Primary,
                &ScanParams::new(10).prefix("host-a:").exclude("host-a:f-001"),
            )
            .await
            .unwrap();
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0].metadata.id, "f-002");
    }

    #[tokio::test]
    async fn test_work_id_index_scan() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put(&record("f-001", "host-a", 0)).await.unwrap();
        store.put(&record("f-002", "host-b", 3)).await.unwrap();

        let page = store
            .scan_partition("job0:syslog", IndexSelect::WorkId, &ScanParams::new(10))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
    }

    #[tokio::test]
    async fn test_store_latest_conditional() {
        let store = SqliteStore::open_in_memory().unwrap();

        let old = record("f-old", "host-a", 1);
        let new = record("f-new", "host-a", 5);

        store.store_latest(&new).await.unwrap();
        // Stale write is silently dropped.
        store.store_latest(&old).await.unwrap();

        let latest = store.fetch_latest("syslog", "host-a").await.unwrap().unwrap();
        assert_eq!(latest.metadata.id, "f-new");
    }

    #[tokio::test]
    async fn test_store_latest_create_time_tiebreak() {
        let store = SqliteStore::open_in_memory().unwrap();

        let mut a = record("f-a", "host-a", 1);
        let mut b = record("f-b", "host-a", 1);
        a.create_time = 10;
        b.create_time = 20;

        store.store_latest(&b).await.unwrap();
        store.store_latest(&a).await.unwrap();

        let latest = store.fetch_latest("syslog", "host-a").await.unwrap().unwrap();
        assert_eq!(latest.metadata.id, "f-b");
    }

    #[tokio::test]
    async fn test_fetch_latest_missing() {
        let store = SqliteStore::open_in_memory().unwrap();
        assert!(store.fetch_latest("syslog", "host-z").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_persistence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("index.db");

        {
            let store = SqliteStore::open(&path).unwrap();
            store.put(&record("f-001", "host-a", 0)).await.unwrap();
        }

        {
            let store = SqliteStore::open(&path).unwrap();
            assert_eq!(store.count_records().unwrap(), 1);
        }
    }
}
