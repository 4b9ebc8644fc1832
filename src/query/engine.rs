//! Query engine
//!
//! Answers the three read paths over the index store:
//! 1. Work-id queries: one scan against the secondary index
//! 2. Time-range queries: an ascending walk over every bucket the range
//!    touches, with pagination tracking both the bucket and the position
//!    inside it
//! 3. Latest-record queries: a backward bucket walk that drains each
//!    bucket completely and keeps the newest candidate
//!
//! The engine is stateless per call beyond its store handle, so one
//! instance serves any number of concurrent requests, each with its own
//! cursor.
//!
//! # Pagination trade-off
//!
//! A file spanning several buckets is indexed once per bucket, and a
//! time-range page window does not carry enough state to recognize a record
//! it already delivered in an earlier page. Pages are deduplicated
//! internally by metadata id, but a record may reappear across pages; the
//! contract is "every record delivered at least once", not exactly once.

use crate::query::cursor::Cursor;
use crate::query::error::{QueryError, QueryResult};
use crate::record::{bucket_of, get_time_buckets, IndexRecord, DAY_MS};
use crate::store::{IndexSelect, IndexStore, ScanPage, ScanParams};
use std::collections::HashSet;
use std::sync::Arc;

/// Hard cap on records per page
pub const MAX_RESULTS: usize = 100;

/// Default lookback window for latest-record queries, in buckets.
///
/// Matches the derivation span guard, so any derivable file is findable by
/// default.
pub const DEFAULT_LOOKBACK: i64 = 30;

/// Largest accepted lookback window, in buckets (ten years of days).
///
/// The backward walk visits every bucket in the window even when all of
/// them are empty, so an unbounded caller-supplied value would pin the
/// request on a long scan of nothing.
pub const MAX_LOOKBACK: i64 = 3_650;

/// One page of query results plus the token to fetch the next page
#[derive(Debug, Clone)]
pub struct QueryPage {
    /// Records in delivery order, deduplicated by metadata id
    pub records: Vec<IndexRecord>,
    /// Resume token; `None` marks the terminal page
    pub next_cursor: Option<Cursor>,
}

/// Stateless query front-end over an [`IndexStore`]
pub struct QueryEngine {
    store: Arc<dyn IndexStore>,
    bucket_ms: i64,
}

impl QueryEngine {
    /// Create an engine with the production bucket width (one day).
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self::with_bucket_ms(store, DAY_MS)
    }

    /// Create an engine with a custom bucket width (tests, embedded use).
    pub fn with_bucket_ms(store: Arc<dyn IndexStore>, bucket_ms: i64) -> Self {
        Self { store, bucket_ms }
    }

    pub fn bucket_ms(&self) -> i64 {
        self.bucket_ms
    }

    /// All index records for one work unit, one page at a time.
    pub async fn query_by_work_id(
        &self,
        work_id: &str,
        what: &str,
        where_: Option<&str>,
        cursor: Option<Cursor>,
    ) -> QueryResult<QueryPage> {
        let last_evaluated = match cursor {
            None => None,
            Some(Cursor::WorkId { last_evaluated }) => Some(last_evaluated),
            Some(Cursor::Time { .. }) => {
                return Err(QueryError::InvalidCursor(
                    "time cursor supplied to a work-id query".to_string(),
                ))
            }
        };

        let partition = format!("{}:{}", work_id, what);
        let mut params = ScanParams::new(MAX_RESULTS);
        if let Some(w) = where_ {
            params = params.prefix(format!("{}:", w));
        }
        if let Some(key) = last_evaluated {
            // Resume strictly after the continuation key, and drop the
            // boundary key itself in case the store's filtered resume
            // returns it once more.
            params = params.start_after(key.clone()).exclude(key);
        }

        let page = self
            .store
            .scan_partition(&partition, IndexSelect::WorkId, &params)
            .await?;

        tracing::debug!(
            partition = %partition,
            returned = page.items.len(),
            more = page.continuation.is_some(),
            "work-id query page"
        );

        Ok(QueryPage {
            records: dedup_by_id(page.items),
            next_cursor: page
                .continuation
                .map(|last_evaluated| Cursor::WorkId { last_evaluated }),
        })
    }

    /// All index records overlapping `[start, end]`, one page at a time.
    ///
    /// The page is built by walking buckets in ascending order. A bucket
    /// that the store could not drain yields a continuation cursor into
    /// that bucket; a page that grows past `MAX_RESULTS / 2` stops at the
    /// current bucket boundary so the next page has headroom for another
    /// bucket.
    pub async fn query_by_time(
        &self,
        start: i64,
        end: i64,
        what: &str,
        where_: Option<&str>,
        cursor: Option<Cursor>,
    ) -> QueryResult<QueryPage> {
        let (resume_bucket, pending_key) = match cursor {
            None => (None, None),
            Some(Cursor::Time {
                current_time_bucket,
                last_evaluated,
                last_range_key,
            }) => (
                Some(current_time_bucket),
                last_evaluated.or(last_range_key),
            ),
            Some(Cursor::WorkId { .. }) => {
                return Err(QueryError::InvalidCursor(
                    "work-id cursor supplied to a time query".to_string(),
                ))
            }
        };

        let mut buckets = get_time_buckets(start, end, self.bucket_ms);
        if let Some(resume) = resume_bucket {
            buckets.retain(|b| *b >= resume);
        }

        let soft_limit = MAX_RESULTS / 2;
        let mut results: Vec<IndexRecord> = Vec::new();
        let mut next_cursor = None;
        let mut first_bucket = true;

        for bucket in buckets {
            let partition = format!("{}:{}", bucket, what);
            let mut params = ScanParams::new(soft_limit);
            if let Some(w) = where_ {
                params = params.prefix(format!("{}:", w));
            }
            if first_bucket {
                if let Some(key) = &pending_key {
                    params = params.start_after(key.clone()).exclude(key.clone());
                }
                first_bucket = false;
            }

            let ScanPage {
                items,
                continuation,
            } = self
                .store
                .scan_partition(&partition, IndexSelect::Primary, &params)
                .await?;
            let scan_tail = items.last().map(|r| r.range_key.clone());

            // A record lands in every bucket its interval touches, so a
            // bucket scan can surface files that end before the query
            // starts (or vice versa). Drop them here.
            results.extend(items.into_iter().filter(|r| r.metadata.overlaps(start, end)));

            if let Some(last_evaluated) = continuation {
                // Bucket not drained: resume inside it next page.
                next_cursor = Some(Cursor::Time {
                    current_time_bucket: bucket,
                    last_evaluated: Some(last_evaluated),
                    last_range_key: None,
                });
                break;
            }
            if results.len() > soft_limit {
                // Soft page bound: stop at the bucket boundary.
                next_cursor = Some(Cursor::Time {
                    current_time_bucket: bucket,
                    last_evaluated: None,
                    last_range_key: scan_tail,
                });
                break;
            }
        }

        Ok(QueryPage {
            records: dedup_by_id(results),
            next_cursor,
        })
    }

    /// The most recent record for (`what`, `where`), searching backward
    /// from the current bucket through `lookback` buckets.
    ///
    /// The scan is authoritative over the store's latest pointer: the
    /// pointer holds the newest record ever written, but a record older
    /// than the lookback window must come back as not-found, which only
    /// the windowed walk can decide.
    ///
    /// `lookback` arrives verbatim from the transport layer and must be an
    /// integer in `0..=MAX_LOOKBACK`; anything else is rejected before the
    /// store is touched.
    pub async fn query_latest(
        &self,
        what: &str,
        where_: &str,
        lookback: Option<&str>,
    ) -> QueryResult<Option<IndexRecord>> {
        let lookback = parse_lookback(lookback)?;
        let now_ms = chrono::Utc::now().timestamp_millis();
        self.query_latest_at(what, where_, lookback, now_ms).await
    }

    async fn query_latest_at(
        &self,
        what: &str,
        where_: &str,
        lookback: i64,
        now_ms: i64,
    ) -> QueryResult<Option<IndexRecord>> {
        let now_bucket = bucket_of(now_ms, self.bucket_ms);
        let prefix = format!("{}:", where_);

        for bucket in (now_bucket - lookback..=now_bucket).rev() {
            let partition = format!("{}:{}", bucket, what);
            let mut best: Option<IndexRecord> = None;
            let mut start_after: Option<String> = None;

            // Drain the whole bucket; "latest" must consider every
            // candidate, not a page-limited window.
            loop {
                let mut params = ScanParams::new(MAX_RESULTS).prefix(prefix.clone());
                if let Some(key) = &start_after {
                    params = params.start_after(key.clone());
                }
                let ScanPage {
                    items,
                    continuation,
                } = self
                    .store
                    .scan_partition(&partition, IndexSelect::Primary, &params)
                    .await?;

                for item in items {
                    let newer = match &best {
                        Some(current) => {
                            (item.metadata.start, item.create_time)
                                > (current.metadata.start, current.create_time)
                        }
                        None => true,
                    };
                    if newer {
                        best = Some(item);
                    }
                }

                match continuation {
                    Some(key) => start_after = Some(key),
                    None => break,
                }
            }

            // First bucket (walking backward) with any candidate wins.
            if best.is_some() {
                return Ok(best);
            }
        }

        Ok(None)
    }
}

fn parse_lookback(raw: Option<&str>) -> Result<i64, QueryError> {
    match raw {
        None => Ok(DEFAULT_LOOKBACK),
        Some(s) => s
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|v| (0..=MAX_LOOKBACK).contains(v))
            .ok_or_else(|| QueryError::InvalidLookback(s.to_string())),
    }
}

/// Drop repeated metadata ids, keeping first occurrences in order.
fn dedup_by_id(records: Vec<IndexRecord>) -> Vec<IndexRecord> {
    let mut seen = HashSet::new();
    records
        .into_iter()
        .filter(|r| seen.insert(r.metadata.id.clone()))
        .collect()
}
