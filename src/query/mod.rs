//! Query layer
//!
//! Read-side of the index: paginated time-range and work-id queries plus
//! single-record latest lookups, all served from an [`IndexStore`] behind a
//! [`QueryEngine`].
//!
//! - **Cursor**: opaque resume tokens for paginated queries
//! - **Engine**: the bucket-walking query logic
//!
//! # Examples
//!
//! ```rust,ignore
//! use stowage::query::QueryEngine;
//!
//! let engine = QueryEngine::new(store);
//! let page = engine.query_by_time(start, end, "syslog", None, None).await?;
//! for record in &page.records {
//!     println!("{}", record.url);
//! }
//! ```
//!
//! [`IndexStore`]: crate::store::IndexStore

mod cursor;
mod engine;
mod error;

pub use cursor::Cursor;
pub use engine::{QueryEngine, QueryPage, DEFAULT_LOOKBACK, MAX_LOOKBACK, MAX_RESULTS};
pub use error::{QueryError, QueryResult};
