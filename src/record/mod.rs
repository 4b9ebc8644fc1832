//! File metadata and index record derivation
//!
//! This module owns the write-side value types:
//! - [`Metadata`]: validated, normalized description of one archived file
//! - [`IndexRecord`]: the per-bucket denormalized index entry
//! - [`derive_records`]: the pure fan-out from a file to its index entries

mod derive;
mod metadata;

pub use derive::{
    bucket_of, derive_from_value, derive_records, get_time_buckets, DeriveError, IndexRecord,
    DAY_MS, MAX_BUCKET_SPAN,
};
pub use metadata::{Metadata, MetadataError, METADATA_VERSION};
