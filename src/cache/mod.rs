//! Article cache: freshness, persistence and full-text retrieval over the
//! article collection of one feed.
//!
//! This module provides:
//! - A lazy freshness gate on every read (no background timer)
//! - Wholesale refresh: normalise, re-index, swap, persist
//! - Offline mode (keep serving the previous articles when a refresh fails)
//! - Snapshot persistence (SQLite or JSON document) for fast restarts

mod collection;
mod error;
mod file;
mod freshness;
mod index;
mod layer;
mod snapshot;
mod storage;
mod traits;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::CacheError;
pub use layer::{ArticleCache, CacheOptions, DEFAULT_TTL};
pub use storage::{open_store, NoopStorage, SnapshotStore};
pub use traits::FeedSource;
