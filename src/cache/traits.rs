//! Core traits and types for the article cache.

use std::future::Future;

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::Serialize;

use crate::feed::Article;

/// Producer of the complete article list for a feed address.
///
/// One call is one atomic attempt from the cache's point of view. Retries and
/// backoff, if any, live inside the implementation.
pub trait FeedSource: Send + Sync {
  fn fetch_articles(&self, address: &str) -> impl Future<Output = Result<Vec<Article>>> + Send;
}

/// Indicates where the articles currently being served came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheSource {
  /// Fetched from the feed by this process
  Network,
  /// Adopted from the persisted snapshot at startup
  Snapshot,
  /// The last refresh failed, serving the previous articles
  Offline,
}

/// Point-in-time description of the cache, for diagnostics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStatus {
  pub source_address: String,
  pub article_count: usize,
  pub fetched_at: DateTime<Utc>,
  pub ttl_ms: u64,
  pub stale: bool,
  pub served_from: CacheSource,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub last_error: Option<String>,
}
