//! Persisted form of the article collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::feed::Article;

/// Bumped whenever the persisted article layout changes.
pub const SCHEMA_VERSION: &str = "1";

/// The last successfully fetched collection, as written to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
  pub schema_version: String,
  pub source_address: String,
  pub fetched_at: DateTime<Utc>,
  pub articles: Vec<Article>,
}

/// Reasons a stored snapshot cannot be adopted.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SnapshotMismatch {
  #[error("schema version {found:?} does not match expected {expected:?}")]
  SchemaVersion { found: String, expected: String },
  #[error("snapshot was taken from {found:?}, configured feed is {expected:?}")]
  SourceAddress { found: String, expected: String },
}

impl Snapshot {
  /// Snapshot in the current schema version.
  pub fn new(source_address: &str, fetched_at: DateTime<Utc>, articles: Vec<Article>) -> Self {
    Self {
      schema_version: SCHEMA_VERSION.to_string(),
      source_address: source_address.to_string(),
      fetched_at,
      articles,
    }
  }

  /// Check the snapshot belongs to this build and this feed.
  pub fn validate(&self, expected_source: &str) -> Result<(), SnapshotMismatch> {
    if self.schema_version != SCHEMA_VERSION {
      return Err(SnapshotMismatch::SchemaVersion {
        found: self.schema_version.clone(),
        expected: SCHEMA_VERSION.to_string(),
      });
    }
    if self.source_address != expected_source {
      return Err(SnapshotMismatch::SourceAddress {
        found: self.source_address.clone(),
        expected: expected_source.to_string(),
      });
    }
    Ok(())
  }
}

/// Stable, filesystem-safe key for a feed address (SHA-256, hex).
pub fn source_key(address: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(address.trim().as_bytes());
  hex::encode(hasher.finalize())
}
