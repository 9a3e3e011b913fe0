//! Snapshot storage trait and SQLite implementation.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};

use super::file::JsonFileStorage;
use super::snapshot::{source_key, Snapshot};
use crate::config::{StorageBackend, StorageConfig};
use crate::feed::Article;

/// Trait for snapshot storage backends.
///
/// A store holds at most one snapshot. Whether it belongs to the configured
/// feed is decided by the cache, not the store.
pub trait SnapshotStore: Send + Sync {
  /// Read the stored snapshot, if any.
  fn load(&self) -> Result<Option<Snapshot>>;

  /// Replace the stored snapshot. Readers see either the old or the new
  /// snapshot, never a mix.
  fn save(&self, snapshot: &Snapshot) -> Result<()>;
}

/// Storage implementation that doesn't persist anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStorage;

impl SnapshotStore for NoopStorage {
  fn load(&self) -> Result<Option<Snapshot>> {
    Ok(None) // Always miss
  }

  fn save(&self, _snapshot: &Snapshot) -> Result<()> {
    Ok(()) // Discard
  }
}

/// Open the backend selected in `config` for the feed at `source_address`.
pub fn open_store(config: &StorageConfig, source_address: &str) -> Result<Box<dyn SnapshotStore>> {
  let store: Box<dyn SnapshotStore> = match config.backend {
    StorageBackend::None => Box::new(NoopStorage),
    StorageBackend::Sqlite => {
      let path = snapshot_path(config, source_address, "db")?;
      Box::new(SqliteStorage::open(&path)?)
    }
    StorageBackend::Json => {
      let path = snapshot_path(config, source_address, "json")?;
      Box::new(JsonFileStorage::new(path))
    }
  };
  Ok(store)
}

/// Explicit `storage.path`, or a per-feed file in the default cache directory.
fn snapshot_path(config: &StorageConfig, source_address: &str, extension: &str) -> Result<PathBuf> {
  if let Some(path) = &config.path {
    return Ok(path.clone());
  }

  let key = source_key(source_address);
  Ok(default_dir()?.join(format!("snapshot-{}.{}", &key[..16], extension)))
}

/// Get the default snapshot directory.
fn default_dir() -> Result<PathBuf> {
  let cache_dir = dirs::cache_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".cache")))
    .ok_or_else(|| eyre!("Could not determine cache directory"))?;

  Ok(cache_dir.join("postcache"))
}

/// SQLite-based snapshot storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the snapshot database at `path`.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Run database migrations for snapshot tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(SNAPSHOT_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for snapshot tables.
const SNAPSHOT_SCHEMA: &str = r#"
-- Snapshot header (single row)
CREATE TABLE IF NOT EXISTS snapshot (
    slot INTEGER PRIMARY KEY CHECK (slot = 1),
    schema_version TEXT NOT NULL,
    source_address TEXT NOT NULL,
    fetched_at TEXT NOT NULL,
    article_count INTEGER NOT NULL
);

-- Articles in collection order (serialized JSON)
CREATE TABLE IF NOT EXISTS snapshot_articles (
    position INTEGER PRIMARY KEY,
    article_id TEXT NOT NULL,
    data BLOB NOT NULL
);
"#;

impl SnapshotStore for SqliteStorage {
  fn load(&self) -> Result<Option<Snapshot>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let header: Option<(String, String, String, i64)> = conn
      .query_row(
        "SELECT schema_version, source_address, fetched_at, article_count
         FROM snapshot WHERE slot = 1",
        [],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read snapshot header: {}", e))?;

    let Some((schema_version, source_address, fetched_at, article_count)) = header else {
      return Ok(None);
    };

    let fetched_at = parse_datetime(&fetched_at)?;

    let mut stmt = conn
      .prepare("SELECT data FROM snapshot_articles ORDER BY position")
      .map_err(|e| eyre!("Failed to prepare article query: {}", e))?;

    let articles: Vec<Article> = stmt
      .query_map([], |row| row.get::<_, Vec<u8>>(0))
      .map_err(|e| eyre!("Failed to query articles: {}", e))?
      .map(|row| {
        let data = row.map_err(|e| eyre!("Failed to read article row: {}", e))?;
        serde_json::from_slice(&data).map_err(|e| eyre!("Failed to deserialize article: {}", e))
      })
      .collect::<Result<_>>()?;

    if articles.len() as i64 != article_count {
      return Err(eyre!(
        "Snapshot is incomplete: expected {} articles, found {}",
        article_count,
        articles.len()
      ));
    }

    Ok(Some(Snapshot {
      schema_version,
      source_address,
      fetched_at,
      articles,
    }))
  }

  fn save(&self, snapshot: &Snapshot) -> Result<()> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    tx.execute("DELETE FROM snapshot_articles", [])
      .map_err(|e| eyre!("Failed to delete old articles: {}", e))?;

    tx.execute(
      "INSERT OR REPLACE INTO snapshot (slot, schema_version, source_address, fetched_at, article_count)
       VALUES (1, ?, ?, ?, ?)",
      params![
        snapshot.schema_version,
        snapshot.source_address,
        snapshot
          .fetched_at
          .to_rfc3339_opts(SecondsFormat::AutoSi, true),
        snapshot.articles.len() as i64,
      ],
    )
    .map_err(|e| eyre!("Failed to store snapshot header: {}", e))?;

    {
      let mut insert = tx
        .prepare("INSERT INTO snapshot_articles (position, article_id, data) VALUES (?, ?, ?)")
        .map_err(|e| eyre!("Failed to prepare article insert: {}", e))?;

      for (position, article) in snapshot.articles.iter().enumerate() {
        let data =
          serde_json::to_vec(article).map_err(|e| eyre!("Failed to serialize article: {}", e))?;
        insert
          .execute(params![position as i64, article.id, data])
          .map_err(|e| eyre!("Failed to store article {}: {}", article.id, e))?;
      }
    }

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }
}

/// Parse an RFC 3339 timestamp as written by `save`.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
