//! JSON document snapshot storage.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::PathBuf;

use color_eyre::{eyre::eyre, Result};
use tempfile::NamedTempFile;

use super::snapshot::Snapshot;
use super::storage::SnapshotStore;

/// Stores the snapshot as one JSON document.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so a reader sees either the old or the new document.
pub struct JsonFileStorage {
  path: PathBuf,
}

impl JsonFileStorage {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }
}

impl SnapshotStore for JsonFileStorage {
  fn load(&self) -> Result<Option<Snapshot>> {
    let contents = match fs::read(&self.path) {
      Ok(contents) => contents,
      Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
      Err(e) => return Err(eyre!("Failed to read snapshot {}: {}", self.path.display(), e)),
    };

    let snapshot = serde_json::from_slice(&contents)
      .map_err(|e| eyre!("Failed to parse snapshot {}: {}", self.path.display(), e))?;

    Ok(Some(snapshot))
  }

  fn save(&self, snapshot: &Snapshot) -> Result<()> {
    let dir = match self.path.parent() {
      Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
      _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| eyre!("Failed to create cache directory: {}", e))?;

    let tmp = NamedTempFile::new_in(&dir)
      .map_err(|e| eyre!("Failed to create temporary snapshot file: {}", e))?;

    {
      let mut writer = BufWriter::new(tmp.as_file());
      serde_json::to_writer(&mut writer, snapshot)
        .map_err(|e| eyre!("Failed to serialize snapshot: {}", e))?;
      writer
        .flush()
        .map_err(|e| eyre!("Failed to write snapshot: {}", e))?;
    }
    tmp
      .as_file()
      .sync_all()
      .map_err(|e| eyre!("Failed to sync snapshot: {}", e))?;

    tmp
      .persist(&self.path)
      .map_err(|e| eyre!("Failed to replace snapshot {}: {}", self.path.display(), e))?;

    Ok(())
  }
}
