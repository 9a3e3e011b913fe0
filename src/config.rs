use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::cache::DEFAULT_TTL;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub feed: FeedConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  /// Address of the JSON Feed document
  #[serde(default)]
  pub url: String,
  /// Per-request timeout (e.g. "30s")
  #[serde(default = "default_timeout", deserialize_with = "deserialize_duration")]
  pub timeout: Duration,
  /// Retries after the first attempt for transient failures
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      url: String::new(),
      timeout: default_timeout(),
      max_retries: default_max_retries(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// How long fetched articles are served before a refresh (e.g. "15m")
  #[serde(default = "default_ttl", deserialize_with = "deserialize_duration")]
  pub ttl: Duration,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self { ttl: default_ttl() }
  }
}

#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
  /// SQLite database (transactional replace)
  #[default]
  Sqlite,
  /// Single JSON document (write-temp-then-rename)
  Json,
  /// Do not persist snapshots
  None,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  #[serde(default)]
  pub backend: StorageBackend,
  /// Snapshot location (defaults to a per-feed file under the user cache dir)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
  /// Default filter when RUST_LOG is unset (e.g. "info", "postcache=debug")
  pub level: Option<String>,
  /// Also write logs to this file
  pub file: Option<PathBuf>,
}

fn default_timeout() -> Duration {
  Duration::from_secs(30)
}

fn default_max_retries() -> u32 {
  3
}

fn default_ttl() -> Duration {
  DEFAULT_TTL
}

/// Durations are written humantime-style: "1000ms", "30s", "15m", "1h 30m".
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
  D: Deserializer<'de>,
{
  let raw = String::deserialize(deserializer)?;
  humantime::parse_duration(raw.trim()).map_err(serde::de::Error::custom)
}

impl Config {
  /// Load configuration from file, then apply environment and CLI overrides.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./postcache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/postcache/config.yaml
  ///
  /// Without a file, defaults are used as long as a feed URL comes from
  /// `POSTCACHE_FEED_URL` or `feed_url_override`.
  pub fn load(explicit_path: Option<&Path>, feed_url_override: Option<&str>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    let mut config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    config.apply_env(|key| std::env::var(key).ok())?;
    if let Some(url) = feed_url_override {
      config.feed.url = url.to_string();
    }
    config.feed.url = config.feed.url.trim().to_string();

    config.validate()?;
    Ok(config)
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("postcache.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("postcache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    serde_yaml::from_str(contents)
  }

  /// Apply `POSTCACHE_FEED_URL` and `POSTCACHE_CACHE_TTL`.
  fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
    if let Some(url) = lookup("POSTCACHE_FEED_URL") {
      self.feed.url = url;
    }

    if let Some(ttl) = lookup("POSTCACHE_CACHE_TTL") {
      self.cache.ttl = humantime::parse_duration(ttl.trim())
        .map_err(|e| eyre!("Invalid POSTCACHE_CACHE_TTL {:?}: {}", ttl, e))?;
    }

    Ok(())
  }

  fn validate(&self) -> Result<()> {
    let url = self.feed.url.trim();
    if url.is_empty() {
      return Err(eyre!(
        "No feed URL configured. Set feed.url in ~/.config/postcache/config.yaml,\n\
                 POSTCACHE_FEED_URL, or pass --feed-url."
      ));
    }

    let parsed = Url::parse(url).map_err(|e| eyre!("Invalid feed URL {:?}: {}", url, e))?;
    if !matches!(parsed.scheme(), "http" | "https") {
      return Err(eyre!("Feed URL must be http or https, got {:?}", url));
    }

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashMap;

  fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = pairs
      .iter()
      .map(|(k, v)| (k.to_string(), v.to_string()))
      .collect();
    move |key| map.get(key).cloned()
  }

  #[test]
  fn test_full_config() {
    let config = Config::parse(
      r#"
feed:
  url: https://blog.example.com/feed.json
  timeout: 10s
  max_retries: 5
cache:
  ttl: 1h 30m
storage:
  backend: json
  path: /var/cache/postcache/snapshot.json
log:
  level: debug
  file: /var/log/postcache.log
"#,
    )
    .unwrap();

    assert_eq!(config.feed.url, "https://blog.example.com/feed.json");
    assert_eq!(config.feed.timeout, Duration::from_secs(10));
    assert_eq!(config.feed.max_retries, 5);
    assert_eq!(config.cache.ttl, Duration::from_secs(90 * 60));
    assert_eq!(config.storage.backend, StorageBackend::Json);
    assert_eq!(
      config.storage.path,
      Some(PathBuf::from("/var/cache/postcache/snapshot.json"))
    );
    assert_eq!(config.log.level.as_deref(), Some("debug"));
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_defaults() {
    let config = Config::parse("feed:\n  url: https://blog.example.com/feed.json\n").unwrap();

    assert_eq!(config.feed.timeout, Duration::from_secs(30));
    assert_eq!(config.feed.max_retries, 3);
    assert_eq!(config.cache.ttl, DEFAULT_TTL);
    assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    assert!(config.storage.path.is_none());
    assert!(config.log.file.is_none());
  }

  #[test]
  fn test_invalid_duration_is_rejected() {
    let result = Config::parse("feed:\n  url: https://x.example.com/\ncache:\n  ttl: soon\n");
    assert!(result.is_err());
  }

  #[test]
  fn test_env_overrides() {
    let mut config = Config::parse("feed:\n  url: https://file.example.com/feed.json\n").unwrap();
    config
      .apply_env(env(&[
        ("POSTCACHE_FEED_URL", "https://env.example.com/feed.json"),
        ("POSTCACHE_CACHE_TTL", "1000ms"),
      ]))
      .unwrap();

    assert_eq!(config.feed.url, "https://env.example.com/feed.json");
    assert_eq!(config.cache.ttl, Duration::from_millis(1000));
  }

  #[test]
  fn test_bad_env_ttl_is_an_error() {
    let mut config = Config::default();
    assert!(config
      .apply_env(env(&[("POSTCACHE_CACHE_TTL", "forever")]))
      .is_err());
  }

  #[test]
  fn test_validate_requires_http_url() {
    let mut config = Config::default();
    assert!(config.validate().is_err());

    config.feed.url = "ftp://blog.example.com/feed.json".to_string();
    assert!(config.validate().is_err());

    config.feed.url = "not a url".to_string();
    assert!(config.validate().is_err());

    config.feed.url = "http://localhost:8080/feed.json".to_string();
    assert!(config.validate().is_ok());
  }

  #[test]
  fn test_missing_explicit_file() {
    let err = Config::load(Some(Path::new("/nonexistent/postcache.yaml")), None).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }

  #[test]
  fn test_explicit_file_with_cli_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "feed:\n  url: https://file.example.com/feed.json\n").unwrap();

    let config = Config::load(Some(&path), Some("https://cli.example.com/feed.json")).unwrap();
    assert_eq!(config.feed.url, "https://cli.example.com/feed.json");
  }
}
