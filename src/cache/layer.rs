//! Cache layer that gates every read on freshness and owns the refresh protocol.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::collection::normalize;
use super::error::CacheError;
use super::freshness::{is_stale, Clock, SystemClock};
use super::index::SearchIndex;
use super::snapshot::Snapshot;
use super::storage::SnapshotStore;
use super::traits::{CacheSource, CacheStatus, FeedSource};
use crate::feed::text::collapse_whitespace;
use crate::feed::Article;

/// Default time before cached articles are considered stale.
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

/// Settings for an `ArticleCache`.
#[derive(Clone)]
pub struct CacheOptions {
  source_address: String,
  ttl: Duration,
  clock: Arc<dyn Clock>,
}

impl CacheOptions {
  pub fn new(source_address: impl Into<String>) -> Self {
    Self {
      source_address: source_address.into(),
      ttl: DEFAULT_TTL,
      clock: Arc::new(SystemClock),
    }
  }

  /// Set how long fetched articles are served before a refresh is attempted.
  pub fn with_ttl(mut self, ttl: Duration) -> Self {
    self.ttl = ttl;
    self
  }

  pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
    self.clock = clock;
    self
  }
}

/// One consistent generation of cached data: the collection, the index built
/// from it, and when it was fetched. Replaced as a whole, never patched.
#[derive(Debug)]
pub struct CacheState {
  articles: Vec<Article>,
  index: SearchIndex,
  fetched_at: DateTime<Utc>,
  origin: CacheSource,
}

impl CacheState {
  fn new(articles: Vec<Article>, fetched_at: DateTime<Utc>, origin: CacheSource) -> Self {
    let articles = normalize(articles);
    let index = SearchIndex::build(&articles);
    Self {
      articles,
      index,
      fetched_at,
      origin,
    }
  }

  /// Blank queries list the collection; otherwise ranked index matches.
  pub fn search(&self, query: &str, limit: usize) -> Vec<Article> {
    if query.trim().is_empty() {
      return self.articles.iter().take(limit).cloned().collect();
    }

    let mut seen: HashSet<&str> = HashSet::new();
    self
      .index
      .search(query)
      .into_iter()
      .filter_map(|position| self.articles.get(position))
      .filter(|article| seen.insert(article.id.as_str()))
      .take(limit)
      .cloned()
      .collect()
  }

  pub fn list_recent(&self, limit: usize, offset: usize) -> Vec<Article> {
    self
      .articles
      .iter()
      .skip(offset)
      .take(limit)
      .cloned()
      .collect()
  }

  /// Case-insensitive title lookup; first match in collection order.
  pub fn get_by_title(&self, title: &str, exact: bool) -> Option<Article> {
    let wanted = normalize_title(title);
    self
      .articles
      .iter()
      .find(|article| {
        let candidate = normalize_title(&article.title);
        if exact {
          candidate == wanted
        } else {
          candidate.contains(&wanted)
        }
      })
      .cloned()
  }

  pub fn get_by_url(&self, url: &str) -> Option<Article> {
    self
      .articles
      .iter()
      .find(|article| article.canonical_url == url)
      .cloned()
  }

  /// Articles with `start <= published_at <= end`, newest first.
  pub fn get_by_date_range(
    &self,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: usize,
  ) -> Vec<Article> {
    if start > end {
      return Vec::new();
    }

    self
      .articles
      .iter()
      .filter(|article| article.published_at >= start && article.published_at <= end)
      .take(limit)
      .cloned()
      .collect()
  }
}

fn normalize_title(title: &str) -> String {
  collapse_whitespace(title).to_lowercase()
}

/// Article cache with lazy, TTL-driven refresh and snapshot persistence.
///
/// Every query first checks freshness. A stale cache is refreshed before the
/// query runs; if the refresh fails the previous articles keep being served.
pub struct ArticleCache<F: FeedSource> {
  source: F,
  store: Box<dyn SnapshotStore>,
  options: CacheOptions,
  served: RwLock<Served>,
  /// Serialises fetch, swap and persist.
  refresh_lock: Mutex<()>,
}

/// What queries currently see. Written as a unit so status never pairs a
/// generation with another generation's error.
struct Served {
  /// Queries clone the `Arc` and keep reading it even if a refresh swaps in a
  /// new one meanwhile.
  state: Arc<CacheState>,
  /// Error of the last refresh attempt, cleared by a successful one.
  last_error: Option<String>,
  /// Finished refresh attempts, successful or not.
  attempts: u64,
}

impl<F: FeedSource> ArticleCache<F> {
  /// Build the cache from the persisted snapshot if it is usable, otherwise
  /// from a live fetch.
  ///
  /// Fails only when there is no usable snapshot and the feed can't be fetched.
  pub async fn open(
    options: CacheOptions,
    source: F,
    store: Box<dyn SnapshotStore>,
  ) -> Result<Self, CacheError> {
    let address = options.source_address.clone();

    let initial = match load_snapshot(store.as_ref(), &address) {
      Some(state) => state,
      None => {
        let state = fetch_state(&source, &options).await.map_err(|e| {
          CacheError::SourceUnavailable {
            address: address.clone(),
            reason: e.to_string(),
          }
        })?;
        persist(store.as_ref(), &address, &state);
        state
      }
    };

    info!(
      feed = %address,
      articles = initial.articles.len(),
      origin = ?initial.origin,
      fetched_at = %initial.fetched_at,
      "Article cache ready"
    );

    Ok(Self {
      source,
      store,
      options,
      served: RwLock::new(Served {
        state: Arc::new(initial),
        last_error: None,
        attempts: 0,
      }),
      refresh_lock: Mutex::new(()),
    })
  }

  fn is_stale(&self, state: &CacheState) -> bool {
    is_stale(
      Some(state.fetched_at),
      self.options.ttl,
      self.options.clock.now(),
    )
  }

  /// Current state, refreshed first if stale.
  async fn current(&self) -> Arc<CacheState> {
    let (state, attempts) = {
      let served = self.served.read().await;
      (Arc::clone(&served.state), served.attempts)
    };
    if !self.is_stale(&state) {
      return state;
    }

    let _guard = self.refresh_lock.lock().await;

    // Another task attempted a refresh while we waited for the lock. Its
    // outcome, fresh data or a failure, stands for this read too.
    let state = {
      let served = self.served.read().await;
      let state = Arc::clone(&served.state);
      if served.attempts != attempts || !self.is_stale(&state) {
        return state;
      }
      state
    };

    debug!(feed = %self.options.source_address, fetched_at = %state.fetched_at, "Cache is stale");
    self.refresh_locked(state).await
  }

  /// Fetch, swap and persist. Caller must hold `refresh_lock`.
  async fn refresh_locked(&self, previous: Arc<CacheState>) -> Arc<CacheState> {
    let address = &self.options.source_address;

    match fetch_state(&self.source, &self.options).await {
      Ok(next) => {
        let next = Arc::new(next);
        {
          let mut served = self.served.write().await;
          served.state = Arc::clone(&next);
          served.last_error = None;
          served.attempts += 1;
        }
        info!(feed = %address, articles = next.articles.len(), "Refreshed article cache");
        persist(self.store.as_ref(), address, &next);
        next
      }
      Err(e) => {
        warn!(
          feed = %address,
          error = %e,
          fetched_at = %previous.fetched_at,
          "Feed refresh failed, serving cached articles"
        );
        let mut served = self.served.write().await;
        served.last_error = Some(e.to_string());
        served.attempts += 1;
        previous
      }
    }
  }

  /// Refresh now, regardless of age, and report the resulting status.
  pub async fn force_refresh(&self) -> CacheStatus {
    {
      let _guard = self.refresh_lock.lock().await;
      let previous = Arc::clone(&self.served.read().await.state);
      self.refresh_locked(previous).await;
    }
    self.status().await
  }

  /// Describe the cache without triggering a refresh.
  pub async fn status(&self) -> CacheStatus {
    let (state, last_error) = {
      let served = self.served.read().await;
      (Arc::clone(&served.state), served.last_error.clone())
    };

    CacheStatus {
      source_address: self.options.source_address.clone(),
      article_count: state.articles.len(),
      fetched_at: state.fetched_at,
      ttl_ms: u64::try_from(self.options.ttl.as_millis()).unwrap_or(u64::MAX),
      stale: self.is_stale(&state),
      served_from: if last_error.is_some() {
        CacheSource::Offline
      } else {
        state.origin
      },
      last_error,
    }
  }

  pub async fn search(&self, query: &str, limit: usize) -> Vec<Article> {
    self.current().await.search(query, limit)
  }

  pub async fn list_recent(&self, limit: usize, offset: usize) -> Vec<Article> {
    self.current().await.list_recent(limit, offset)
  }

  pub async fn get_by_title(&self, title: &str, exact: bool) -> Option<Article> {
    self.current().await.get_by_title(title, exact)
  }

  pub async fn get_by_url(&self, url: &str) -> Option<Article> {
    self.current().await.get_by_url(url)
  }

  pub async fn get_by_date_range(
    &self,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    limit: usize,
  ) -> Vec<Article> {
    self.current().await.get_by_date_range(start, end, limit)
  }
}

/// Adopt the stored snapshot if it exists, decodes, and belongs to `address`.
fn load_snapshot(store: &dyn SnapshotStore, address: &str) -> Option<CacheState> {
  match store.load() {
    Ok(Some(snapshot)) => match snapshot.validate(address) {
      Ok(()) => {
        debug!(feed = %address, articles = snapshot.articles.len(), "Loaded snapshot");
        Some(CacheState::new(
          snapshot.articles,
          snapshot.fetched_at,
          CacheSource::Snapshot,
        ))
      }
      Err(mismatch) => {
        info!(feed = %address, reason = %mismatch, "Discarding persisted snapshot");
        None
      }
    },
    Ok(None) => {
      debug!(feed = %address, "No persisted snapshot");
      None
    }
    Err(e) => {
      warn!(feed = %address, error = %e, "Failed to read persisted snapshot");
      None
    }
  }
}

async fn fetch_state<F: FeedSource>(
  source: &F,
  options: &CacheOptions,
) -> color_eyre::Result<CacheState> {
  let fetched = source.fetch_articles(&options.source_address).await?;
  let received = fetched.len();
  let state = CacheState::new(fetched, options.clock.now(), CacheSource::Network);

  if state.articles.len() < received {
    warn!(
      feed = %options.source_address,
      dropped = received - state.articles.len(),
      "Feed contained duplicate articles; kept the last occurrence"
    );
  }
  debug!(
    feed = %options.source_address,
    articles = state.articles.len(),
    terms = state.index.len(),
    "Rebuilt search index"
  );
  Ok(state)
}

/// Best effort: failures are logged and otherwise ignored.
fn persist(store: &dyn SnapshotStore, address: &str, state: &CacheState) {
  let snapshot = Snapshot::new(address, state.fetched_at, state.articles.clone());
  if let Err(e) = store.save(&snapshot) {
    warn!(feed = %address, error = %e, "Failed to persist snapshot");
  }
}
