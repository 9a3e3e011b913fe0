//! Fakes shared by the cache tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, NaiveDate, TimeDelta, TimeZone, Utc};
use color_eyre::{eyre::eyre, Result};

use super::freshness::Clock;
use super::snapshot::Snapshot;
use super::storage::SnapshotStore;
use super::traits::FeedSource;
use crate::feed::Article;

/// Article published at noon UTC on `date` (`YYYY-MM-DD`).
pub fn article(id: &str, date: &str) -> Article {
  let day = NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap();
  let published_at = day.and_hms_opt(12, 0, 0).unwrap().and_utc();
  Article::new(
    id,
    format!("Post {}", id),
    format!("https://blog.example.com/{}", id),
    published_at,
  )
}

/// Fixed instant plus `ms` milliseconds.
pub fn at(ms: i64) -> DateTime<Utc> {
  Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
}

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct ManualClock {
  now: Arc<Mutex<DateTime<Utc>>>,
}

impl ManualClock {
  pub fn new() -> Self {
    Self {
      now: Arc::new(Mutex::new(at(0))),
    }
  }

  pub fn set_ms(&self, ms: i64) {
    *self.now.lock().unwrap() = at(ms);
  }

  pub fn advance_ms(&self, ms: i64) {
    *self.now.lock().unwrap() += TimeDelta::milliseconds(ms);
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock().unwrap()
  }
}

/// Feed source returning scripted responses; the last one repeats.
#[derive(Clone)]
pub struct FakeSource {
  responses: Arc<Mutex<VecDeque<Result<Vec<Article>, String>>>>,
  calls: Arc<AtomicUsize>,
}

impl FakeSource {
  pub fn returning(articles: Vec<Article>) -> Self {
    let source = Self {
      responses: Arc::new(Mutex::new(VecDeque::new())),
      calls: Arc::new(AtomicUsize::new(0)),
    };
    source.push_ok(articles);
    source
  }

  pub fn failing(reason: &str) -> Self {
    let source = Self::returning(Vec::new());
    source.set_failing(reason);
    source
  }

  /// Replace all pending responses with a success.
  pub fn set_articles(&self, articles: Vec<Article>) {
    let mut responses = self.responses.lock().unwrap();
    responses.clear();
    responses.push_back(Ok(articles));
  }

  /// Replace all pending responses with a failure.
  pub fn set_failing(&self, reason: &str) {
    let mut responses = self.responses.lock().unwrap();
    responses.clear();
    responses.push_back(Err(reason.to_string()));
  }

  pub fn push_ok(&self, articles: Vec<Article>) {
    self.responses.lock().unwrap().push_back(Ok(articles));
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl FeedSource for FakeSource {
  async fn fetch_articles(&self, _address: &str) -> Result<Vec<Article>> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    // Give other tasks a chance to run mid-fetch, like a real request would.
    tokio::task::yield_now().await;
    let response = {
      let mut responses = self.responses.lock().unwrap();
      if responses.len() > 1 {
        responses.pop_front().unwrap()
      } else {
        responses.front().cloned().unwrap()
      }
    };
    response.map_err(|reason| eyre!(reason))
  }
}

/// In-memory snapshot store with failure switches.
#[derive(Clone, Default)]
pub struct MemoryStore {
  snapshot: Arc<Mutex<Option<Snapshot>>>,
  fail_load: Arc<Mutex<bool>>,
  fail_save: Arc<Mutex<bool>>,
  saves: Arc<AtomicUsize>,
}

impl MemoryStore {
  pub fn with_snapshot(snapshot: Snapshot) -> Self {
    let store = Self::default();
    *store.snapshot.lock().unwrap() = Some(snapshot);
    store
  }

  pub fn set_fail_load(&self, fail: bool) {
    *self.fail_load.lock().unwrap() = fail;
  }

  pub fn set_fail_save(&self, fail: bool) {
    *self.fail_save.lock().unwrap() = fail;
  }

  pub fn stored(&self) -> Option<Snapshot> {
    self.snapshot.lock().unwrap().clone()
  }

  pub fn saves(&self) -> usize {
    self.saves.load(Ordering::SeqCst)
  }
}

impl SnapshotStore for MemoryStore {
  fn load(&self) -> Result<Option<Snapshot>> {
    if *self.fail_load.lock().unwrap() {
      return Err(eyre!("disk on fire"));
    }
    Ok(self.snapshot.lock().unwrap().clone())
  }

  fn save(&self, snapshot: &Snapshot) -> Result<()> {
    if *self.fail_save.lock().unwrap() {
      return Err(eyre!("disk full"));
    }
    self.saves.fetch_add(1, Ordering::SeqCst);
    *self.snapshot.lock().unwrap() = Some(snapshot.clone());
    Ok(())
  }
}
