//! Staleness decisions for the cached collection.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Source of "now" for staleness checks.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    Utc::now()
  }
}

/// True when nothing was ever fetched or the last fetch is older than `ttl`.
///
/// A fetch time in the future (clock stepped backwards) counts as fresh.
pub fn is_stale(last_fetched_at: Option<DateTime<Utc>>, ttl: Duration, now: DateTime<Utc>) -> bool {
  match last_fetched_at {
    None => true,
    Some(fetched_at) => {
      let ttl = TimeDelta::from_std(ttl).unwrap_or(TimeDelta::MAX);
      now - fetched_at > ttl
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn at(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap()
  }

  #[test]
  fn test_never_fetched_is_stale() {
    assert!(is_stale(None, Duration::from_secs(3600), at(0)));
  }

  #[test]
  fn test_ttl_boundary() {
    let ttl = Duration::from_millis(1000);
    assert!(!is_stale(Some(at(0)), ttl, at(500)));
    assert!(!is_stale(Some(at(0)), ttl, at(1000)));
    assert!(is_stale(Some(at(0)), ttl, at(1001)));
  }

  #[test]
  fn test_zero_ttl_is_stale_after_any_time() {
    assert!(!is_stale(Some(at(0)), Duration::ZERO, at(0)));
    assert!(is_stale(Some(at(0)), Duration::ZERO, at(1)));
  }

  #[test]
  fn test_clock_going_backwards_is_fresh() {
    assert!(!is_stale(Some(at(5000)), Duration::from_millis(10), at(0)));
  }

  #[test]
  fn test_huge_ttl_does_not_overflow() {
    assert!(!is_stale(Some(at(0)), Duration::MAX, at(1_000_000)));
  }
}
