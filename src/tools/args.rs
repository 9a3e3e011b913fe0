//! Validation of primitive tool arguments.

use chrono::{DateTime, NaiveDate, Utc};

use super::ToolError;

/// Upper bound on any result page.
pub const MAX_LIMIT: usize = 100;

/// Which end of a date range a bound belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
  Start,
  End,
}

/// Negative limits are rejected; large ones are clamped to `MAX_LIMIT`.
pub fn limit(value: Option<i64>, default: usize) -> Result<usize, ToolError> {
  match value {
    None => Ok(default.min(MAX_LIMIT)),
    Some(n) if n < 0 => Err(ToolError::InvalidInput(format!(
      "limit must not be negative, got {}",
      n
    ))),
    Some(n) => Ok(usize::try_from(n).unwrap_or(usize::MAX).min(MAX_LIMIT)),
  }
}

pub fn offset(value: Option<i64>) -> Result<usize, ToolError> {
  match value {
    None => Ok(0),
    Some(n) if n < 0 => Err(ToolError::InvalidInput(format!(
      "offset must not be negative, got {}",
      n
    ))),
    Some(n) => Ok(usize::try_from(n).unwrap_or(usize::MAX)),
  }
}

/// Parse an RFC 3339 timestamp or a `YYYY-MM-DD` date.
///
/// A bare date covers the whole UTC day: the start of the day for
/// `Bound::Start`, its last nanosecond for `Bound::End`.
pub fn date_bound(raw: &str, bound: Bound) -> Result<DateTime<Utc>, ToolError> {
  let raw = raw.trim();

  if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
    return Ok(dt.with_timezone(&Utc));
  }

  let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| {
    ToolError::InvalidInput(format!(
      "expected an RFC 3339 timestamp or YYYY-MM-DD date, got {:?}",
      raw
    ))
  })?;

  let time = match bound {
    Bound::Start => date.and_hms_opt(0, 0, 0),
    Bound::End => date.and_hms_nano_opt(23, 59, 59, 999_999_999),
  };
  time
    .map(|t| t.and_utc())
    .ok_or_else(|| ToolError::InvalidInput(format!("date out of range: {:?}", raw)))
}

/// Reject blank required strings.
pub fn required<'a>(name: &str, value: &'a str) -> Result<&'a str, ToolError> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return Err(ToolError::InvalidInput(format!("{} must not be empty", name)));
  }
  Ok(trimmed)
}
