//! Serde-deserializable types matching the JSON Feed 1.1 document format.
//!
//! These types are separate from `Article` so the wire format can be lenient
//! (JSON Feed 1.0 fields, numeric ids, missing optional fields) while the
//! domain record stays strict.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;
use url::Url;

use super::types::Article;

#[derive(Debug, Deserialize, Default)]
pub struct ApiAuthor {
  pub name: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiItem {
  /// JSON Feed requires a string; some generators emit numbers.
  pub id: Option<serde_json::Value>,
  pub url: Option<String>,
  pub external_url: Option<String>,
  pub title: Option<String>,
  pub summary: Option<String>,
  pub content_html: Option<String>,
  pub content_text: Option<String>,
  pub date_published: Option<String>,
  pub date_modified: Option<String>,
  #[serde(default)]
  pub authors: Vec<ApiAuthor>,
  // JSON Feed 1.0
  pub author: Option<ApiAuthor>,
  #[serde(default)]
  pub tags: Vec<String>,
  pub image: Option<String>,
  pub banner_image: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ApiFeed {
  #[serde(default)]
  pub version: String,
  #[serde(default)]
  pub title: String,
  #[serde(default)]
  pub authors: Vec<ApiAuthor>,
  pub author: Option<ApiAuthor>,
  #[serde(default)]
  pub items: Vec<ApiItem>,
}

/// Why a feed item could not become an `Article`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ItemError {
  #[error("item has no id")]
  MissingId,
  #[error("item {0} has no usable url")]
  MissingUrl(String),
  #[error("item {id} has no parseable publication date ({value:?})")]
  BadDate { id: String, value: Option<String> },
}

// ============================================================================
// Conversions to domain types
// ============================================================================

impl ApiFeed {
  /// Convert every usable item, resolving relative links against `base`.
  /// Unusable items are logged and skipped.
  pub fn into_articles(self, base: &Url) -> Vec<Article> {
    let feed_author = join_authors(&self.authors, self.author.as_ref());

    self
      .items
      .into_iter()
      .filter_map(
        |item| match item.into_article(base, feed_author.as_deref()) {
          Ok(article) => Some(article),
          Err(e) => {
            warn!(feed = %base, error = %e, "Skipping feed item");
            None
          }
        },
      )
      .collect()
  }
}

impl ApiItem {
  pub fn into_article(self, base: &Url, feed_author: Option<&str>) -> Result<Article, ItemError> {
    let id = self
      .id
      .as_ref()
      .and_then(extract_id)
      .ok_or(ItemError::MissingId)?;

    let canonical_url = self
      .url
      .as_deref()
      .or(self.external_url.as_deref())
      .and_then(|raw| base.join(raw.trim()).ok())
      .map(String::from)
      .ok_or_else(|| ItemError::MissingUrl(id.clone()))?;

    let raw_date = self.date_published.or(self.date_modified);
    let published_at = raw_date
      .as_deref()
      .and_then(parse_feed_date)
      .ok_or_else(|| ItemError::BadDate {
        id: id.clone(),
        value: raw_date.clone(),
      })?;

    let author = join_authors(&self.authors, self.author.as_ref())
      .or_else(|| feed_author.map(String::from))
      .unwrap_or_default();

    let rich_content = self.content_html.or(self.content_text).unwrap_or_default();

    Ok(
      Article::new(id, self.title.unwrap_or_default().trim(), canonical_url, published_at)
        .with_summary(self.summary.unwrap_or_default().trim())
        .with_rich_content(rich_content)
        .with_author(author)
        .with_tags(self.tags)
        .with_cover_image(self.image.or(self.banner_image)),
    )
  }
}

// ============================================================================
// Helpers
// ============================================================================

/// Item ids can be strings or (non-conforming) numbers.
fn extract_id(value: &serde_json::Value) -> Option<String> {
  let id = match value {
    serde_json::Value::String(s) => s.trim().to_string(),
    serde_json::Value::Number(n) => n.to_string(),
    _ => return None,
  };
  (!id.is_empty()).then_some(id)
}

/// RFC 3339 per JSON Feed; RFC 2822 tolerated for feeds converted from RSS.
fn parse_feed_date(raw: &str) -> Option<DateTime<Utc>> {
  let raw = raw.trim();
  DateTime::parse_from_rfc3339(raw)
    .or_else(|_| DateTime::parse_from_rfc2822(raw))
    .map(|dt| dt.with_timezone(&Utc))
    .ok()
}

fn join_authors(authors: &[ApiAuthor], legacy: Option<&ApiAuthor>) -> Option<String> {
  let names: Vec<&str> = authors
    .iter()
    .chain(legacy)
    .filter_map(|a| a.name.as_deref())
    .map(str::trim)
    .filter(|n| !n.is_empty())
    .collect();

  (!names.is_empty()).then(|| names.join(", "))
}
