use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::text::html_to_text;

/// One published item from the source feed.
///
/// Markup and its plain-text rendering are private so they can only change
/// together: `with_rich_content` is the single place `plain_content` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StoredArticle", into = "StoredArticle")]
pub struct Article {
  pub id: String,
  pub title: String,
  pub canonical_url: String,
  pub summary: String,
  rich_content: String,
  plain_content: String,
  pub published_at: DateTime<Utc>,
  pub author: String,
  pub tags: Vec<String>,
  pub cover_image_url: Option<String>,
}

impl Article {
  pub fn new(
    id: impl Into<String>,
    title: impl Into<String>,
    canonical_url: impl Into<String>,
    published_at: DateTime<Utc>,
  ) -> Self {
    Self {
      id: id.into(),
      title: title.into(),
      canonical_url: canonical_url.into(),
      summary: String::new(),
      rich_content: String::new(),
      plain_content: String::new(),
      published_at,
      author: String::new(),
      tags: Vec::new(),
      cover_image_url: None,
    }
  }

  /// Replace the markup, re-deriving the plain-text rendering.
  pub fn with_rich_content(mut self, html: impl Into<String>) -> Self {
    self.rich_content = html.into();
    self.plain_content = html_to_text(&self.rich_content);
    self
  }

  pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
    self.summary = summary.into();
    self
  }

  pub fn with_author(mut self, author: impl Into<String>) -> Self {
    self.author = author.into();
    self
  }

  pub fn with_tags(mut self, tags: Vec<String>) -> Self {
    self.tags = tags;
    self
  }

  pub fn with_cover_image(mut self, url: Option<String>) -> Self {
    self.cover_image_url = url;
    self
  }

  pub fn rich_content(&self) -> &str {
    &self.rich_content
  }

  pub fn plain_content(&self) -> &str {
    &self.plain_content
  }
}

/// On-disk shape of an article. The plain-text rendering is derived data and
/// is rebuilt on load instead of being stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredArticle {
  id: String,
  title: String,
  canonical_url: String,
  #[serde(default)]
  summary: String,
  #[serde(default)]
  rich_content: String,
  published_at: DateTime<Utc>,
  #[serde(default)]
  author: String,
  #[serde(default)]
  tags: Vec<String>,
  #[serde(default)]
  cover_image_url: Option<String>,
}

impl From<StoredArticle> for Article {
  fn from(stored: StoredArticle) -> Self {
    Article::new(stored.id, stored.title, stored.canonical_url, stored.published_at)
      .with_summary(stored.summary)
      .with_rich_content(stored.rich_content)
      .with_author(stored.author)
      .with_tags(stored.tags)
      .with_cover_image(stored.cover_image_url)
  }
}

impl From<Article> for StoredArticle {
  fn from(article: Article) -> Self {
    StoredArticle {
      id: article.id,
      title: article.title,
      canonical_url: article.canonical_url,
      summary: article.summary,
      rich_content: article.rich_content,
      published_at: article.published_at,
      author: article.author,
      tags: article.tags,
      cover_image_url: article.cover_image_url,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn sample() -> Article {
    Article::new(
      "post-1",
      "Hello",
      "https://blog.example.com/hello",
      Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    )
    .with_rich_content("<h1>Hello</h1><p>World</p>")
    .with_tags(vec!["intro".to_string()])
  }

  #[test]
  fn test_plain_content_follows_rich_content() {
    let article = sample();
    assert_eq!(article.plain_content(), "Hello World");

    let edited = article.with_rich_content("<p>Rewritten</p>");
    assert_eq!(edited.rich_content(), "<p>Rewritten</p>");
    assert_eq!(edited.plain_content(), "Rewritten");
  }

  #[test]
  fn test_serialized_form_omits_plain_content() {
    let json = serde_json::to_value(sample()).unwrap();
    assert!(json.get("plainContent").is_none());
    assert_eq!(json["canonicalUrl"], "https://blog.example.com/hello");
    assert_eq!(json["publishedAt"], "2024-03-01T12:00:00Z");
  }

  #[test]
  fn test_deserialize_rebuilds_plain_content() {
    let json = serde_json::to_string(&sample()).unwrap();
    let back: Article = serde_json::from_str(&json).unwrap();
    assert_eq!(back, sample());
    assert_eq!(back.plain_content(), "Hello World");
  }
}
