//! JSON shapes returned to the calling agent.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::feed::Article;

/// Listing entry: everything but the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleSummary {
  pub id: String,
  pub title: String,
  pub url: String,
  pub summary: String,
  pub published_at: DateTime<Utc>,
  pub author: String,
  pub tags: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub cover_image_url: Option<String>,
}

/// Single-article lookup result, including the body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArticleDetail {
  #[serde(flatten)]
  pub summary: ArticleSummary,
  pub content: String,
  pub content_html: String,
}

impl From<&Article> for ArticleSummary {
  fn from(article: &Article) -> Self {
    ArticleSummary {
      id: article.id.clone(),
      title: article.title.clone(),
      url: article.canonical_url.clone(),
      summary: article.summary.clone(),
      published_at: article.published_at,
      author: article.author.clone(),
      tags: article.tags.clone(),
      cover_image_url: article.cover_image_url.clone(),
    }
  }
}

impl From<&Article> for ArticleDetail {
  fn from(article: &Article) -> Self {
    ArticleDetail {
      summary: ArticleSummary::from(article),
      content: article.plain_content().to_string(),
      content_html: article.rich_content().to_string(),
    }
  }
}

/// Page of listing entries.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleList {
  pub count: usize,
  pub articles: Vec<ArticleSummary>,
}

impl ArticleList {
  pub fn new(articles: &[Article]) -> Self {
    Self {
      count: articles.len(),
      articles: articles.iter().map(ArticleSummary::from).collect(),
    }
  }
}
