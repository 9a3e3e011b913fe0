//! Tool-call surface over the article cache.
//!
//! Each tool takes primitive arguments and answers with a `ToolResponse`.
//! Nothing past this boundary returns `Err` or panics on bad input: failures
//! become a structured error payload, and "not found" is a successful `null`.

mod args;
mod definitions;
mod views;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::cache::{ArticleCache, CacheError, FeedSource};

pub use definitions::definitions;
use args::Bound;
use views::{ArticleDetail, ArticleList};

const DEFAULT_SEARCH_LIMIT: usize = 20;
const DEFAULT_RECENT_LIMIT: usize = 10;
const DEFAULT_RANGE_LIMIT: usize = 20;

/// Structured failure reported to the calling agent.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ToolError {
  #[error("invalid input: {0}")]
  InvalidInput(String),
  #[error("{0}")]
  SourceUnavailable(String),
  #[error("internal error: {0}")]
  Internal(String),
}

impl ToolError {
  pub fn kind(&self) -> &'static str {
    match self {
      ToolError::InvalidInput(_) => "invalid_input",
      ToolError::SourceUnavailable(_) => "source_unavailable",
      ToolError::Internal(_) => "internal",
    }
  }
}

impl From<CacheError> for ToolError {
  fn from(err: CacheError) -> Self {
    match err {
      CacheError::SourceUnavailable { .. } => ToolError::SourceUnavailable(err.to_string()),
    }
  }
}

/// Outcome of one tool call.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResponse {
  Success(Value),
  Failure(ToolError),
}

impl ToolResponse {
  pub fn success(data: impl Serialize) -> Self {
    match serde_json::to_value(data) {
      Ok(value) => ToolResponse::Success(value),
      Err(e) => ToolResponse::Failure(ToolError::Internal(format!(
        "Failed to serialize result: {}",
        e
      ))),
    }
  }

  pub fn not_found() -> Self {
    ToolResponse::Success(Value::Null)
  }

  pub fn is_ok(&self) -> bool {
    matches!(self, ToolResponse::Success(_))
  }

  /// `{"ok":true,"data":...}` or `{"ok":false,"error":{"kind":...,"message":...}}`.
  pub fn to_json(&self) -> Value {
    match self {
      ToolResponse::Success(data) => json!({ "ok": true, "data": data }),
      ToolResponse::Failure(err) => json!({
        "ok": false,
        "error": { "kind": err.kind(), "message": err.to_string() },
      }),
    }
  }
}

impl From<ToolError> for ToolResponse {
  fn from(err: ToolError) -> Self {
    ToolResponse::Failure(err)
  }
}

fn respond(result: Result<ToolResponse, ToolError>) -> ToolResponse {
  result.unwrap_or_else(ToolResponse::Failure)
}

/// A tool invocation as sent by the agent:
/// `{"tool": "search_posts", "arguments": {"query": "rust", "limit": 5}}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "tool", content = "arguments", rename_all = "snake_case")]
pub enum ToolCall {
  SearchPosts {
    #[serde(default)]
    query: String,
    limit: Option<i64>,
  },
  GetRecentPosts {
    limit: Option<i64>,
    offset: Option<i64>,
  },
  GetPostByTitle {
    title: String,
    exact: Option<bool>,
  },
  GetPostByUrl {
    url: String,
  },
  GetPostsByDateRange {
    start: String,
    end: String,
    limit: Option<i64>,
  },
  GetCacheStatus {},
  RefreshPosts {},
}

impl ToolCall {
  /// Parse a raw JSON call. A missing `arguments` member means no arguments.
  pub fn from_json(raw: &str) -> Result<Self, ToolError> {
    let mut value: Value = serde_json::from_str(raw)
      .map_err(|e| ToolError::InvalidInput(format!("malformed tool call: {}", e)))?;

    let object = value
      .as_object_mut()
      .ok_or_else(|| ToolError::InvalidInput("tool call must be a JSON object".to_string()))?;
    object
      .entry("arguments")
      .or_insert_with(|| Value::Object(Default::default()));

    serde_json::from_value(value).map_err(|e| ToolError::InvalidInput(e.to_string()))
  }
}

/// The agent-facing tools, sharing one article cache.
pub struct PostTools<F: FeedSource> {
  cache: Arc<ArticleCache<F>>,
}

impl<F: FeedSource> Clone for PostTools<F> {
  fn clone(&self) -> Self {
    Self {
      cache: Arc::clone(&self.cache),
    }
  }
}

impl<F: FeedSource> PostTools<F> {
  pub fn new(cache: Arc<ArticleCache<F>>) -> Self {
    Self { cache }
  }

  /// Full-text search; a blank query lists the newest articles.
  pub async fn search_posts(&self, query: &str, limit: Option<i64>) -> ToolResponse {
    respond(
      async {
        let limit = args::limit(limit, DEFAULT_SEARCH_LIMIT)?;
        let hits = self.cache.search(query, limit).await;
        Ok::<_, ToolError>(ToolResponse::success(ArticleList::new(&hits)))
      }
      .await,
    )
  }

  pub async fn get_recent_posts(&self, limit: Option<i64>, offset: Option<i64>) -> ToolResponse {
    respond(
      async {
        let limit = args::limit(limit, DEFAULT_RECENT_LIMIT)?;
        let offset = args::offset(offset)?;
        let page = self.cache.list_recent(limit, offset).await;
        Ok::<_, ToolError>(ToolResponse::success(ArticleList::new(&page)))
      }
      .await,
    )
  }

  pub async fn get_post_by_title(&self, title: &str, exact: Option<bool>) -> ToolResponse {
    respond(
      async {
        let title = args::required("title", title)?;
        let found = self
          .cache
          .get_by_title(title, exact.unwrap_or(false))
          .await;
        Ok::<_, ToolError>(match found {
          Some(article) => ToolResponse::success(ArticleDetail::from(&article)),
          None => ToolResponse::not_found(),
        })
      }
      .await,
    )
  }

  pub async fn get_post_by_url(&self, url: &str) -> ToolResponse {
    respond(
      async {
        let url = args::required("url", url)?;
        Ok::<_, ToolError>(match self.cache.get_by_url(url).await {
          Some(article) => ToolResponse::success(ArticleDetail::from(&article)),
          None => ToolResponse::not_found(),
        })
      }
      .await,
    )
  }

  pub async fn get_posts_by_date_range(
    &self,
    start: &str,
    end: &str,
    limit: Option<i64>,
  ) -> ToolResponse {
    respond(
      async {
        let start = args::date_bound(start, Bound::Start)?;
        let end = args::date_bound(end, Bound::End)?;
        let limit = args::limit(limit, DEFAULT_RANGE_LIMIT)?;
        let hits = self.cache.get_by_date_range(start, end, limit).await;
        Ok::<_, ToolError>(ToolResponse::success(ArticleList::new(&hits)))
      }
      .await,
    )
  }

  pub async fn get_cache_status(&self) -> ToolResponse {
    ToolResponse::success(self.cache.status().await)
  }

  pub async fn refresh_posts(&self) -> ToolResponse {
    ToolResponse::success(self.cache.force_refresh().await)
  }

  pub async fn dispatch(&self, call: ToolCall) -> ToolResponse {
    debug!(?call, "Dispatching tool call");
    match call {
      ToolCall::SearchPosts { query, limit } => self.search_posts(&query, limit).await,
      ToolCall::GetRecentPosts { limit, offset } => self.get_recent_posts(limit, offset).await,
      ToolCall::GetPostByTitle { title, exact } => self.get_post_by_title(&title, exact).await,
      ToolCall::GetPostByUrl { url } => self.get_post_by_url(&url).await,
      ToolCall::GetPostsByDateRange { start, end, limit } => {
        self.get_posts_by_date_range(&start, &end, limit).await
      }
      ToolCall::GetCacheStatus {} => self.get_cache_status().await,
      ToolCall::RefreshPosts {} => self.refresh_posts().await,
    }
  }

  /// Parse and run a raw JSON tool call.
  pub async fn call_json(&self, raw: &str) -> ToolResponse {
    match ToolCall::from_json(raw) {
      Ok(call) => self.dispatch(call).await,
      Err(err) => ToolResponse::Failure(err),
    }
  }
}
