use std::time::Duration;

use color_eyre::{eyre::eyre, Result};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::cache::FeedSource;
use crate::config::FeedConfig;
use crate::feed::api_types::ApiFeed;
use crate::feed::types::Article;

/// Longest wait between two attempts.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Largest feed document accepted.
const MAX_FEED_BYTES: usize = 16 * 1024 * 1024;

/// Failure of a single request, classified for the retry loop.
#[derive(Debug, thiserror::Error)]
enum FetchError {
  #[error("{0}")]
  Transient(String),
  #[error("{0}")]
  Fatal(String),
}

/// HTTP client for JSON Feed documents.
#[derive(Clone)]
pub struct HttpFeedSource {
  client: reqwest::Client,
  max_retries: u32,
  initial_backoff: Duration,
  max_body_bytes: usize,
}

impl HttpFeedSource {
  pub fn new(config: &FeedConfig) -> Result<Self> {
    let client = reqwest::Client::builder()
      .timeout(config.timeout)
      .user_agent(concat!("postcache/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      client,
      max_retries: config.max_retries,
      initial_backoff: Duration::from_millis(500),
      max_body_bytes: MAX_FEED_BYTES,
    })
  }

  /// Set the delay before the first retry. Later retries double it.
  #[cfg(test)]
  pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
    self.initial_backoff = initial_backoff;
    self
  }

  #[cfg(test)]
  pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
    self.max_body_bytes = max_body_bytes;
    self
  }

  /// Download and convert the whole feed, retrying transient failures
  /// (connection errors, 5xx, 429) with exponential backoff.
  pub async fn fetch_feed(&self, address: &str) -> Result<Vec<Article>> {
    let url = Url::parse(address).map_err(|e| eyre!("Invalid feed address {}: {}", address, e))?;

    let mut attempt = 0u32;
    loop {
      match self.fetch_once(&url).await {
        Ok(feed) => {
          let (version, title) = (feed.version.clone(), feed.title.clone());
          let articles = feed.into_articles(&url);
          debug!(%url, %version, %title, count = articles.len(), "Fetched feed");
          return Ok(articles);
        }
        Err(FetchError::Transient(reason)) if attempt < self.max_retries => {
          let delay = backoff_delay(self.initial_backoff, attempt);
          attempt += 1;
          warn!(%url, attempt, ?delay, %reason, "Feed fetch failed, retrying");
          tokio::time::sleep(delay).await;
        }
        Err(e) => return Err(eyre!("Failed to fetch feed {}: {}", url, e)),
      }
    }
  }

  async fn fetch_once(&self, url: &Url) -> std::result::Result<ApiFeed, FetchError> {
    let response = self
      .client
      .get(url.clone())
      .header(ACCEPT, "application/feed+json, application/json")
      .send()
      .await
      .map_err(|e| FetchError::Transient(e.to_string()))?;

    let status = response.status();
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
      return Err(FetchError::Transient(format!("HTTP {}", status)));
    }
    if !status.is_success() {
      return Err(FetchError::Fatal(format!("HTTP {}", status)));
    }

    let body = self.read_body(response).await?;

    serde_json::from_slice(&body)
      .map_err(|e| FetchError::Fatal(format!("Invalid feed document: {}", e)))
  }

  /// Buffer the body, refusing documents over `max_body_bytes`.
  async fn read_body(
    &self,
    mut response: reqwest::Response,
  ) -> std::result::Result<Vec<u8>, FetchError> {
    let too_large = || {
      FetchError::Fatal(format!(
        "Feed document exceeds the {} byte limit",
        self.max_body_bytes
      ))
    };

    if let Some(length) = response.content_length() {
      if length > self.max_body_bytes as u64 {
        return Err(too_large());
      }
    }

    let mut body = Vec::new();
    while let Some(chunk) = response
      .chunk()
      .await
      .map_err(|e| FetchError::Transient(e.to_string()))?
    {
      if body.len() + chunk.len() > self.max_body_bytes {
        return Err(too_large());
      }
      body.extend_from_slice(&chunk);
    }
    Ok(body)
  }
}

/// Exponential backoff: `initial` doubled per attempt, capped at `MAX_BACKOFF`.
fn backoff_delay(initial: Duration, attempt: u32) -> Duration {
  initial
    .checked_mul(2u32.saturating_pow(attempt))
    .unwrap_or(MAX_BACKOFF)
    .min(MAX_BACKOFF)
}

impl FeedSource for HttpFeedSource {
  async fn fetch_articles(&self, address: &str) -> Result<Vec<Article>> {
    self.fetch_feed(address).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  const FEED: &str = r#"{
    "version": "https://jsonfeed.org/version/1.1",
    "title": "Example",
    "items": [
      {
        "id": "b",
        "url": "/posts/b",
        "title": "Second",
        "content_html": "<p>two</p>",
        "date_published": "2024-02-01T00:00:00Z"
      },
      {
        "id": "a",
        "url": "/posts/a",
        "title": "First",
        "content_html": "<p>one</p>",
        "date_published": "2024-01-01T00:00:00Z"
      }
    ]
  }"#;

  fn source(max_retries: u32) -> HttpFeedSource {
    let config = FeedConfig {
      max_retries,
      ..FeedConfig::default()
    };
    HttpFeedSource::new(&config)
      .unwrap()
      .with_backoff(Duration::ZERO)
  }

  #[tokio::test]
  async fn test_fetch_parses_feed() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/feed.json")
      .with_status(200)
      .with_header("content-type", "application/feed+json")
      .with_body(FEED)
      .create_async()
      .await;

    let address = format!("{}/feed.json", server.url());
    let articles = source(0).fetch_articles(&address).await.unwrap();

    mock.assert_async().await;
    assert_eq!(articles.len(), 2);
    assert_eq!(articles[0].id, "b");
    assert_eq!(articles[0].canonical_url, format!("{}/posts/b", server.url()));
    assert_eq!(articles[1].plain_content(), "one");
  }

  #[tokio::test]
  async fn test_server_errors_are_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/feed.json")
      .with_status(503)
      .expect(3)
      .create_async()
      .await;

    let address = format!("{}/feed.json", server.url());
    let result = source(2).fetch_articles(&address).await;

    mock.assert_async().await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_client_errors_are_not_retried() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/feed.json")
      .with_status(404)
      .expect(1)
      .create_async()
      .await;

    let address = format!("{}/feed.json", server.url());
    let err = source(3).fetch_articles(&address).await.unwrap_err();

    mock.assert_async().await;
    assert!(err.to_string().contains("404"));
  }

  #[tokio::test]
  async fn test_invalid_document_is_an_error() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/feed.json")
      .with_status(200)
      .with_body("<rss></rss>")
      .create_async()
      .await;

    let address = format!("{}/feed.json", server.url());
    let err = source(0).fetch_articles(&address).await.unwrap_err();
    assert!(err.to_string().contains("Invalid feed document"));
  }

  #[tokio::test]
  async fn test_oversized_document_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
      .mock("GET", "/feed.json")
      .with_status(200)
      .with_body(FEED)
      .expect(1)
      .create_async()
      .await;

    let address = format!("{}/feed.json", server.url());
    let err = source(3)
      .with_max_body_bytes(64)
      .fetch_articles(&address)
      .await
      .unwrap_err();

    mock.assert_async().await;
    assert!(err.to_string().contains("64 byte limit"));
  }

  #[tokio::test]
  async fn test_oversized_chunked_document_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    let _mock = server
      .mock("GET", "/feed.json")
      .with_status(200)
      .with_chunked_body(|w| w.write_all(FEED.as_bytes()))
      .create_async()
      .await;

    let address = format!("{}/feed.json", server.url());
    let err = source(0)
      .with_max_body_bytes(64)
      .fetch_articles(&address)
      .await
      .unwrap_err();
    assert!(err.to_string().contains("byte limit"));

    let articles = source(0).fetch_articles(&address).await.unwrap();
    assert_eq!(articles.len(), 2);
  }

  #[test]
  fn test_backoff_is_capped() {
    let initial = Duration::from_millis(500);
    assert_eq!(backoff_delay(initial, 0), Duration::from_millis(500));
    assert_eq!(backoff_delay(initial, 2), Duration::from_secs(2));
    assert_eq!(backoff_delay(initial, 10), MAX_BACKOFF);
    assert_eq!(backoff_delay(initial, 40), MAX_BACKOFF);
    assert_eq!(backoff_delay(Duration::from_secs(60), 0), MAX_BACKOFF);
  }

  #[tokio::test]
  async fn test_invalid_address() {
    assert!(source(0).fetch_articles("not a url").await.is_err());
  }
}
