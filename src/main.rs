mod cache;
mod config;
mod feed;
mod logging;
mod tools;

use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use tracing::warn;

use cache::{open_store, ArticleCache, CacheOptions, NoopStorage, SnapshotStore};
use feed::HttpFeedSource;
use tools::{PostTools, ToolCall, ToolError, ToolResponse};

#[derive(Parser, Debug)]
#[command(name = "postcache")]
#[command(about = "Cached search and lookup over a publication's article feed")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/postcache/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Feed URL, overriding config file and POSTCACHE_FEED_URL
  #[arg(long)]
  feed_url: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Full-text search over the cached articles
  Search {
    query: String,
    #[arg(short, long, allow_negative_numbers = true)]
    limit: Option<i64>,
  },
  /// Newest articles first
  Recent {
    #[arg(short, long, allow_negative_numbers = true)]
    limit: Option<i64>,
    #[arg(short, long, allow_negative_numbers = true)]
    offset: Option<i64>,
  },
  /// Look up an article by title
  Title {
    title: String,
    /// Require the whole title to match
    #[arg(long)]
    exact: bool,
  },
  /// Look up an article by canonical URL
  Url { url: String },
  /// Articles published between two dates (inclusive)
  Range {
    start: String,
    end: String,
    #[arg(short, long, allow_negative_numbers = true)]
    limit: Option<i64>,
  },
  /// Show cache status
  Status,
  /// Fetch the feed now
  Refresh,
  /// Print the tool definitions as JSON
  Tools,
  /// Run a raw JSON tool call ("-" reads it from stdin)
  Call { json: String },
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
  color_eyre::install()?;

  let args = Args::parse();

  let Some(request) = args.command.into_request()? else {
    println!("{}", serde_json::to_string_pretty(&tools::definitions())?);
    return Ok(ExitCode::SUCCESS);
  };

  let config = config::Config::load(args.config.as_deref(), args.feed_url.as_deref())?;
  let _log_guard = logging::init(&config.log)?;

  let address = config.feed.url.clone();
  let store: Box<dyn SnapshotStore> = match open_store(&config.storage, &address) {
    Ok(store) => store,
    Err(e) => {
      warn!(error = %e, "Snapshot storage unavailable, continuing without persistence");
      Box::new(NoopStorage)
    }
  };
  let source = HttpFeedSource::new(&config.feed)?;
  let options = CacheOptions::new(address).with_ttl(config.cache.ttl);

  let response = match ArticleCache::open(options, source, store).await {
    Ok(cache) => {
      let posts = PostTools::new(Arc::new(cache));
      match request {
        Request::Typed(call) => posts.dispatch(call).await,
        Request::Raw(raw) => posts.call_json(&raw).await,
      }
    }
    Err(e) => ToolResponse::Failure(ToolError::from(e)),
  };

  println!("{}", serde_json::to_string_pretty(&response.to_json())?);

  Ok(if response.is_ok() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  })
}

/// A tool invocation to run against the cache.
#[derive(Debug, PartialEq)]
enum Request {
  Typed(ToolCall),
  /// Unparsed JSON from `call`; parse errors become an `invalid_input` payload.
  Raw(String),
}

impl Command {
  /// `None` for commands that never open the cache.
  fn into_request(self) -> Result<Option<Request>> {
    let call = match self {
      Command::Search { query, limit } => ToolCall::SearchPosts { query, limit },
      Command::Recent { limit, offset } => ToolCall::GetRecentPosts { limit, offset },
      Command::Title { title, exact } => ToolCall::GetPostByTitle {
        title,
        exact: Some(exact),
      },
      Command::Url { url } => ToolCall::GetPostByUrl { url },
      Command::Range { start, end, limit } => ToolCall::GetPostsByDateRange { start, end, limit },
      Command::Status => ToolCall::GetCacheStatus {},
      Command::Refresh => ToolCall::RefreshPosts {},
      Command::Call { json } if json == "-" => {
        let mut raw = String::new();
        std::io::stdin()
          .read_to_string(&mut raw)
          .map_err(|e| eyre!("Failed to read tool call from stdin: {}", e))?;
        return Ok(Some(Request::Raw(raw)));
      }
      Command::Call { json } => return Ok(Some(Request::Raw(json))),
      Command::Tools => return Ok(None),
    };
    Ok(Some(Request::Typed(call)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn request(argv: &[&str]) -> Option<Request> {
    let args = Args::try_parse_from(argv).unwrap();
    args.command.into_request().unwrap()
  }

  #[test]
  fn test_tools_command_needs_no_cache() {
    assert_eq!(request(&["postcache", "tools"]), None);
  }

  #[test]
  fn test_subcommands_map_to_tool_calls() {
    assert_eq!(
      request(&["postcache", "recent", "--limit", "-1"]),
      Some(Request::Typed(ToolCall::GetRecentPosts {
        limit: Some(-1),
        offset: None
      }))
    );
    assert_eq!(
      request(&["postcache", "title", "Learning Rust", "--exact"]),
      Some(Request::Typed(ToolCall::GetPostByTitle {
        title: "Learning Rust".to_string(),
        exact: Some(true)
      }))
    );
    assert_eq!(
      request(&["postcache", "call", r#"{"tool":"refresh_posts"}"#]),
      Some(Request::Raw(r#"{"tool":"refresh_posts"}"#.to_string()))
    );
  }
}
