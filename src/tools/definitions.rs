//! Names, descriptions and argument schemas of the exposed tools.

use serde_json::{json, Value};

use super::args::MAX_LIMIT;

fn limit_schema(default: usize) -> Value {
  json!({
    "type": "integer",
    "minimum": 0,
    "maximum": MAX_LIMIT,
    "default": default,
    "description": format!("Maximum number of results (clamped to {})", MAX_LIMIT),
  })
}

fn tool(name: &str, description: &str, properties: Value, required: &[&str]) -> Value {
  json!({
    "name": name,
    "description": description,
    "inputSchema": {
      "type": "object",
      "properties": properties,
      "required": required,
    },
  })
}

/// Every tool, in the shape agents expect for tool registration.
pub fn definitions() -> Value {
  Value::Array(vec![
    tool(
      "search_posts",
      "Full-text search over title, summary, author and body. Results are ranked; \
       a blank query lists the newest posts.",
      json!({
        "query": { "type": "string", "description": "Search terms" },
        "limit": limit_schema(super::DEFAULT_SEARCH_LIMIT),
      }),
      &["query"],
    ),
    tool(
      "get_recent_posts",
      "Newest posts first, with paging.",
      json!({
        "limit": limit_schema(super::DEFAULT_RECENT_LIMIT),
        "offset": { "type": "integer", "minimum": 0, "default": 0 },
      }),
      &[],
    ),
    tool(
      "get_post_by_title",
      "Look up one post by title, case-insensitively. Without `exact`, the \
       first post whose title contains the text is returned.",
      json!({
        "title": { "type": "string" },
        "exact": { "type": "boolean", "default": false },
      }),
      &["title"],
    ),
    tool(
      "get_post_by_url",
      "Look up one post by its canonical URL.",
      json!({ "url": { "type": "string" } }),
      &["url"],
    ),
    tool(
      "get_posts_by_date_range",
      "Posts published within an inclusive range, newest first. Dates are RFC 3339 \
       timestamps or YYYY-MM-DD; a date-only end covers the whole day (UTC).",
      json!({
        "start": { "type": "string" },
        "end": { "type": "string" },
        "limit": limit_schema(super::DEFAULT_RANGE_LIMIT),
      }),
      &["start", "end"],
    ),
    tool(
      "get_cache_status",
      "Report article count, last fetch time, staleness and the last refresh error.",
      json!({}),
      &[],
    ),
    tool(
      "refresh_posts",
      "Fetch the feed now, regardless of cache age, and report the resulting status.",
      json!({}),
      &[],
    ),
  ])
}
