//! Normalisation of a fetched article list into a valid collection.

use std::collections::HashSet;

use crate::feed::Article;

/// Enforce the collection invariants on a raw list from the feed:
/// unique `id`, unique `canonical_url`, newest first.
///
/// On a collision the article appearing later in `articles` wins. Articles
/// with equal publication times keep their relative source order.
pub fn normalize(articles: Vec<Article>) -> Vec<Article> {
  let mut seen_ids: HashSet<String> = HashSet::new();
  let mut seen_urls: HashSet<String> = HashSet::new();

  let mut kept: Vec<Article> = Vec::with_capacity(articles.len());
  for article in articles.into_iter().rev() {
    if seen_ids.contains(&article.id) || seen_urls.contains(&article.canonical_url) {
      continue;
    }
    seen_ids.insert(article.id.clone());
    seen_urls.insert(article.canonical_url.clone());
    kept.push(article);
  }
  kept.reverse();

  kept.sort_by(|a, b| b.published_at.cmp(&a.published_at));
  kept
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::test_support::article;

  fn ids(articles: &[Article]) -> Vec<&str> {
    articles.iter().map(|a| a.id.as_str()).collect()
  }

  #[test]
  fn test_sorted_newest_first_regardless_of_source_order() {
    let out = normalize(vec![
      article("a", "2024-01-01"),
      article("c", "2024-12-31"),
      article("b", "2024-06-15"),
    ]);
    assert_eq!(ids(&out), vec!["c", "b", "a"]);
  }

  #[test]
  fn test_duplicate_id_last_seen_wins() {
    let first = article("a", "2024-01-01").with_summary("old");
    let mut second = article("a", "2024-01-02").with_summary("new");
    second.canonical_url = "https://blog.example.com/a-moved".to_string();

    let out = normalize(vec![first, article("b", "2024-03-01"), second]);
    assert_eq!(ids(&out), vec!["b", "a"]);
    assert_eq!(out[1].summary, "new");
  }

  #[test]
  fn test_duplicate_url_last_seen_wins() {
    let mut other = article("z", "2024-02-01");
    other.canonical_url = article("a", "2024-01-01").canonical_url;

    let out = normalize(vec![article("a", "2024-01-01"), other]);
    assert_eq!(ids(&out), vec!["z"]);
  }

  #[test]
  fn test_dropped_article_does_not_shadow_others() {
    // The later "x" loses its url to "y"; the skipped copy must not block the earlier "x".
    let mut x = article("x", "2024-01-01");
    x.canonical_url = "https://blog.example.com/shared".to_string();
    let mut y = article("y", "2024-01-02");
    y.canonical_url = "https://blog.example.com/shared".to_string();
    let earlier_x = article("x", "2023-12-01");

    let out = normalize(vec![earlier_x, x, y]);
    assert_eq!(ids(&out), vec!["y", "x"]);
    assert_eq!(out[1].canonical_url, "https://blog.example.com/x");
  }

  #[test]
  fn test_equal_dates_keep_source_order() {
    let out = normalize(vec![
      article("first", "2024-05-05"),
      article("second", "2024-05-05"),
    ]);
    assert_eq!(ids(&out), vec!["first", "second"]);
  }
}
