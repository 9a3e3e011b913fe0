//! Plain-text extraction from article markup.

use scraper::Html;

/// Elements whose text never reaches the index.
const SKIPPED_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Flatten an HTML fragment into whitespace-normalised text.
///
/// Text nodes are joined with single spaces and entities are decoded by the
/// parser, so `<p>Fish &amp; chips</p><p>daily</p>` becomes `"Fish & chips daily"`.
pub fn html_to_text(html: &str) -> String {
  if html.trim().is_empty() {
    return String::new();
  }

  let fragment = Html::parse_fragment(html);
  let mut pieces: Vec<&str> = Vec::new();

  for node in fragment.root_element().descendants() {
    let Some(text) = node.value().as_text() else {
      continue;
    };

    let hidden = node.ancestors().any(|ancestor| {
      ancestor
        .value()
        .as_element()
        .is_some_and(|el| SKIPPED_ELEMENTS.contains(&el.name()))
    });
    if !hidden {
      pieces.push(text);
    }
  }

  collapse_whitespace(&pieces.join(" "))
}

/// Collapse every run of whitespace into one space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
  s.split_whitespace().collect::<Vec<_>>().join(" ")
}
