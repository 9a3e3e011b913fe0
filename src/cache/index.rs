//! Inverted text index over the article collection.
//!
//! The index is derived data: it is built in one pass from a collection slice
//! and thrown away with it. Postings refer to articles by their position in
//! that slice, which is only meaningful alongside the exact slice it was built
//! from.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::feed::Article;

/// Minimum query-token length for prefix matching.
const MIN_PREFIX_LEN: usize = 3;

/// Share of a field's weight awarded for a prefix hit.
const PREFIX_FACTOR: f32 = 0.5;

/// Indexed article fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
  Title,
  Summary,
  Author,
  Content,
}

impl Field {
  fn weight(self) -> f32 {
    match self {
      Field::Title => 3.0,
      Field::Summary | Field::Author => 2.0,
      Field::Content => 1.0,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Posting {
  position: usize,
  field: Field,
}

#[derive(Debug, Default)]
pub struct SearchIndex {
  postings: BTreeMap<String, Vec<Posting>>,
}

impl SearchIndex {
  /// Build a fresh index over `articles`.
  pub fn build(articles: &[Article]) -> Self {
    let mut postings: BTreeMap<String, Vec<Posting>> = BTreeMap::new();

    for (position, article) in articles.iter().enumerate() {
      let fields = [
        (Field::Title, article.title.as_str()),
        (Field::Summary, article.summary.as_str()),
        (Field::Author, article.author.as_str()),
        (Field::Content, article.plain_content()),
      ];

      for (field, text) in fields {
        let distinct: BTreeSet<String> = tokenize(text).collect();
        for token in distinct {
          postings
            .entry(token)
            .or_default()
            .push(Posting { position, field });
        }
      }
    }

    Self { postings }
  }

  /// Number of distinct tokens.
  pub fn len(&self) -> usize {
    self.postings.len()
  }

  pub fn is_empty(&self) -> bool {
    self.postings.is_empty()
  }

  /// Positions of matching articles, best match first.
  ///
  /// A query token scores a field's weight for an exact token hit, or
  /// `PREFIX_FACTOR` of it for a prefix hit; per field only the better of the
  /// two counts. Ties are broken by position, so the result is deterministic
  /// for a given index.
  pub fn search(&self, query: &str) -> Vec<usize> {
    let terms: BTreeSet<String> = tokenize(query).collect();
    let mut scores: HashMap<usize, f32> = HashMap::new();

    for term in &terms {
      let mut best: HashMap<(usize, Field), f32> = HashMap::new();

      if let Some(exact) = self.postings.get(term) {
        for p in exact {
          best.insert((p.position, p.field), p.field.weight());
        }
      }

      if term.chars().count() >= MIN_PREFIX_LEN {
        let prefixed = self
          .postings
          .range::<String, _>(term.clone()..)
          .take_while(|(token, _)| token.starts_with(term.as_str()))
          .filter(|(token, _)| *token != term);

        for (_, list) in prefixed {
          for p in list {
            let score = p.field.weight() * PREFIX_FACTOR;
            let slot = best.entry((p.position, p.field)).or_insert(0.0);
            if score > *slot {
              *slot = score;
            }
          }
        }
      }

      for ((position, _), score) in best {
        *scores.entry(position).or_insert(0.0) += score;
      }
    }

    let mut ranked: Vec<(usize, f32)> = scores.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().map(|(position, _)| position).collect()
  }
}

/// Lowercased alphanumeric runs of `text`.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
  text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| !t.is_empty())
    .map(str::to_lowercase)
}
