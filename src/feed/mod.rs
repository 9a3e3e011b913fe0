//! Feed-source collaborator: downloads a publication's JSON Feed and turns its
//! items into `Article` records.

pub mod api_types;
pub mod client;
pub mod text;
pub mod types;

pub use client::HttpFeedSource;
pub use types::Article;
