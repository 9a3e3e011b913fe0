/// Errors that reach callers of the article cache.
///
/// Refresh failures with data to fall back on, persistence failures and
/// unusable snapshots are logged where they happen and never surface here.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
  /// The feed could not be fetched and there is nothing cached to serve.
  #[error("feed {address} is unavailable and no cached articles exist: {reason}")]
  SourceUnavailable { address: String, reason: String },
}
