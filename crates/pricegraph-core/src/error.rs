//! Error types for `pricegraph-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Loading observations or store labels failed. Fatal to the run.
  #[error("observation source error: {0}")]
  Source(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The snapshot write (or a read) failed; nothing was committed.
  #[error("snapshot store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  /// The window reaches past the representable date range.
  #[error("window of {0} days is out of range")]
  InvalidWindow(u32),

  #[error("unknown graph type: {0:?}")]
  UnknownGraphType(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Whether running again could succeed. Bad parameters never will.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::Source(_) | Self::Store(_))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
