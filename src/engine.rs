mod ytdlp;

use std::path::Path;

use async_trait::async_trait;

use crate::{catalog::VideoInfo, strategy::StrategyConfig};

pub use ytdlp::Ytdlp;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
  #[error("failed to run extraction engine: {0}")]
  Io(#[from] std::io::Error),
  #[error("extraction engine timed out after {0}s")]
  Timeout(u64),
  #[error("{0}")]
  Failed(String),
  #[error("unreadable engine output: {0}")]
  Parse(#[from] serde_json::Error),
  #[error("extraction engine is shutting down")]
  Closed(#[from] tokio::sync::AcquireError),
}

/// The extraction engine that talks to the upstream platform.
#[async_trait]
pub trait Engine: Send + Sync {
  /// Fetch metadata and the format catalog without downloading media.
  async fn probe(
    &self,
    url: &str,
    strategy: &StrategyConfig,
  ) -> Result<VideoInfo, EngineError>;

  /// Download the formats named by `format` (`video+audio` or a single id)
  /// and merge them into one container at `output`.
  async fn fetch_and_merge(
    &self,
    url: &str,
    strategy: &StrategyConfig,
    format: &str,
    output: &Path,
  ) -> Result<(), EngineError>;
}
