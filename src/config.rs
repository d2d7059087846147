use std::{
  net::SocketAddr,
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context, Result};

use crate::strategy::{self, StrategyConfig};

/// Process configuration, read once from the environment at startup.
#[derive(Debug, Clone)]
pub struct Config {
  pub bind: SocketAddr,
  pub download_dir: PathBuf,
  pub ytdlp_path: PathBuf,
  pub ytdlp_concurrency: usize,
  pub download_timeout: Duration,
  pub merge_format: String,
  pub strategies: Vec<StrategyConfig>,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let var = |key: &str, default: &str| {
      lookup(key)
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
    };

    let port: u16 = var("PORT", "5000").parse().context("invalid PORT")?;
    let host = var("BIND_ADDR", "0.0.0.0");
    let bind: SocketAddr = format!("{host}:{port}")
      .parse()
      .with_context(|| format!("invalid BIND_ADDR {host}"))?;

    let ytdlp_concurrency: usize = var("YTDLP_CONCURRENCY", "2")
      .parse()
      .context("invalid YTDLP_CONCURRENCY")?;
    let download_timeout = var("DOWNLOAD_TIMEOUT_SECS", "1800")
      .parse()
      .map(Duration::from_secs)
      .context("invalid DOWNLOAD_TIMEOUT_SECS")?;

    let strategies = match lookup("STRATEGIES_FILE") {
      Some(path) => strategy::load_strategies(Path::new(&path))?,
      None => strategy::default_strategies(),
    };
    let proxy = lookup("YTDLP_PROXY");
    let strategies = strategies
      .into_iter()
      .map(|s| s.with_default_proxy(proxy.as_deref()))
      .collect();

    Ok(Self {
      bind,
      download_dir: var("DOWNLOAD_DIR", "downloads").into(),
      ytdlp_path: var("YTDLP_PATH", "yt-dlp").into(),
      ytdlp_concurrency,
      download_timeout,
      merge_format: var("MERGE_FORMAT", "mp4"),
      strategies,
    })
  }
}
