use std::fmt;

use tracing::{info, warn};

use crate::{
  catalog::VideoInfo, engine::Engine, strategy::StrategyConfig,
  util::truncate,
};

const SUMMARY_LIMIT: usize = 200;

/// Why one strategy did not produce a catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyFailure {
  pub strategy: String,
  pub summary: String,
}

impl fmt::Display for StrategyFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}: {}", self.strategy, self.summary)
  }
}

/// Probe `url` with each strategy in order until one yields a catalog.
///
/// Returns the catalog together with the strategy that produced it, so
/// the download can reuse a client identity the upstream already accepted.
/// Strategies after the first success are never tried. When every strategy
/// fails the per-strategy summaries are returned instead.
pub async fn fetch_catalog<'s, E>(
  engine: &E,
  url: &str,
  strategies: &'s [StrategyConfig],
) -> Result<(VideoInfo, &'s StrategyConfig), Vec<StrategyFailure>>
where
  E: Engine + ?Sized,
{
  let mut failures = Vec::new();

  for (attempt, strategy) in strategies.iter().enumerate() {
    info!(
      strategy = %strategy.name,
      "probing {url} (strategy {}/{})",
      attempt + 1,
      strategies.len()
    );

    match engine.probe(url, strategy).await {
      Ok(info) => {
        info!(
          strategy = %strategy.name,
          "probe succeeded with {} formats",
          info.formats.len()
        );
        return Ok((info, strategy));
      }
      Err(e) => {
        let summary = truncate(&e.to_string(), SUMMARY_LIMIT);
        warn!(strategy = %strategy.name, "probe failed: {summary}");
        failures.push(StrategyFailure {
          strategy: strategy.name.clone(),
          summary,
        });
      }
    }
  }

  Err(failures)
}
