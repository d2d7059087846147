use std::sync::Arc;

use serde::Serialize;
use tracing::info;

use crate::{
  catalog::VideoInfo,
  engine::Engine,
  identifier::{self, VideoId},
  select::{self, Selection},
  sequencer,
  store::OutputStore,
  strategy::StrategyConfig,
  Error, Result,
};

/// Metadata of a retrieved video, taken from the probe response.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
  pub title: Option<String>,
  pub uploader: Option<String>,
  pub channel: Option<String>,
  pub duration: Option<f64>,
  pub view_count: Option<u64>,
  pub like_count: Option<u64>,
  pub thumbnail: Option<String>,
  pub webpage_url: Option<String>,
  pub filesize_approx: Option<u64>,
}

impl Metadata {
  fn new(info: &VideoInfo, selection: &Selection<'_>) -> Self {
    // sum of the chosen streams when the response has no overall estimate
    let filesize_approx = info.filesize_approx.map(|s| s as u64).or_else(|| {
      selection
        .formats()
        .iter()
        .map(|f| f.size())
        .sum::<Option<u64>>()
    });

    Self {
      title: info.title.clone(),
      uploader: info.uploader.clone(),
      channel: info.channel.clone(),
      duration: info.duration,
      view_count: info.view_count,
      like_count: info.like_count,
      thumbnail: info.thumbnail.clone(),
      webpage_url: info.webpage_url.clone(),
      filesize_approx,
    }
  }
}

/// Outcome of one successful retrieval.
#[derive(Debug, Clone)]
pub struct Retrieval {
  pub video_id: VideoId,
  pub filename: String,
  pub metadata: Metadata,
}

/// Coordinates one retrieval from raw URL to stored file.
pub struct Retriever {
  engine: Arc<dyn Engine>,
  strategies: Vec<StrategyConfig>,
  store: Arc<OutputStore>,
}

impl Retriever {
  pub fn new(
    engine: Arc<dyn Engine>,
    strategies: Vec<StrategyConfig>,
    store: Arc<OutputStore>,
  ) -> Self {
    Self {
      engine,
      strategies,
      store,
    }
  }

  pub async fn retrieve(&self, raw_url: &str) -> Result<Retrieval> {
    if !identifier::has_platform_marker(raw_url) {
      return Err(Error::InvalidUrl);
    }
    let video_id =
      identifier::resolve(raw_url).ok_or(Error::IdentifierNotFound)?;
    let url = video_id.canonical_url();
    info!("retrieving {video_id} from {url}");

    let (info, strategy) =
      sequencer::fetch_catalog(self.engine.as_ref(), &url, &self.strategies)
        .await
        .map_err(Error::ExtractionFailed)?;

    let selection =
      select::choose(&info.formats).ok_or(Error::NoSuitableFormat)?;
    let format = selection.format_selector();
    info!(
      strategy = %strategy.name,
      merge = selection.needs_merge(),
      "selected format {format} for {video_id}"
    );

    // dropped without commit on any failure below, removing partial files
    let output = self.store.allocate_now();
    self
      .engine
      .fetch_and_merge(&url, strategy, &format, output.path())
      .await
      .map_err(|e| Error::DownloadFailed(e.to_string()))?;

    if !output.is_written().await {
      return Err(Error::DownloadFailed(format!(
        "no output was written to {}",
        output.name()
      )));
    }

    let metadata = Metadata::new(&info, &selection);
    let filename = output.commit();

    Ok(Retrieval {
      video_id,
      filename,
      metadata,
    })
  }
}
