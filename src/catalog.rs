use serde::Deserialize;

/// One encoded representation of a video as reported by yt-dlp.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct FormatDescriptor {
  #[serde(default)]
  pub format_id: String,
  pub vcodec: Option<String>,
  pub acodec: Option<String>,
  pub height: Option<u32>,
  pub tbr: Option<f64>,
  pub abr: Option<f64>,
  pub quality: Option<f64>,
  pub url: Option<String>,
  pub filesize: Option<f64>,
  pub filesize_approx: Option<f64>,
}

// yt-dlp reports a missing stream as the literal codec "none"
fn codec_present(codec: Option<&str>) -> bool {
  matches!(codec, Some(codec) if codec != "none")
}

impl FormatDescriptor {
  pub fn has_video(&self) -> bool {
    codec_present(self.vcodec.as_deref())
  }

  pub fn has_audio(&self) -> bool {
    codec_present(self.acodec.as_deref())
  }

  pub fn is_combined(&self) -> bool {
    self.has_video() && self.has_audio()
  }

  pub fn has_url(&self) -> bool {
    self.url.as_deref().is_some_and(|url| !url.is_empty())
  }

  /// Case-insensitive prefix match on the video codec, e.g. `av01`.
  pub fn video_codec_is(&self, prefix: &str) -> bool {
    self
      .vcodec
      .as_deref()
      .is_some_and(|codec| codec.to_ascii_lowercase().starts_with(prefix))
  }

  pub fn height(&self) -> u32 {
    self.height.unwrap_or(0)
  }

  pub fn bitrate(&self) -> f64 {
    self.tbr.unwrap_or(0.0)
  }

  pub fn audio_bitrate(&self) -> f64 {
    self.abr.unwrap_or(0.0)
  }

  pub fn quality(&self) -> f64 {
    self.quality.unwrap_or(0.0)
  }

  pub fn size(&self) -> Option<u64> {
    self.filesize.or(self.filesize_approx).map(|size| size as u64)
  }
}

/// The parent response of a probe: video metadata plus its format catalog.
///
/// A catalog always comes from exactly one strategy; catalogs are never
/// combined across strategies.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VideoInfo {
  pub title: Option<String>,
  pub uploader: Option<String>,
  pub channel: Option<String>,
  pub duration: Option<f64>,
  pub view_count: Option<u64>,
  pub like_count: Option<u64>,
  pub thumbnail: Option<String>,
  pub webpage_url: Option<String>,
  pub filesize_approx: Option<f64>,
  #[serde(default)]
  pub formats: Vec<FormatDescriptor>,
}

#[cfg(test)]
impl FormatDescriptor {
  pub fn video(id: &str, codec: &str, height: u32, tbr: f64) -> Self {
    Self {
      format_id: id.into(),
      vcodec: Some(codec.into()),
      acodec: Some("none".into()),
      height: Some(height),
      tbr: Some(tbr),
      url: Some(format!("https://media.example/{id}")),
      ..Default::default()
    }
  }

  pub fn audio(id: &str, codec: &str, abr: Option<f64>) -> Self {
    Self {
      format_id: id.into(),
      vcodec: Some("none".into()),
      acodec: Some(codec.into()),
      abr,
      url: Some(format!("https://media.example/{id}")),
      ..Default::default()
    }
  }

  pub fn combined(id: &str, height: u32, tbr: f64) -> Self {
    Self {
      format_id: id.into(),
      vcodec: Some("avc1.42001E".into()),
      acodec: Some("mp4a.40.2".into()),
      height: Some(height),
      tbr: Some(tbr),
      url: Some(format!("https://media.example/{id}")),
      ..Default::default()
    }
  }
}
