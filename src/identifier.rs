use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

const HOST_MARKERS: [&str; 2] = ["youtube.com", "youtu.be"];

// exactly 11 id characters, a 12th one disqualifies the candidate
const ID_PATTERN: &str = r"([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)";

// tried in order, first match wins
static ID_REGEXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
  [
    r"(?i:youtube\.com)/(?:watch)?[^\s#]*?[?&]v=",
    r"(?i:youtu\.be)/",
    r"(?i:youtube\.com)/embed/",
    r"(?i:youtube\.com)/shorts/",
    r"(?i:youtube\.com)/live/",
  ]
  .into_iter()
  .map(|prefix| {
    Regex::new(&format!("{prefix}{ID_PATTERN}"))
      .expect("identifier patterns are hard-coded")
  })
  .collect()
});

/// Canonical key of a video, independent of how the URL was decorated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoId(String);

impl VideoId {
  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// The watch URL rebuilt from the id alone. Playlist, timestamp and
  /// any other parameters of the original input do not survive.
  pub fn canonical_url(&self) -> String {
    format!("https://www.youtube.com/watch?v={}", self.0)
  }
}

impl fmt::Display for VideoId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Whether the input mentions one of the platform's hosts at all.
pub fn has_platform_marker(raw_url: &str) -> bool {
  let lower = raw_url.to_ascii_lowercase();
  HOST_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub fn resolve(raw_url: &str) -> Option<VideoId> {
  ID_REGEXES
    .iter()
    .find_map(|regex| regex.captures(raw_url))
    .map(|captures| VideoId(captures[1].to_string()))
}
