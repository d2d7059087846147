use std::cmp::Ordering;

use crate::catalog::FormatDescriptor;

// strict preference order, first tier with any candidate wins
const CODEC_TIERS: [&str; 3] = ["av01", "vp9", "avc1"];

/// What to hand to the engine's format selector.
#[derive(Debug, Clone, PartialEq)]
pub enum Selection<'a> {
  /// A single stream carrying both audio and video; no merge step.
  Combined(&'a FormatDescriptor),
  Merge {
    video: &'a FormatDescriptor,
    audio: &'a FormatDescriptor,
  },
  /// A video stream with no usable audio counterpart.
  VideoOnly(&'a FormatDescriptor),
  /// Last resort when nothing is video-capable.
  BestQuality(&'a FormatDescriptor),
}

impl Selection<'_> {
  pub fn format_selector(&self) -> String {
    match self {
      Selection::Combined(format)
      | Selection::VideoOnly(format)
      | Selection::BestQuality(format) => format.format_id.clone(),
      Selection::Merge { video, audio } => {
        format!("{}+{}", video.format_id, audio.format_id)
      }
    }
  }

  pub fn formats(&self) -> Vec<&FormatDescriptor> {
    match self {
      Selection::Combined(format)
      | Selection::VideoOnly(format)
      | Selection::BestQuality(format) => vec![*format],
      Selection::Merge { video, audio } => vec![*video, *audio],
    }
  }

  pub fn needs_merge(&self) -> bool {
    matches!(self, Selection::Merge { .. })
  }
}

// Maximum by key. Ties keep the earliest element, so the result only
// depends on catalog order.
fn best_by<'a, I, K, F>(formats: I, key: F) -> Option<&'a FormatDescriptor>
where
  I: IntoIterator<Item = &'a FormatDescriptor>,
  F: Fn(&FormatDescriptor) -> K,
  K: PartialOrd,
{
  formats.into_iter().fold(None, |best, format| match best {
    Some(best)
      if key(format).partial_cmp(&key(best)) != Some(Ordering::Greater) =>
    {
      Some(best)
    }
    _ => Some(format),
  })
}

fn video_rank(format: &FormatDescriptor) -> (u32, f64) {
  (format.height(), format.bitrate())
}

pub fn select_video(formats: &[FormatDescriptor]) -> Option<&FormatDescriptor> {
  let mut candidates: Vec<_> = formats
    .iter()
    .filter(|f| f.has_video() && !f.has_audio())
    .collect();

  if candidates.is_empty() {
    candidates = formats.iter().filter(|f| f.has_video()).collect();
  }

  for codec in CODEC_TIERS {
    let tier = candidates.iter().copied().filter(|f| f.video_codec_is(codec));
    if let Some(best) = best_by(tier, video_rank) {
      return Some(best);
    }
  }

  best_by(candidates, video_rank)
}

pub fn select_audio(formats: &[FormatDescriptor]) -> Option<&FormatDescriptor> {
  let mut candidates: Vec<_> = formats
    .iter()
    .filter(|f| f.has_audio() && f.abr.is_some())
    .collect();

  if candidates.is_empty() {
    candidates = formats.iter().filter(|f| f.has_audio()).collect();
  }

  best_by(candidates, FormatDescriptor::audio_bitrate)
}

pub fn select_combined(
  formats: &[FormatDescriptor],
) -> Option<&FormatDescriptor> {
  best_by(formats.iter().filter(|f| f.is_combined()), video_rank)
}

/// Full selection policy: combined stream, else video+audio merge, else
/// video alone, else the highest generic quality score provided the
/// catalog has anything playable. `None` means no suitable format.
pub fn choose(formats: &[FormatDescriptor]) -> Option<Selection<'_>> {
  if let Some(combined) = select_combined(formats) {
    return Some(Selection::Combined(combined));
  }

  match (select_video(formats), select_audio(formats)) {
    (Some(video), Some(audio)) => Some(Selection::Merge { video, audio }),
    (Some(video), None) => Some(Selection::VideoOnly(video)),
    (None, _) => {
      let playable = formats.iter().any(|f| f.has_video() || f.has_url());
      if !playable {
        return None;
      }
      best_by(formats, FormatDescriptor::quality).map(Selection::BestQuality)
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn ids<'a>(format: Option<&'a FormatDescriptor>) -> Option<&'a str> {
    format.map(|f| f.format_id.as_str())
  }

  #[test]
  fn test_codec_tier_dominates_resolution() {
    let formats = vec![
      FormatDescriptor::video("248", "vp9", 1080, 2500.0),
      FormatDescriptor::video("398", "av01.0.05M.08", 720, 1200.0),
    ];
    assert_eq!(ids(select_video(&formats)), Some("398"));
  }

  #[test]
  fn test_within_tier_height_then_bitrate() {
    let formats = vec![
      FormatDescriptor::video("247", "vp9", 720, 1500.0),
      FormatDescriptor::video("248", "vp9", 1080, 2000.0),
      FormatDescriptor::video("303", "vp9", 1080, 4000.0),
      FormatDescriptor::video("137", "avc1.640028", 1080, 9000.0),
    ];
    assert_eq!(ids(select_video(&formats)), Some("303"));
  }

  #[test]
  fn test_unknown_codecs_fall_back_to_rank() {
    let formats = vec![
      FormatDescriptor::video("a", "hev1", 720, 100.0),
      FormatDescriptor::video("b", "hev1", 1440, 50.0),
    ];
    assert_eq!(ids(select_video(&formats)), Some("b"));
  }

  #[test]
  fn test_video_widens_to_combined_streams() {
    let formats = vec![
      FormatDescriptor::audio("140", "mp4a.40.2", Some(128.0)),
      FormatDescriptor::combined("18", 360, 500.0),
      FormatDescriptor::combined("22", 720, 1500.0),
    ];
    assert_eq!(ids(select_video(&formats)), Some("22"));
  }

  #[test]
  fn test_video_prefers_pure_video_streams() {
    let formats = vec![
      FormatDescriptor::combined("22", 720, 1500.0),
      FormatDescriptor::video("134", "avc1.4d401e", 360, 300.0),
    ];
    assert_eq!(ids(select_video(&formats)), Some("134"));
  }

  #[test]
  fn test_ties_keep_catalog_order() {
    let formats = vec![
      FormatDescriptor::video("first", "vp9", 1080, 2000.0),
      FormatDescriptor::video("second", "vp9", 1080, 2000.0),
    ];
    assert_eq!(ids(select_video(&formats)), Some("first"));
  }

  #[test]
  fn test_audio_prefers_known_bitrate() {
    let formats = vec![
      FormatDescriptor::audio("unknown", "opus", None),
      FormatDescriptor::audio("139", "mp4a.40.5", Some(48.0)),
      FormatDescriptor::audio("251", "opus", Some(160.0)),
    ];
    assert_eq!(ids(select_audio(&formats)), Some("251"));

    let formats = vec![
      FormatDescriptor::audio("x", "opus", None),
      FormatDescriptor::audio("y", "opus", None),
    ];
    assert_eq!(ids(select_audio(&formats)), Some("x"));
  }

  #[test]
  fn test_empty_catalog() {
    assert_eq!(select_video(&[]), None);
    assert_eq!(select_audio(&[]), None);
    assert_eq!(choose(&[]), None);
  }

  #[test]
  fn test_combined_wins_over_merge() {
    let formats = vec![
      FormatDescriptor::video("313", "vp9", 2160, 12000.0),
      FormatDescriptor::audio("251", "opus", Some(160.0)),
      FormatDescriptor::combined("18", 360, 500.0),
      FormatDescriptor::combined("22", 720, 1500.0),
    ];
    let selection = choose(&formats).unwrap();
    assert_eq!(selection, Selection::Combined(&formats[3]));
    assert_eq!(selection.format_selector(), "22");
    assert!(!selection.needs_merge());
  }

  #[test]
  fn test_merge_selector() {
    let formats = vec![
      FormatDescriptor::video("137", "avc1.640028", 1080, 4000.0),
      FormatDescriptor::audio("140", "mp4a.40.2", Some(129.0)),
    ];
    let selection = choose(&formats).unwrap();
    assert_eq!(selection.format_selector(), "137+140");
    assert_eq!(selection.formats().len(), 2);
  }

  #[test]
  fn test_video_without_audio() {
    let formats = vec![FormatDescriptor::video("137", "avc1", 1080, 4000.0)];
    assert_eq!(
      choose(&formats),
      Some(Selection::VideoOnly(&formats[0]))
    );
  }

  #[test]
  fn test_quality_fallback_requires_playable_format() {
    let mut low = FormatDescriptor::audio("low", "mp4a", Some(48.0));
    low.quality = Some(1.0);
    let mut high = FormatDescriptor::audio("high", "opus", Some(64.0));
    high.quality = Some(3.0);
    let formats = vec![low, high];
    assert_eq!(
      choose(&formats).map(|s| s.format_selector()),
      Some("high".to_string())
    );

    let unplayable: Vec<_> = formats
      .into_iter()
      .map(|f| FormatDescriptor { url: None, ..f })
      .collect();
    assert_eq!(choose(&unplayable), None);
  }
}
