// Classifies yt-dlp failure messages so extraction errors can carry
// remediation hints back to the caller.

use std::sync::LazyLock;

use regex::Regex;

// `[youtube] <id>: ` prefixes carry arbitrary id characters
static EXTRACTOR_PREFIX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\[[^\]]*\]\s*[A-Za-z0-9_-]*:").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockingReason {
  BotCheck,
  Forbidden,
  RateLimited,
  GeoBlocked,
  Unavailable,
  Timeout,
}

impl BlockingReason {
  pub fn solution(&self) -> &'static str {
    match self {
      Self::BotCheck => {
        "The upstream is asking for a bot check from this server; \
         try again later or route the engine through YTDLP_PROXY"
      }
      Self::Forbidden => {
        "Stream access was denied (HTTP 403); update yt-dlp or add a \
         strategy using a different player client"
      }
      Self::RateLimited => {
        "This server is being rate limited (HTTP 429); wait before retrying"
      }
      Self::GeoBlocked => {
        "The video is not available in this server's region; use a proxy \
         located elsewhere"
      }
      Self::Unavailable => {
        "The video is private, removed or otherwise unavailable"
      }
      Self::Timeout => {
        "The upstream did not answer in time; check the server's network"
      }
    }
  }
}

pub fn diagnose(message: &str) -> Option<BlockingReason> {
  let message = EXTRACTOR_PREFIX.replace_all(message, "").to_lowercase();
  let has = |needles: &[&str]| needles.iter().any(|n| message.contains(n));

  if has(&["sign in to confirm", "not a bot"]) {
    Some(BlockingReason::BotCheck)
  } else if has(&["http error 429", "too many requests"]) {
    Some(BlockingReason::RateLimited)
  } else if has(&["http error 403", "403: forbidden"]) {
    Some(BlockingReason::Forbidden)
  } else if has(&[
    "not available in your country",
    "not made this video available in your country",
    "geo restriction",
    "geo-restricted",
  ]) {
    Some(BlockingReason::GeoBlocked)
  } else if has(&["private video", "video unavailable", "has been removed"]) {
    Some(BlockingReason::Unavailable)
  } else if has(&["timed out", "timeout"]) {
    Some(BlockingReason::Timeout)
  } else {
    None
  }
}

/// Distinct hints for a set of failure messages, in first-seen order.
pub fn solutions<'a>(
  messages: impl IntoIterator<Item = &'a str>,
) -> Vec<&'static str> {
  let mut reasons = Vec::new();
  for reason in messages.into_iter().filter_map(diagnose) {
    if !reasons.contains(&reason) {
      reasons.push(reason);
    }
  }

  if reasons.is_empty() {
    return vec![
      "The upstream may be blocking this origin; update yt-dlp, try again \
       later or configure YTDLP_PROXY",
    ];
  }
  reasons.iter().map(BlockingReason::solution).collect()
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_diagnose() {
    assert_eq!(
      diagnose("ERROR: [youtube] x: Sign in to confirm you're not a bot"),
      Some(BlockingReason::BotCheck)
    );
    assert_eq!(
      diagnose("ERROR: unable to download video data: HTTP Error 403: Forbidden"),
      Some(BlockingReason::Forbidden)
    );
    assert_eq!(
      diagnose("HTTP Error 429: Too Many Requests"),
      Some(BlockingReason::RateLimited)
    );
    assert_eq!(
      diagnose("ERROR: [youtube] x: Private video"),
      Some(BlockingReason::Unavailable)
    );
    assert_eq!(
      diagnose("extraction engine timed out after 120s"),
      Some(BlockingReason::Timeout)
    );
    assert_eq!(
      diagnose(
        "ERROR: [youtube] x: The uploader has not made this video available \
         in your country"
      ),
      Some(BlockingReason::GeoBlocked)
    );
    assert_eq!(diagnose("something odd"), None);
  }

  #[test]
  fn test_video_id_is_not_a_hint() {
    for id in ["aBotXyz1234", "Geo_1234ab", "x403x429xyz", "timeoutABCD"] {
      let message =
        format!("ERROR: [youtube] {id}: Requested format is not available");
      assert_eq!(diagnose(&message), None, "{id}");
    }
    assert_eq!(
      diagnose("ERROR: [youtube] aBotXyz1234: HTTP Error 403: Forbidden"),
      Some(BlockingReason::Forbidden)
    );
    assert_eq!(
      diagnose("WARNING: both clients failed, robots.txt ignored"),
      None
    );
  }

  #[test]
  fn test_solutions_are_deduplicated() {
    let hints = solutions([
      "HTTP Error 403: Forbidden",
      "HTTP Error 403: Forbidden",
      "Read timed out",
    ]);
    assert_eq!(
      hints,
      vec![
        BlockingReason::Forbidden.solution(),
        BlockingReason::Timeout.solution()
      ]
    );
  }

  #[test]
  fn test_generic_solution() {
    assert_eq!(solutions(["boom"]).len(), 1);
    assert_eq!(solutions(Vec::<&str>::new()).len(), 1);
  }
}
