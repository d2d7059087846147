use std::{
  collections::HashSet,
  path::{Path, PathBuf},
  sync::{Arc, LazyLock, Mutex},
};

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use regex::Regex;
use tracing::{info, warn};

/// Capture time pattern of output filenames, sortable and second-resolution.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

// <timestamp>[_<n>].<ext>, never contains a path separator
static FILENAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(
    r"^(\d{4}-\d{2}-\d{2}_\d{2}-\d{2}-\d{2})(?:_([1-9]\d*))?\.[A-Za-z0-9]+$",
  )
  .unwrap()
});

/// Flat directory of merged media files named by capture time.
///
/// There is no index: a file being present is the only record of a
/// completed retrieval. Names handed out but not yet written are kept in
/// `reserved` so concurrent retrievals in the same second never share one.
pub struct OutputStore {
  base_dir: PathBuf,
  extension: String,
  reserved: Arc<Mutex<HashSet<String>>>,
}

impl OutputStore {
  /// Open the store, creating the directory if needed. Existing files are
  /// kept and stay downloadable.
  pub fn new(
    base_dir: impl AsRef<Path>,
    extension: &str,
  ) -> std::io::Result<Self> {
    std::fs::create_dir_all(&base_dir)?;

    Ok(Self {
      base_dir: base_dir.as_ref().to_owned(),
      extension: extension.trim_start_matches('.').to_string(),
      reserved: Default::default(),
    })
  }

  pub fn base_dir(&self) -> &Path {
    &self.base_dir
  }

  pub fn allocate_now(&self) -> OutputFile {
    self.allocate(Local::now())
  }

  /// Reserve the output name for a retrieval captured at `captured_at`.
  /// A second retrieval in the same second gets a `_2`, `_3`, ... suffix.
  pub fn allocate<Tz>(&self, captured_at: DateTime<Tz>) -> OutputFile
  where
    Tz: TimeZone,
    Tz::Offset: std::fmt::Display,
  {
    let stamp = captured_at.format(TIMESTAMP_FORMAT).to_string();
    let mut reserved = self.reserved.lock().unwrap();

    let name = (1..)
      .map(|n| match n {
        1 => format!("{stamp}.{}", self.extension),
        n => format!("{stamp}_{n}.{}", self.extension),
      })
      .find(|name| {
        !reserved.contains(name) && !self.base_dir.join(name).exists()
      })
      .expect("suffix counter is unbounded");

    reserved.insert(name.clone());

    OutputFile {
      path: self.base_dir.join(&name),
      name,
      reserved: self.reserved.clone(),
      committed: false,
    }
  }

  /// Path of a previously produced file, if `filename` is one of ours and
  /// it exists.
  pub fn resolve(&self, filename: &str) -> Option<PathBuf> {
    parse_timestamp(filename)?;
    if self.reserved.lock().unwrap().contains(filename) {
      // still being written
      return None;
    }

    let path = self.base_dir.join(filename);
    path.is_file().then_some(path)
  }
}

/// Capture time encoded in an output filename.
pub fn parse_timestamp(filename: &str) -> Option<NaiveDateTime> {
  let captures = FILENAME_REGEX.captures(filename)?;
  NaiveDateTime::parse_from_str(&captures[1], TIMESTAMP_FORMAT).ok()
}

/// A reserved output location for one retrieval.
///
/// Unless committed, dropping it deletes the file and any partial
/// artefacts the engine left next to it, so an abandoned or failed
/// download never leaves a servable file behind.
pub struct OutputFile {
  name: String,
  path: PathBuf,
  reserved: Arc<Mutex<HashSet<String>>>,
  committed: bool,
}

impl OutputFile {
  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn path(&self) -> &Path {
    &self.path
  }

  /// Whether the engine actually produced a non-empty file.
  pub async fn is_written(&self) -> bool {
    tokio::fs::metadata(&self.path)
      .await
      .is_ok_and(|meta| meta.is_file() && meta.len() > 0)
  }

  /// Keep the file and hand out its name.
  pub fn commit(mut self) -> String {
    self.committed = true;
    info!("stored {}", self.path.display());
    self.name.clone()
  }

  fn remove_artefacts(&self) {
    let Some(dir) = self.path.parent() else {
      return;
    };
    let Some(stem) = self.path.file_stem().and_then(|s| s.to_str()) else {
      return;
    };
    // yt-dlp writes <stem>.f<id>.<ext>, <stem>.<ext>.part and similar
    let prefix = format!("{stem}.");

    let Ok(entries) = std::fs::read_dir(dir) else {
      return;
    };
    for entry in entries.flatten() {
      let name = entry.file_name();
      if !name.to_string_lossy().starts_with(&prefix) {
        continue;
      }
      if let Err(e) = std::fs::remove_file(entry.path()) {
        warn!("failed to delete {}: {}", entry.path().display(), e);
      } else {
        info!("deleted {}", entry.path().display());
      }
    }
  }
}

impl Drop for OutputFile {
  fn drop(&mut self) {
    if !self.committed {
      self.remove_artefacts();
    }

    if let Ok(mut reserved) = self.reserved.lock() {
      reserved.remove(&self.name);
    }
  }
}

#[cfg(test)]
mod test {
  use chrono::Utc;

  use super::*;

  fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 17, h, m, s).unwrap()
  }

  #[test]
  fn test_filename_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::new(dir.path(), "mp4").unwrap();

    let file = store.allocate(at(9, 5, 7));
    assert_eq!(file.name(), "2024-05-17_09-05-07.mp4");
    assert_eq!(
      parse_timestamp(file.name()),
      Some(at(9, 5, 7).naive_utc())
    );
  }

  #[test]
  fn test_different_seconds_never_collide() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::new(dir.path(), "mp4").unwrap();

    let a = store.allocate(at(12, 0, 0));
    let b = store.allocate(at(12, 0, 1));
    assert_ne!(a.name(), b.name());
    assert!(a.name() < b.name());
  }

  #[test]
  fn test_same_second_is_disambiguated() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::new(dir.path(), ".mp4").unwrap();

    let first = store.allocate(at(12, 0, 0));
    let second = store.allocate(at(12, 0, 0));
    assert_eq!(first.name(), "2024-05-17_12-00-00.mp4");
    assert_eq!(second.name(), "2024-05-17_12-00-00_2.mp4");
    assert!(parse_timestamp(second.name()).is_some());

    // a committed file keeps its name taken
    std::fs::write(first.path(), b"data").unwrap();
    first.commit();
    drop(second);
    let third = store.allocate(at(12, 0, 0));
    assert_eq!(third.name(), "2024-05-17_12-00-00_2.mp4");
  }

  #[test]
  fn test_uncommitted_file_is_removed() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::new(dir.path(), "mp4").unwrap();

    let neighbour = dir.path().join("2024-05-17_12-00-00_2.mp4");
    std::fs::write(&neighbour, b"other retrieval").unwrap();

    let file = store.allocate(at(12, 0, 0));
    let path = file.path().to_owned();
    std::fs::write(&path, b"partial").unwrap();
    std::fs::write(path.with_extension("f137.mp4"), b"video").unwrap();
    std::fs::write(path.with_extension("mp4.part"), b"part").unwrap();
    drop(file);

    let left: Vec<_> = std::fs::read_dir(dir.path())
      .unwrap()
      .map(|e| e.unwrap().file_name().into_string().unwrap())
      .collect();
    assert_eq!(left, vec!["2024-05-17_12-00-00_2.mp4"]);
  }

  #[tokio::test]
  async fn test_resolve() {
    let dir = tempfile::tempdir().unwrap();
    let store = OutputStore::new(dir.path(), "mp4").unwrap();

    let file = store.allocate(at(8, 30, 0));
    assert!(!file.is_written().await);
    std::fs::write(file.path(), b"media").unwrap();
    assert!(file.is_written().await);

    // not served while the retrieval is in flight
    assert_eq!(store.resolve("2024-05-17_08-30-00.mp4"), None);
    let name = file.commit();
    assert_eq!(store.resolve(&name), Some(dir.path().join(&name)));

    assert_eq!(store.resolve("2024-05-17_08-30-01.mp4"), None);
    assert_eq!(store.resolve("../secret.mp4"), None);
    assert_eq!(store.resolve("2024-05-17_08-30-00.mp4/../x"), None);
    assert_eq!(store.resolve("notes.txt"), None);
  }

  #[test]
  fn test_existing_files_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let name = "2023-01-01_00-00-00.mp4";
    std::fs::write(dir.path().join(name), b"old").unwrap();

    let store = OutputStore::new(dir.path(), "mp4").unwrap();
    assert!(store.resolve(name).is_some());
  }
}
