use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, info};

use crate::{
  catalog::VideoInfo, strategy::StrategyConfig, util::redact_credentials,
};

use super::{Engine, EngineError};

// run yt-dlp command line to probe formats and download media.
// requires yt-dlp (and ffmpeg for merging) to be available.
pub struct Ytdlp {
  program: PathBuf,
  merge_format: String,
  download_timeout: Duration,
  // limits the number of yt-dlp processes running at a time
  permits: Semaphore,
}

impl Ytdlp {
  pub fn new(program: impl Into<PathBuf>, concurrency: usize) -> Self {
    Self {
      program: program.into(),
      merge_format: String::from("mp4"),
      download_timeout: Duration::from_secs(30 * 60),
      permits: Semaphore::new(concurrency.max(1)),
    }
  }

  pub fn merge_format(self, merge_format: impl Into<String>) -> Self {
    Self {
      merge_format: merge_format.into(),
      ..self
    }
  }

  pub fn download_timeout(self, download_timeout: Duration) -> Self {
    Self {
      download_timeout,
      ..self
    }
  }

  fn command(&self, strategy: &StrategyConfig) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd
      .args(strategy.args())
      .arg("--no-playlist")
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      // an abandoned request must not leave yt-dlp running
      .kill_on_drop(true);
    cmd
  }
}

#[async_trait]
impl Engine for Ytdlp {
  async fn probe(
    &self,
    url: &str,
    strategy: &StrategyConfig,
  ) -> Result<VideoInfo, EngineError> {
    let mut cmd = self.command(strategy);
    cmd.arg("--dump-single-json").arg("--no-warnings").arg(url);
    log_command(&cmd);

    // waiting for a permit counts against the probe's own budget
    let limit = strategy.probe_timeout_secs;
    let run = async {
      let _permit = self.permits.acquire().await?;
      Ok::<_, EngineError>(cmd.output().await?)
    };
    let output = tokio::time::timeout(Duration::from_secs(limit), run)
      .await
      .map_err(|_| EngineError::Timeout(limit))??;

    detect_error(output.status, &output.stderr)?;
    Ok(serde_json::from_slice(&output.stdout)?)
  }

  async fn fetch_and_merge(
    &self,
    url: &str,
    strategy: &StrategyConfig,
    format: &str,
    output: &Path,
  ) -> Result<(), EngineError> {
    let mut cmd = self.download_command(url, strategy, format, output);
    log_command(&cmd);

    let limit = self.download_timeout;
    tokio::time::timeout(limit, self.run_download(&mut cmd))
      .await
      .map_err(|_| EngineError::Timeout(limit.as_secs()))?
  }
}

impl Ytdlp {
  fn download_command(
    &self,
    url: &str,
    strategy: &StrategyConfig,
    format: &str,
    output: &Path,
  ) -> Command {
    let mut cmd = self.command(strategy);
    cmd
      .arg("-f")
      .arg(format)
      .arg("--merge-output-format")
      .arg(&self.merge_format)
      // single-format selections are never merged, so remux them into
      // the same container
      .arg("--remux-video")
      .arg(&self.merge_format)
      .arg("-o")
      .arg(output_template(output))
      .arg("--newline")
      .arg("--no-mtime")
      .arg(url);
    cmd
  }

  async fn run_download(&self, cmd: &mut Command) -> Result<(), EngineError> {
    let _permit = self.permits.acquire().await?;
    let mut child = cmd.spawn()?;
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take())
    else {
      return Err(EngineError::Failed("yt-dlp output is not captured".into()));
    };

    let progress = async {
      let mut lines = BufReader::new(stdout).lines();
      while let Some(line) = lines.next_line().await? {
        log_progress(&line);
      }
      Ok::<_, std::io::Error>(())
    };
    let errors = async {
      let mut buf = Vec::new();
      BufReader::new(stderr).read_to_end(&mut buf).await?;
      Ok::<_, std::io::Error>(buf)
    };
    let ((), stderr, status) =
      tokio::try_join!(progress, errors, child.wait())?;

    detect_error(status, &stderr)
  }
}

// yt-dlp names the raw stream by its own extension before remuxing it to
// `output`, so only the stem is fixed
fn output_template(output: &Path) -> String {
  let stem = output.with_extension("");
  format!("{}.%(ext)s", stem.to_string_lossy().replace('%', "%%"))
}

fn log_command(cmd: &Command) {
  let cmd = cmd.as_std();
  let args = cmd.get_args().map(|arg| arg.to_string_lossy()).join(" ");
  debug!(
    "running {} {}",
    cmd.get_program().to_string_lossy(),
    redact_credentials(&args)
  );
}

fn log_progress(line: &str) {
  let line = line.trim();
  if is_progress_line(line) {
    info!("{line}");
  } else if !line.is_empty() {
    debug!("{line}");
  }
}

fn is_progress_line(line: &str) -> bool {
  (line.starts_with("[download]")
    && (line.contains('%') || line.contains("Destination")))
    || line.starts_with("[Merger]")
    || line.starts_with("[VideoRemuxer]")
    || line.contains("has already been downloaded")
}

fn detect_error(status: ExitStatus, stderr: &[u8]) -> Result<(), EngineError> {
  let stderr = String::from_utf8_lossy(stderr);
  let errors = stderr.lines().filter(|l| l.contains("ERROR:")).join("\n");

  if !errors.is_empty() {
    Err(EngineError::Failed(errors))
  } else if !status.success() {
    let last = stderr.lines().last().unwrap_or_default();
    Err(EngineError::Failed(format!("yt-dlp {status}: {last}")))
  } else {
    Ok(())
  }
}
