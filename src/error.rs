use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::{error, warn};

use crate::{diagnostics, sequencer::StrategyFailure};

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Invalid YouTube URL")]
  InvalidUrl,
  #[error("Could not extract video ID")]
  IdentifierNotFound,
  #[error("Extraction failed")]
  ExtractionFailed(Vec<StrategyFailure>),
  #[error("No suitable format found")]
  NoSuitableFormat,
  #[error("Download failed")]
  DownloadFailed(String),
  #[error("File not found")]
  FileNotFound,
  #[error("Internal server error")]
  IO(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Error::InvalidUrl | Error::IdentifierNotFound | Error::NoSuitableFormat => {
        StatusCode::BAD_REQUEST
      }
      Error::FileNotFound => StatusCode::NOT_FOUND,
      Error::ExtractionFailed(_) | Error::DownloadFailed(_) | Error::IO(_) => {
        StatusCode::INTERNAL_SERVER_ERROR
      }
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    let mut body = json!({ "error": self.to_string() });

    match &self {
      Error::ExtractionFailed(failures) => {
        let details: Vec<_> = failures.iter().map(|f| f.to_string()).collect();
        let solutions =
          diagnostics::solutions(failures.iter().map(|f| f.summary.as_str()));
        warn!("extraction failed: {}", details.join("; "));
        body["details"] = json!(details);
        body["solutions"] = json!(solutions);
      }
      Error::DownloadFailed(details) => {
        warn!("download failed: {details}");
        body["details"] = json!(details);
        body["solutions"] = json!(diagnostics::solutions([details.as_str()]));
      }
      Error::IO(err) => error!("io error: {err}"),
      _ => {}
    }

    (status, Json(body)).into_response()
  }
}
