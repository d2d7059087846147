use std::sync::Arc;

use axum::{
  body::StreamBody,
  extract::{Path, State},
  http::{header, StatusCode, Uri},
  response::IntoResponse,
  routing::get,
  Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tokio_util::io::ReaderStream;

use crate::{
  retrieval::{Metadata, Retrieval, Retriever},
  store::OutputStore,
  Error, Result,
};

#[derive(Clone)]
pub struct AppState {
  pub retriever: Arc<Retriever>,
  pub store: Arc<OutputStore>,
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/", get(index))
    .route("/health", get(health))
    .route("/favicon.ico", get(favicon))
    .route("/files/:filename", get(serve_file))
    // everything else is a video url
    .fallback(get(download).head(method_not_allowed))
    .with_state(state)
}

async fn index() -> impl IntoResponse {
  Json(json!({
    "service": "YouTube Downloader API",
    "status": "running",
    "usage": "Add YouTube URL after domain",
  }))
}

async fn health() -> impl IntoResponse {
  "ok".to_owned()
}

async fn favicon() -> StatusCode {
  StatusCode::NO_CONTENT
}

// a HEAD would otherwise run the GET handler and start a retrieval
async fn method_not_allowed() -> StatusCode {
  StatusCode::METHOD_NOT_ALLOWED
}

#[derive(Debug, Serialize)]
pub struct DownloadResponse {
  #[serde(flatten)]
  metadata: Metadata,
  download_url: String,
  video_id: String,
  status: &'static str,
}

impl From<Retrieval> for DownloadResponse {
  fn from(retrieval: Retrieval) -> Self {
    Self {
      metadata: retrieval.metadata,
      download_url: format!("/files/{}", retrieval.filename),
      video_id: retrieval.video_id.to_string(),
      status: "success",
    }
  }
}

#[axum::debug_handler]
async fn download(
  State(state): State<AppState>,
  uri: Uri,
) -> Result<Json<DownloadResponse>> {
  let raw_url = raw_video_url(&uri);
  let retrieval = state.retriever.retrieve(&raw_url).await?;
  Ok(Json(retrieval.into()))
}

// the request path minus its leading slash, percent-decoded, with the
// original query string put back
fn raw_video_url(uri: &Uri) -> String {
  let path = uri.path().trim_start_matches('/');
  let mut url = urlencoding::decode(path)
    .map(|decoded| decoded.into_owned())
    .unwrap_or_else(|_| path.to_string());

  if let Some(query) = uri.query() {
    url.push('?');
    url.push_str(query);
  }
  url
}

async fn serve_file(
  State(state): State<AppState>,
  Path(filename): Path<String>,
) -> Result<impl IntoResponse> {
  let path = state.store.resolve(&filename).ok_or(Error::FileNotFound)?;
  let file = tokio::fs::File::open(&path)
    .await
    .map_err(|_| Error::FileNotFound)?;
  let len = file.metadata().await?.len();

  let headers = [
    (header::CONTENT_TYPE, mime_type(&filename).to_string()),
    (
      header::CONTENT_DISPOSITION,
      format!("attachment; filename=\"{filename}\""),
    ),
    (header::CONTENT_LENGTH, len.to_string()),
  ];
  let body = StreamBody::new(ReaderStream::new(file));

  Ok((headers, body))
}

fn mime_type(filename: &str) -> &'static str {
  match filename.rsplit_once('.').map(|(_, ext)| ext) {
    Some("mp4") | Some("m4v") => "video/mp4",
    Some("webm") => "video/webm",
    Some("mkv") => "video/x-matroska",
    _ => "application/octet-stream",
  }
}
