use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod api;
mod catalog;
mod config;
mod diagnostics;
mod engine;
mod error;
mod identifier;
mod retrieval;
mod select;
mod sequencer;
mod store;
mod strategy;
mod util;

pub use error::{Error, Result};

use crate::{
  api::AppState, config::Config, engine::Ytdlp, retrieval::Retriever,
  store::OutputStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
    )
    .init();

  let config = Config::from_env()?;

  let store = OutputStore::new(&config.download_dir, &config.merge_format)
    .with_context(|| {
      format!("creating {}", config.download_dir.display())
    })?;
  let store = Arc::new(store);
  info!("serving files from {}", store.base_dir().display());

  let engine = Ytdlp::new(&config.ytdlp_path, config.ytdlp_concurrency)
    .merge_format(&config.merge_format)
    .download_timeout(config.download_timeout);

  let strategy_names: Vec<_> =
    config.strategies.iter().map(|s| s.name.as_str()).collect();
  info!("strategy sequence: {}", strategy_names.join(" -> "));

  let retriever =
    Retriever::new(Arc::new(engine), config.strategies.clone(), store.clone());
  let app = api::router(AppState {
    retriever: Arc::new(retriever),
    store,
  });

  info!("Listening on {}", config.bind);

  axum::Server::bind(&config.bind)
    .serve(app.into_make_service())
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  Ok(())
}

async fn shutdown_signal() {
  let ctrl_c = async {
    tokio::signal::ctrl_c().await.ok();
  };

  #[cfg(unix)]
  let terminate = async {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
      Ok(mut sigterm) => {
        sigterm.recv().await;
      }
      Err(_) => std::future::pending::<()>().await,
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {},
    _ = terminate => {},
  }

  info!("shutting down");
}
