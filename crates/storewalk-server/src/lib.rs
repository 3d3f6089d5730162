//! Server wiring for Storewalk: configuration and the top-level router.

use std::{
  future::Future,
  path::{Path, PathBuf},
};

use anyhow::Context as _;
use axum::{Router, extract::DefaultBodyLimit};
use serde::Deserialize;
use storewalk_api::{AppState, Backend};
use storewalk_core::transcribe::Transcriber;
use storewalk_gemini::GeminiConfig;
use storewalk_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// Runtime server configuration, deserialised from `config.toml` layered
/// under `STOREWALK_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:           String,
  #[serde(default = "default_port")]
  pub port:           u16,
  #[serde(default = "default_store_path")]
  pub store_path:     PathBuf,
  #[serde(default = "default_photo_dir")]
  pub photo_dir:      PathBuf,
  /// Largest accepted request body; photo uploads arrive base64-encoded.
  #[serde(default = "default_max_body_bytes")]
  pub max_body_bytes: usize,
  #[serde(default)]
  pub gemini:         GeminiConfig,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/storewalk/storewalk.db") }
fn default_photo_dir() -> PathBuf { PathBuf::from("~/.local/share/storewalk/photos") }
fn default_max_body_bytes() -> usize { 32 * 1024 * 1024 }

impl ServerConfig {
  /// Load configuration from an optional TOML file, then `STOREWALK_*`
  /// environment variables. Nested keys use `__`, e.g.
  /// `STOREWALK_GEMINI__API_KEY`.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("STOREWALK")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

/// The full application: the JSON API under `/api`, traced.
pub fn app<S, T>(state: AppState<S, T>, max_body_bytes: usize) -> Router
where
  S: Backend,
  T: Transcriber + 'static,
{
  Router::new()
    .nest("/api", storewalk_api::api_router(state))
    .layer(DefaultBodyLimit::max(max_body_bytes))
    .layer(TraceLayer::new_for_http())
}

/// Serve the application on `listener` until `shutdown` resolves, then
/// close the store once in-flight requests have drained.
pub async fn run<T>(
  listener: TcpListener,
  state: AppState<SqliteStore, T>,
  max_body_bytes: usize,
  shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()>
where
  T: Transcriber + 'static,
{
  let store = SqliteStore::clone(&state.store);
  axum::serve(listener, app(state, max_body_bytes))
    .with_graceful_shutdown(shutdown)
    .await
    .context("server error")?;
  store.close().await.context("failed to close store")?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use config::FileFormat;

  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn empty_config_uses_defaults() {
    let cfg = parse("");
    assert_eq!(cfg.address(), "127.0.0.1:8080");
    assert_eq!(cfg.gemini.model, "gemini-2.5-flash");
    assert!(cfg.gemini.api_key.is_empty());
  }

  #[test]
  fn nested_gemini_section() {
    let cfg = parse(
      r#"
        port = 9000
        photo_dir = "/srv/photos"

        [gemini]
        api_key = "k"
        model = "gemini-2.0-flash"
      "#,
    );
    assert_eq!(cfg.port, 9000);
    assert_eq!(cfg.photo_dir, PathBuf::from("/srv/photos"));
    assert_eq!(cfg.gemini.api_key, "k");
    assert_eq!(cfg.gemini.model, "gemini-2.0-flash");
    assert_eq!(cfg.gemini.timeout, 120);
  }

  #[tokio::test]
  async fn api_is_nested_under_prefix() {
    use std::sync::Arc;

    use axum::{body::Body, http::{Request, StatusCode}};
    use storewalk_gemini::GeminiClient;
    use storewalk_store_sqlite::SqliteStore;
    use tower::ServiceExt as _;

    let state = AppState {
      store:       Arc::new(SqliteStore::open_in_memory().await.unwrap()),
      transcriber: Arc::new(GeminiClient::new(GeminiConfig::default()).unwrap()),
      photo_dir:   Arc::new(std::env::temp_dir()),
    };
    let router = app(state, 1024);

    let req = Request::builder().uri("/api/stats/summary").body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let req = Request::builder().uri("/stats/summary").body(Body::empty()).unwrap();
    let resp = router.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let req = Request::builder()
      .method("POST")
      .uri("/api/assistant")
      .header("content-type", "application/json")
      .body(Body::from(format!("{{\"message\": \"{}\"}}", "x".repeat(2048))))
      .unwrap();
    let resp = router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);
  }

  #[tokio::test]
  async fn shutdown_closes_the_store() {
    use std::sync::Arc;

    use storewalk_core::store::VisitStore as _;
    use storewalk_gemini::GeminiClient;

    let store = SqliteStore::open_in_memory().await.unwrap();
    let state = AppState {
      store:       Arc::new(store.clone()),
      transcriber: Arc::new(GeminiClient::new(GeminiConfig::default()).unwrap()),
      photo_dir:   Arc::new(std::env::temp_dir()),
    };
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();

    let (tx, rx) = tokio::sync::oneshot::channel::<()>();
    let server = tokio::spawn(run(listener, state, 1024, async move {
      let _ = rx.await;
    }));
    tx.send(()).unwrap();
    server.await.unwrap().unwrap();

    assert!(store.summary_stats().await.is_err());
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/x.db")), PathBuf::from(home).join("x.db"));
    assert_eq!(expand_tilde(Path::new("/abs/x.db")), PathBuf::from("/abs/x.db"));
  }
}
