//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use storewalk_core::{
  transcribe::{TranscribeError, TranscribeFailure},
  visit::DuplicateCheck,
};
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("invalid input: {0}")]
  Validation(#[from] storewalk_core::Error),

  /// A visit for the same store and date already exists.
  #[error("a visit for this store and date already exists")]
  Duplicate(DuplicateCheck),

  #[error(transparent)]
  Transcription(#[from] TranscribeError),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("io error: {0}")]
  Io(#[from] std::io::Error),
}

/// Box a backend error into [`ApiError::Store`].
pub(crate) fn store_err<E>(e: E) -> ApiError
where
  E: std::error::Error + Send + Sync + 'static,
{
  ApiError::Store(Box::new(e))
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
      ApiError::Duplicate(check) => {
        let body = json!({ "error": self.to_string(), "duplicate": check });
        return (StatusCode::CONFLICT, Json(body)).into_response();
      }
      ApiError::Transcription(e) => {
        let status = match e.kind {
          TranscribeFailure::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
          TranscribeFailure::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
          TranscribeFailure::MalformedResponse | TranscribeFailure::Request => {
            StatusCode::BAD_GATEWAY
          }
        };
        let body = json!({ "error": e.message, "kind": e.kind });
        return (status, Json(body)).into_response();
      }
      ApiError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
      ApiError::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
