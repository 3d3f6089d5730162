//! The transcriber seam: photographed visit sheets in, untrusted JSON out.

use std::future::Future;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// One image of a visit sheet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
  /// e.g. `image/jpeg`.
  pub media_type: String,
  pub bytes:      Vec<u8>,
}

/// Why a transcription attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscribeFailure {
  /// The provider's rate limit or quota was hit.
  QuotaExceeded,
  /// The provider is overloaded or down.
  Unavailable,
  /// The provider answered with something that is not a JSON object.
  MalformedResponse,
  /// Any other transport or provider failure.
  Request,
}

#[derive(Debug, Error)]
#[error("transcription failed ({kind:?}): {message}")]
pub struct TranscribeError {
  pub kind:    TranscribeFailure,
  pub message: String,
}

impl TranscribeError {
  pub fn new(kind: TranscribeFailure, message: impl Into<String>) -> Self {
    Self { kind, message: message.into() }
  }
}

/// Turns visit sheet images into a best-effort JSON object.
///
/// The returned value is untrusted; callers run it through
/// [`RawVisitDraft`](crate::draft::RawVisitDraft) validation.
pub trait Transcriber: Send + Sync {
  fn transcribe(
    &self,
    images: Vec<ImageInput>,
  ) -> impl Future<Output = Result<Value, TranscribeError>> + Send + '_;
}

/// Strip a markdown code fence (```` ```json ... ``` ````) that models
/// sometimes wrap around JSON replies.
pub fn strip_code_fence(reply: &str) -> &str {
  let trimmed = reply.trim();
  let Some(rest) = trimmed.strip_prefix("```") else {
    return trimmed;
  };
  let body = rest.split_once('\n').map_or("", |(_, body)| body);
  body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse a model reply into a JSON object.
pub fn parse_reply(reply: &str) -> Result<Value, TranscribeError> {
  let value: Value = serde_json::from_str(strip_code_fence(reply))
    .map_err(|e| TranscribeError::new(TranscribeFailure::MalformedResponse, e.to_string()))?;
  if !value.is_object() {
    return Err(TranscribeError::new(
      TranscribeFailure::MalformedResponse,
      "reply is not a JSON object",
    ));
  }
  Ok(value)
}
