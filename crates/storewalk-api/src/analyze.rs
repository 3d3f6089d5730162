//! `POST /visits/analyze`: read photographed visit sheets into a draft.
//!
//! The transcriber's output is untrusted. It is read leniently into a
//! [`PartialVisitDraft`] for review: unreadable fields come back empty with a
//! warning rather than failing the request. Nothing is persisted; the client
//! submits the reviewed draft to `POST /visits`.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use storewalk_core::{
  draft::{PartialVisitDraft, RawVisitDraft},
  store::VisitStore,
  transcribe::{ImageInput, Transcriber},
  visit::DuplicateCheck,
};
use tracing::{info, warn};

use crate::{
  AppState, Backend,
  error::{ApiError, store_err},
  photos::PhotoUpload,
};

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
  pub images: Vec<PhotoUpload>,
}

#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
  pub draft:     PartialVisitDraft,
  /// Present when both store and date were read.
  pub duplicate: Option<DuplicateCheck>,
}

/// `POST /visits/analyze`
pub async fn handler<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Json(body): Json<AnalyzeBody>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
  if body.images.is_empty() {
    return Err(ApiError::BadRequest("at least one image is required".into()));
  }
  let images = body
    .images
    .iter()
    .map(|image| {
      Ok(ImageInput {
        media_type: image.media_type.trim().to_ascii_lowercase(),
        bytes:      image.decode()?,
      })
    })
    .collect::<Result<Vec<_>, ApiError>>()?;

  let count = images.len();
  let value = state.transcriber.transcribe(images).await.map_err(|e| {
    warn!(kind = ?e.kind, error = %e.message, "transcription failed");
    ApiError::Transcription(e)
  })?;

  let raw: RawVisitDraft = match serde_json::from_value(value) {
    Ok(raw) => raw,
    Err(e) => {
      warn!(error = %e, "transcription output did not match the draft shape");
      RawVisitDraft::default()
    }
  };
  let draft = PartialVisitDraft::from_raw(&raw);
  info!(images = count, warnings = draft.warnings.len(), "visit sheet analyzed");

  let duplicate = match (&draft.store, draft.date) {
    (Some(store), Some(date)) => {
      Some(state.store.check_duplicate(store.clone(), date).await.map_err(store_err)?)
    }
    _ => None,
  };

  Ok(Json(AnalyzeResponse { draft, duplicate }))
}
