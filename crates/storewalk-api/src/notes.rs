//! Handlers for single-note edits.
//!
//! Appends take the next sequence after the category's highest; edits keep
//! the sequence; deletes leave a gap.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use storewalk_core::{
  note::{Note, NoteCategory, NoteId, NoteText},
  store::VisitStore,
  transcribe::Transcriber,
  visit::VisitId,
};

use crate::{
  AppState, Backend,
  error::{ApiError, store_err},
};

#[derive(Debug, Deserialize)]
pub struct NewNoteBody {
  pub category: String,
  pub text:     String,
}

/// `POST /visits/:id/notes`: returns 201 + the stored note.
pub async fn create<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(visit_id): Path<VisitId>,
  Json(body): Json<NewNoteBody>,
) -> Result<impl IntoResponse, ApiError> {
  let category = NoteCategory::parse(&body.category)?;
  let text = NoteText::parse(&body.text)?;
  let note = state
    .store
    .add_note(visit_id, category, text)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("visit {visit_id} not found")))?;
  Ok((StatusCode::CREATED, Json(note)))
}

#[derive(Debug, Deserialize)]
pub struct EditNoteBody {
  pub text: String,
}

/// `PUT /notes/:id`
pub async fn edit<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<NoteId>,
  Json(body): Json<EditNoteBody>,
) -> Result<Json<Note>, ApiError> {
  let text = NoteText::parse(&body.text)?;
  let note = state
    .store
    .edit_note(id, text)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("note {id} not found")))?;
  Ok(Json(note))
}

/// `DELETE /notes/:id`
pub async fn delete_one<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<NoteId>,
) -> Result<StatusCode, ApiError> {
  if !state.store.delete_note(id).await.map_err(store_err)? {
    return Err(ApiError::NotFound(format!("note {id} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}
