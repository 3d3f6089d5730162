//! Handlers for `/visits` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/visits` | Optional `?store`; 3 most recent for a store, else 100 overall |
//! | `POST`   | `/visits` | Body: [`CreateVisitBody`]; returns 201 + detail, or 409 on duplicate |
//! | `GET`    | `/visits/duplicates` | `?store=&date=` |
//! | `GET`    | `/visits/:id` | Full detail |
//! | `PATCH`  | `/visits/:id` | Body: [`RawVisitPatch`] |
//! | `DELETE` | `/visits/:id` | Cascades to notes, metrics and photos; returns 204 |
//! | `POST`   | `/visits/:id/notes-received` | Body: `{"notes_received": bool}` |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use storewalk_core::{
  draft::{RawVisitDraft, RawVisitPatch, VisitDraft, VisitPatch},
  store::VisitStore,
  transcribe::Transcriber,
  visit::{DuplicateCheck, NewPhoto, StoreNumber, VisitBrief, VisitDetail, VisitId, parse_date},
};
use tracing::{info, warn};

use crate::{
  AppState, Backend,
  error::{ApiError, store_err},
  photos::{PhotoUpload, discard_photos, save_photos},
};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub store: Option<StoreNumber>,
}

/// `GET /visits[?store=<store>]`
pub async fn list<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<VisitBrief>>, ApiError> {
  let briefs = state.store.list_visits(params.store).await.map_err(store_err)?;
  Ok(Json(briefs))
}

// ─── Create ──────────────────────────────────────────────────────────────────

/// JSON body accepted by `POST /visits`.
#[derive(Debug, Deserialize)]
pub struct CreateVisitBody {
  #[serde(flatten)]
  pub draft:  RawVisitDraft,
  /// Save even when a visit for the same store and date exists.
  #[serde(default)]
  pub force:  bool,
  /// Sheet photos to keep alongside the visit.
  #[serde(default)]
  pub photos: Vec<PhotoUpload>,
}

/// `POST /visits`: validates everything, checks for a duplicate, then saves
/// the visit with its notes, metrics and photos in one transaction.
pub async fn create<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Json(body): Json<CreateVisitBody>,
) -> Result<impl IntoResponse, ApiError> {
  let draft = VisitDraft::from_raw(&body.draft)?;

  let check = state
    .store
    .check_duplicate(draft.store.clone(), draft.date)
    .await
    .map_err(store_err)?;
  if check.is_duplicate && !body.force {
    warn!(store = %draft.store, date = %draft.date, "duplicate visit rejected");
    return Err(ApiError::Duplicate(check));
  }

  let saved = save_photos(&state.photo_dir, &body.photos).await?;
  let photos: Vec<NewPhoto> = saved.iter().map(|s| s.photo.clone()).collect();

  let detail = match state.store.create_visit(draft, photos).await {
    Ok(detail) => detail,
    Err(e) => {
      discard_photos(&state.photo_dir, &saved).await;
      return Err(store_err(e));
    }
  };
  info!(visit_id = detail.visit().visit_id, forced = check.is_duplicate, "visit saved");
  Ok((StatusCode::CREATED, Json(detail)))
}

// ─── Duplicates ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DuplicateParams {
  pub store: StoreNumber,
  pub date:  String,
}

/// `GET /visits/duplicates?store=<store>&date=<YYYY-MM-DD>`
pub async fn duplicates<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Query(params): Query<DuplicateParams>,
) -> Result<Json<DuplicateCheck>, ApiError> {
  let date = parse_date(&params.date)?;
  let check = state.store.check_duplicate(params.store, date).await.map_err(store_err)?;
  Ok(Json(check))
}

// ─── Single visit ────────────────────────────────────────────────────────────

fn not_found(id: VisitId) -> ApiError { ApiError::NotFound(format!("visit {id} not found")) }

/// `GET /visits/:id`
pub async fn get_one<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<VisitId>,
) -> Result<Json<VisitDetail>, ApiError> {
  let detail = state
    .store
    .visit_detail(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(detail))
}

/// `PATCH /visits/:id`: edit store, date, rating or metrics. Notes are
/// edited through `/notes`.
pub async fn update<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<VisitId>,
  Json(body): Json<RawVisitPatch>,
) -> Result<Json<VisitDetail>, ApiError> {
  let patch = VisitPatch::from_raw(&body)?;
  let detail = state
    .store
    .update_visit(id, patch)
    .await
    .map_err(store_err)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(detail))
}

/// `DELETE /visits/:id`
pub async fn delete_one<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<VisitId>,
) -> Result<StatusCode, ApiError> {
  if !state.store.delete_visit(id).await.map_err(store_err)? {
    return Err(not_found(id));
  }
  Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct NotesReceivedBody {
  pub notes_received: bool,
}

/// `POST /visits/:id/notes-received`
pub async fn notes_received<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<VisitId>,
  Json(body): Json<NotesReceivedBody>,
) -> Result<Json<VisitDetail>, ApiError> {
  if !state
    .store
    .set_notes_received(id, body.notes_received)
    .await
    .map_err(store_err)?
  {
    return Err(not_found(id));
  }
  let detail = state
    .store
    .visit_detail(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| not_found(id))?;
  Ok(Json(detail))
}
