//! Handlers for note search and market-note follow-up.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/notes/search` | `q` required, optional `limit` |
//! | `GET`    | `/market-notes` | Optional `status`, `store` |
//! | `GET`    | `/market-notes/insights` | Optional `days` (default 30) |
//! | `GET`    | `/notes/:id/status` | Tracking state and updates |
//! | `PUT`    | `/notes/:id/status` | Body: [`NoteTrackingChange`] |
//! | `POST`   | `/notes/:id/updates` | Body: [`NewNoteUpdate`]; returns 201 |
//! | `DELETE` | `/note-updates/:id` | 204 |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::Utc;
use serde::Deserialize;
use storewalk_core::{
  market::{
    INSIGHT_DAYS, MarketInsights, MarketNoteQuery, NewNoteUpdate, NoteHit, NoteSearch,
    NoteTrackingChange, NoteUpdateId, SEARCH_LIMIT, TrackedNote,
  },
  note::NoteId,
  store::{TrackingStore, VisitStore},
  tracking::WorkStatus,
  transcribe::Transcriber,
  visit::StoreNumber,
};

use crate::{
  AppState, Backend,
  error::{ApiError, store_err},
  tracking::filter,
};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
  #[serde(default, alias = "keyword")]
  pub q:     String,
  pub limit: Option<u32>,
}

/// `GET /notes/search`
pub async fn search<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Query(params): Query<SearchParams>,
) -> Result<Json<Vec<NoteHit>>, ApiError> {
  let search = NoteSearch {
    keyword: params.q,
    limit:   params.limit.unwrap_or(SEARCH_LIMIT),
  }
  .validate()?;
  Ok(Json(state.store.search_notes(search).await.map_err(store_err)?))
}

#[derive(Debug, Deserialize)]
pub struct InsightParams {
  pub days: Option<u32>,
}

/// `GET /market-notes/insights`
pub async fn insights<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Query(params): Query<InsightParams>,
) -> Result<Json<MarketInsights>, ApiError> {
  let days = params.days.unwrap_or(INSIGHT_DAYS);
  Ok(Json(market_insights(&*state.store, days).await?))
}

/// Market notes from the `days` up to and including today.
pub(crate) async fn market_insights<S: Backend>(
  store: &S,
  days: u32,
) -> Result<MarketInsights, ApiError> {
  let since = MarketInsights::window_start(Utc::now().date_naive(), days);
  let notes = store.market_notes_since(since).await.map_err(store_err)?;
  Ok(MarketInsights::new(days, since, notes))
}

#[derive(Debug, Deserialize)]
pub struct MarketNoteParams {
  pub status: Option<String>,
  pub store:  Option<String>,
}

/// `GET /market-notes`
pub async fn list<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Query(params): Query<MarketNoteParams>,
) -> Result<Json<Vec<TrackedNote>>, ApiError> {
  let query = MarketNoteQuery {
    status: filter(params.status.as_deref(), WorkStatus::parse)?,
    store:  filter(params.store.as_deref(), StoreNumber::parse)?,
  };
  Ok(Json(state.store.list_market_notes(query).await.map_err(store_err)?))
}

/// `GET /notes/:id/status`
pub async fn get_tracking<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<NoteId>,
) -> Result<Json<TrackedNote>, ApiError> {
  let note = state
    .store
    .tracked_note(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("note {id} not found")))?;
  Ok(Json(note))
}

/// `PUT /notes/:id/status`
pub async fn set_tracking<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<NoteId>,
  Json(body): Json<NoteTrackingChange>,
) -> Result<Json<TrackedNote>, ApiError> {
  let change = body.validate()?;
  let note = state
    .store
    .set_note_tracking(id, change)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("note {id} not found")))?;
  Ok(Json(note))
}

/// `POST /notes/:id/updates`
pub async fn add_update<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<NoteId>,
  Json(body): Json<NewNoteUpdate>,
) -> Result<impl IntoResponse, ApiError> {
  let update = body.validate()?;
  let update = state
    .store
    .add_note_update(id, update)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("note {id} not found")))?;
  Ok((StatusCode::CREATED, Json(update)))
}

/// `DELETE /note-updates/:id`
pub async fn delete_update<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<NoteUpdateId>,
) -> Result<StatusCode, ApiError> {
  if !state.store.delete_note_update(id).await.map_err(store_err)? {
    return Err(ApiError::NotFound(format!("note update {id} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}
