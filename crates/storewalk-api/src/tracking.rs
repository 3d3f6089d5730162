//! Handlers for tasks, issues, enablers and weekly gold stars.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/tasks` | Optional `status`, `assigned_to`, `store` |
//! | `POST`   | `/tasks` | Body: [`NewTask`]; returns 201 |
//! | `PUT`    | `/tasks/:id/status` | Body: `{"status":"..."}` |
//! | `DELETE` | `/tasks/:id` | 204 |
//! | `GET`    | `/issues` | Optional `status`, `kind` |
//! | `POST`   | `/issues` | Body: [`NewIssueBody`]; returns 201 |
//! | `PUT`    | `/issues/:id/status` | Body: `{"status":"..."}` |
//! | `DELETE` | `/issues/:id` | 204 |
//! | `GET`    | `/gold-stars/:date` | Week containing `date` |
//! | `PUT`    | `/gold-stars/:date` | Body: [`GoldStarNotes`] |
//! | `POST`   | `/gold-stars/:date/completions` | Body: [`CompletionBody`] |
//! | `GET`    | `/enablers` | Optional `status`, `week` (any date in the week) |
//! | `POST`   | `/enablers` | Body: [`NewEnabler`]; returns 201 |
//! | `PUT`    | `/enablers/:id/status` | Body: `{"status":"..."}` |
//! | `DELETE` | `/enablers/:id` | 204 |
//! | `GET`    | `/enablers/:id/completions` | Per-store completions |
//! | `POST`   | `/enablers/:id/completions` | Body: [`EnablerCompletionBody`] |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use storewalk_core::{
  fiscal::FiscalWeek,
  store::TrackingStore,
  tracking::{
    Enabler, EnablerCompletion, EnablerId, EnablerQuery, EnablerStatus, GoldStarCompletion,
    GoldStarNote, GoldStarNotes, GoldStarWeek, Issue, IssueId, IssueKind, IssueQuery, NewEnabler,
    NewIssue, NewTask, Task, TaskId, TaskQuery, WorkStatus,
  },
  transcribe::Transcriber,
  visit::{StoreNumber, parse_date},
};

use crate::{
  AppState, Backend,
  error::{ApiError, store_err},
};

/// Parse an optional query filter; a blank value means no filter.
pub(crate) fn filter<T>(
  raw: Option<&str>,
  parse: fn(&str) -> storewalk_core::Result<T>,
) -> Result<Option<T>, ApiError> {
  match raw.map(str::trim) {
    None | Some("") => Ok(None),
    Some(v) => Ok(Some(parse(v)?)),
  }
}

#[derive(Debug, Deserialize)]
pub struct StatusBody {
  pub status: String,
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TaskParams {
  pub status:      Option<String>,
  pub assigned_to: Option<String>,
  pub store:       Option<String>,
}

/// `GET /tasks`
pub async fn list_tasks<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Query(params): Query<TaskParams>,
) -> Result<Json<Vec<Task>>, ApiError> {
  let query = TaskQuery {
    status:      filter(params.status.as_deref(), WorkStatus::parse)?,
    assigned_to: params.assigned_to.filter(|a| !a.trim().is_empty()),
    store:       filter(params.store.as_deref(), StoreNumber::parse)?,
  };
  Ok(Json(state.store.list_tasks(query).await.map_err(store_err)?))
}

/// `POST /tasks`
pub async fn create_task<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Json(body): Json<NewTask>,
) -> Result<impl IntoResponse, ApiError> {
  let task = body.validate()?;
  let task = state.store.create_task(task).await.map_err(store_err)?;
  Ok((StatusCode::CREATED, Json(task)))
}

/// `PUT /tasks/:id/status`
pub async fn task_status<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<TaskId>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Task>, ApiError> {
  let status = WorkStatus::parse(&body.status)?;
  let task = state
    .store
    .set_task_status(id, status)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("task {id} not found")))?;
  Ok(Json(task))
}

/// `DELETE /tasks/:id`
pub async fn delete_task<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<TaskId>,
) -> Result<StatusCode, ApiError> {
  if !state.store.delete_task(id).await.map_err(store_err)? {
    return Err(ApiError::NotFound(format!("task {id} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Issues ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct IssueParams {
  pub status: Option<String>,
  pub kind:   Option<String>,
}

/// JSON body accepted by `POST /issues`.
#[derive(Debug, Deserialize)]
pub struct NewIssueBody {
  #[serde(alias = "type")]
  pub kind:        String,
  pub title:       String,
  #[serde(default)]
  pub description: Option<String>,
}

/// `GET /issues`
pub async fn list_issues<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Query(params): Query<IssueParams>,
) -> Result<Json<Vec<Issue>>, ApiError> {
  let query = IssueQuery {
    status: filter(params.status.as_deref(), WorkStatus::parse)?,
    kind:   filter(params.kind.as_deref(), IssueKind::parse)?,
  };
  Ok(Json(state.store.list_issues(query).await.map_err(store_err)?))
}

/// `POST /issues`
pub async fn create_issue<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Json(body): Json<NewIssueBody>,
) -> Result<impl IntoResponse, ApiError> {
  let issue = NewIssue {
    kind:        IssueKind::parse(&body.kind)?,
    title:       body.title,
    description: body.description,
  }
  .validate()?;
  let issue = state.store.create_issue(issue).await.map_err(store_err)?;
  Ok((StatusCode::CREATED, Json(issue)))
}

/// `PUT /issues/:id/status`
pub async fn issue_status<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<IssueId>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Issue>, ApiError> {
  let status = WorkStatus::parse(&body.status)?;
  let issue = state
    .store
    .set_issue_status(id, status)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("issue {id} not found")))?;
  Ok(Json(issue))
}

/// `DELETE /issues/:id`
pub async fn delete_issue<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<IssueId>,
) -> Result<StatusCode, ApiError> {
  if !state.store.delete_issue(id).await.map_err(store_err)? {
    return Err(ApiError::NotFound(format!("issue {id} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}

// ─── Gold stars ──────────────────────────────────────────────────────────────

fn week_of(date: &str) -> Result<FiscalWeek, ApiError> {
  Ok(FiscalWeek::containing(parse_date(date)?))
}

/// `GET /gold-stars/:date`
pub async fn gold_stars<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(date): Path<String>,
) -> Result<Json<GoldStarWeek>, ApiError> {
  let week = week_of(&date)?;
  Ok(Json(state.store.gold_star_week(week).await.map_err(store_err)?))
}

/// `PUT /gold-stars/:date`
pub async fn save_gold_stars<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(date): Path<String>,
  Json(body): Json<GoldStarNotes>,
) -> Result<Json<GoldStarWeek>, ApiError> {
  let week = week_of(&date)?;
  Ok(Json(state.store.save_gold_star_notes(week, body).await.map_err(store_err)?))
}

#[derive(Debug, Deserialize)]
pub struct CompletionBody {
  pub store:       String,
  pub note_number: u8,
  pub completed:   bool,
}

/// `POST /gold-stars/:date/completions`
pub async fn complete_gold_star<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(date): Path<String>,
  Json(body): Json<CompletionBody>,
) -> Result<Json<GoldStarCompletion>, ApiError> {
  let week = week_of(&date)?;
  let store = StoreNumber::parse(&body.store)?;
  let note = GoldStarNote::new(body.note_number)?;
  let completion = state
    .store
    .set_gold_star_completion(week, store, note, body.completed)
    .await
    .map_err(store_err)?;
  Ok(Json(completion))
}

// ─── Enablers ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EnablerParams {
  pub status: Option<String>,
  pub week:   Option<String>,
}

/// `GET /enablers`
pub async fn list_enablers<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Query(params): Query<EnablerParams>,
) -> Result<Json<Vec<Enabler>>, ApiError> {
  let week = filter(params.week.as_deref(), parse_date)?;
  let query = EnablerQuery {
    status: filter(params.status.as_deref(), EnablerStatus::parse)?,
    week:   week.map(FiscalWeek::containing),
  };
  Ok(Json(state.store.list_enablers(query).await.map_err(store_err)?))
}

/// `POST /enablers`
pub async fn create_enabler<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Json(body): Json<NewEnabler>,
) -> Result<impl IntoResponse, ApiError> {
  let enabler = body.validate()?;
  let enabler = state.store.create_enabler(enabler).await.map_err(store_err)?;
  Ok((StatusCode::CREATED, Json(enabler)))
}

/// `PUT /enablers/:id/status`
pub async fn enabler_status<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<EnablerId>,
  Json(body): Json<StatusBody>,
) -> Result<Json<Enabler>, ApiError> {
  let status = EnablerStatus::parse(&body.status)?;
  let enabler = state
    .store
    .set_enabler_status(id, status)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("enabler {id} not found")))?;
  Ok(Json(enabler))
}

/// `DELETE /enablers/:id`
pub async fn delete_enabler<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<EnablerId>,
) -> Result<StatusCode, ApiError> {
  if !state.store.delete_enabler(id).await.map_err(store_err)? {
    return Err(ApiError::NotFound(format!("enabler {id} not found")));
  }
  Ok(StatusCode::NO_CONTENT)
}

/// `GET /enablers/:id/completions`
pub async fn enabler_completions<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<EnablerId>,
) -> Result<Json<Vec<EnablerCompletion>>, ApiError> {
  let completions = state
    .store
    .enabler_completions(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("enabler {id} not found")))?;
  Ok(Json(completions))
}

#[derive(Debug, Deserialize)]
pub struct EnablerCompletionBody {
  pub store:     String,
  pub completed: bool,
}

/// `POST /enablers/:id/completions`
pub async fn complete_enabler<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(id): Path<EnablerId>,
  Json(body): Json<EnablerCompletionBody>,
) -> Result<Json<EnablerCompletion>, ApiError> {
  let store = StoreNumber::parse(&body.store)?;
  let completion = state
    .store
    .set_enabler_completion(id, store, body.completed)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("enabler {id} not found")))?;
  Ok(Json(completion))
}
