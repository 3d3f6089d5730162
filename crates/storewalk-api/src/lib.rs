//! JSON REST API for Storewalk.
//!
//! Exposes an axum [`Router`] backed by any store implementing both
//! [`VisitStore`] and [`TrackingStore`], plus a [`Transcriber`] for reading
//! photographed visit sheets. Auth, TLS, and transport concerns are the
//! caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", storewalk_api::api_router(state))
//! ```

pub mod analyze;
pub mod assistant;
pub mod error;
pub mod market;
pub mod notes;
pub mod photos;
pub mod stats;
pub mod tracking;
pub mod visits;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{delete, get, post, put},
};
use storewalk_core::{
  store::{TrackingStore, VisitStore},
  transcribe::Transcriber,
};

pub use error::ApiError;

/// A backend usable by the API: one store serving visits and tracking.
pub trait Backend: VisitStore + TrackingStore + 'static {}

impl<T: VisitStore + TrackingStore + 'static> Backend for T {}

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers.
pub struct AppState<S, T> {
  pub store:       Arc<S>,
  pub transcriber: Arc<T>,
  /// Directory uploaded photos are written to.
  pub photo_dir:   Arc<PathBuf>,
}

impl<S, T> Clone for AppState<S, T> {
  fn clone(&self) -> Self {
    Self {
      store:       Arc::clone(&self.store),
      transcriber: Arc::clone(&self.transcriber),
      photo_dir:   Arc::clone(&self.photo_dir),
    }
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router over `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, T>(state: AppState<S, T>) -> Router<()>
where
  S: Backend,
  T: Transcriber + 'static,
{
  Router::new()
    // Visits
    .route("/visits", get(visits::list::<S, T>).post(visits::create::<S, T>))
    .route("/visits/duplicates", get(visits::duplicates::<S, T>))
    .route("/visits/analyze", post(analyze::handler::<S, T>))
    .route(
      "/visits/{id}",
      get(visits::get_one::<S, T>)
        .patch(visits::update::<S, T>)
        .delete(visits::delete_one::<S, T>),
    )
    .route("/visits/{id}/notes-received", post(visits::notes_received::<S, T>))
    // Notes
    .route("/visits/{id}/notes", post(notes::create::<S, T>))
    .route("/notes/search", get(market::search::<S, T>))
    .route("/notes/{id}", put(notes::edit::<S, T>).delete(notes::delete_one::<S, T>))
    // Market-note follow-up
    .route("/market-notes", get(market::list::<S, T>))
    .route("/market-notes/insights", get(market::insights::<S, T>))
    .route(
      "/notes/{id}/status",
      get(market::get_tracking::<S, T>).put(market::set_tracking::<S, T>),
    )
    .route("/notes/{id}/updates", post(market::add_update::<S, T>))
    .route("/note-updates/{id}", delete(market::delete_update::<S, T>))
    // Photos
    .route("/visits/{id}/photos", post(photos::upload::<S, T>))
    // Aggregates and calendar
    .route("/stats/summary", get(stats::summary::<S, T>))
    .route("/stats/stores/{store}", get(stats::store::<S, T>))
    .route("/weeks/{date}", get(stats::week_of))
    .route("/weeks/{year}/{number}", get(stats::week_numbered))
    // Gold stars
    .route(
      "/gold-stars/{date}",
      get(tracking::gold_stars::<S, T>).put(tracking::save_gold_stars::<S, T>),
    )
    .route("/gold-stars/{date}/completions", post(tracking::complete_gold_star::<S, T>))
    // Tasks
    .route("/tasks", get(tracking::list_tasks::<S, T>).post(tracking::create_task::<S, T>))
    .route("/tasks/{id}", delete(tracking::delete_task::<S, T>))
    .route("/tasks/{id}/status", put(tracking::task_status::<S, T>))
    // Issues
    .route("/issues", get(tracking::list_issues::<S, T>).post(tracking::create_issue::<S, T>))
    .route("/issues/{id}", delete(tracking::delete_issue::<S, T>))
    .route("/issues/{id}/status", put(tracking::issue_status::<S, T>))
    // Enablers
    .route(
      "/enablers",
      get(tracking::list_enablers::<S, T>).post(tracking::create_enabler::<S, T>),
    )
    .route("/enablers/{id}", delete(tracking::delete_enabler::<S, T>))
    .route("/enablers/{id}/status", put(tracking::enabler_status::<S, T>))
    .route(
      "/enablers/{id}/completions",
      get(tracking::enabler_completions::<S, T>).post(tracking::complete_enabler::<S, T>),
    )
    // Assistant
    .route("/assistant", post(assistant::handler::<S, T>))
    .with_state(state)
}
