//! `POST /assistant`: answer a free-text question with stored data.
//!
//! The question is classified into an [`Intent`] and answered from the
//! store. No prose is generated; the client renders `data` itself.

use axum::{Json, extract::State};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use storewalk_core::{
  fiscal::FiscalWeek,
  intent::{Intent, classify},
  market::{MarketInsights, MarketNoteQuery, NoteHit, NoteSearch, TrackedNote},
  store::{TrackingStore, VisitQuery, VisitStore},
  tracking::{Enabler, EnablerQuery, GoldStarWeek, Issue, IssueQuery, Task, TaskQuery},
  transcribe::Transcriber,
  visit::{StoreStats, SummaryStats, VisitBrief},
};
use tracing::debug;

use crate::{
  AppState, Backend,
  error::{ApiError, store_err},
  market::market_insights,
};

#[derive(Debug, Deserialize)]
pub struct AssistantBody {
  pub message: String,
}

/// The data backing an answer; its shape follows the intent.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Answer {
  Tasks(Vec<Task>),
  GoldStars(GoldStarWeek),
  Issues(Vec<Issue>),
  Summary(SummaryStats),
  Stores(Vec<StoreStats>),
  Store(StoreStats),
  Visits(Vec<VisitBrief>),
  Enablers(Vec<Enabler>),
  MarketNotes(Vec<TrackedNote>),
  MarketInsights(MarketInsights),
  Notes(Vec<NoteHit>),
}

#[derive(Debug, Serialize)]
pub struct AssistantResponse {
  #[serde(flatten)]
  pub intent: Intent,
  pub data:   Answer,
}

/// The gold-star week a question refers to: a numbered week of the current
/// fiscal year, or the current week.
fn gold_star_week(week_number: Option<u32>) -> Result<FiscalWeek, ApiError> {
  let current = FiscalWeek::containing(Utc::now().date_naive());
  match week_number {
    Some(n) => Ok(FiscalWeek::from_number(current.fiscal_year(), n)?),
    None => Ok(current),
  }
}

/// Run the one store query that answers `intent`.
async fn answer<S: Backend>(store: &S, intent: &Intent) -> Result<Answer, ApiError> {
  let data = match intent.clone() {
    Intent::Tasks { status, assigned_to, store: task_store } => {
      let query = TaskQuery { status, assigned_to, store: task_store };
      Answer::Tasks(store.list_tasks(query).await.map_err(store_err)?)
    }
    Intent::GoldStars { week_number } => {
      let week = gold_star_week(week_number)?;
      Answer::GoldStars(store.gold_star_week(week).await.map_err(store_err)?)
    }
    Intent::Issues { status, kind } => {
      Answer::Issues(store.list_issues(IssueQuery { status, kind }).await.map_err(store_err)?)
    }
    Intent::SummaryStats => Answer::Summary(store.summary_stats().await.map_err(store_err)?),
    Intent::CompareStores { stores } => {
      let mut stats = Vec::with_capacity(stores.len());
      for s in stores {
        stats.push(store.store_stats(s).await.map_err(store_err)?);
      }
      Answer::Stores(stats)
    }
    Intent::StoreTrends { store: s } => {
      Answer::Store(store.store_stats(s).await.map_err(store_err)?)
    }
    Intent::SearchVisits { store: s, limit, rating } => {
      let query = VisitQuery { store: Some(s), rating, limit };
      Answer::Visits(store.search_visits(query).await.map_err(store_err)?)
    }
    Intent::Enablers { status } => {
      let query = EnablerQuery { status, week: None };
      Answer::Enablers(store.list_enablers(query).await.map_err(store_err)?)
    }
    Intent::MarketNotes { status } => {
      let query = MarketNoteQuery { status, store: None };
      Answer::MarketNotes(store.list_market_notes(query).await.map_err(store_err)?)
    }
    Intent::MarketInsights { days } => Answer::MarketInsights(market_insights(store, days).await?),
    Intent::SearchNotes { keyword } => {
      let search = NoteSearch::new(keyword).validate()?;
      Answer::Notes(store.search_notes(search).await.map_err(store_err)?)
    }
  };
  Ok(data)
}

/// `POST /assistant`
pub async fn handler<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Json(body): Json<AssistantBody>,
) -> Result<Json<AssistantResponse>, ApiError> {
  if body.message.trim().is_empty() {
    return Err(ApiError::BadRequest("message must not be blank".into()));
  }
  let intent = classify(&body.message);
  debug!(?intent, "assistant question classified");
  let data = answer(&*state.store, &intent).await?;
  Ok(Json(AssistantResponse { intent, data }))
}
