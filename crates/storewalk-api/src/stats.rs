//! Aggregate statistics and fiscal calendar lookups.

use axum::{
  Json,
  extract::{Path, State},
};
use storewalk_core::{
  fiscal::FiscalWeek,
  store::VisitStore,
  transcribe::Transcriber,
  visit::{StoreNumber, StoreStats, SummaryStats, parse_date},
};

use crate::{
  AppState, Backend,
  error::{ApiError, store_err},
};

/// `GET /stats/summary`
pub async fn summary<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
) -> Result<Json<SummaryStats>, ApiError> {
  Ok(Json(state.store.summary_stats().await.map_err(store_err)?))
}

/// `GET /stats/stores/:store`
pub async fn store<S: Backend, T: Transcriber>(
  State(state): State<AppState<S, T>>,
  Path(store): Path<String>,
) -> Result<Json<StoreStats>, ApiError> {
  let store = StoreNumber::parse(&store)?;
  Ok(Json(state.store.store_stats(store).await.map_err(store_err)?))
}

/// `GET /weeks/:date`: the fiscal week containing `date`.
pub async fn week_of(Path(date): Path<String>) -> Result<Json<FiscalWeek>, ApiError> {
  Ok(Json(FiscalWeek::containing(parse_date(&date)?)))
}

/// `GET /weeks/:year/:number`
pub async fn week_numbered(
  Path((year, number)): Path<(i32, u32)>,
) -> Result<Json<FiscalWeek>, ApiError> {
  Ok(Json(FiscalWeek::from_number(year, number)?))
}
