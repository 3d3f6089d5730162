//! Follow-up tracking on visit notes, plus note search.
//!
//! Market notes raised during a visit become work items: each carries a
//! [`WorkStatus`], an optional assignee, and a thread of dated updates. A
//! note with no tracking row reads as `new` and unassigned. Deleting the
//! note deletes its tracking and updates with it.

use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{
  Error, Result,
  note::{Note, NoteId},
  tracking::WorkStatus,
  visit::{Rating, StoreNumber},
};

pub type NoteUpdateId = i64;

/// Default and maximum number of note search hits.
pub const SEARCH_LIMIT: u32 = 20;
pub const MAX_SEARCH_LIMIT: u32 = 100;
/// Default look-back window for market insights.
pub const INSIGHT_DAYS: u32 = 30;

fn non_blank(raw: &str, field: &'static str) -> Result<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(Error::BlankField(field));
  }
  Ok(trimmed.to_owned())
}

// ─── Located notes ───────────────────────────────────────────────────────────

/// A note together with the visit it was taken on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteHit {
  #[serde(flatten)]
  pub note:   Note,
  pub store:  StoreNumber,
  pub date:   NaiveDate,
  pub rating: Rating,
}

/// A keyword search over every note category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteSearch {
  pub keyword: String,
  #[serde(default = "default_search_limit")]
  pub limit:   u32,
}

fn default_search_limit() -> u32 { SEARCH_LIMIT }

impl NoteSearch {
  pub fn new(keyword: impl Into<String>) -> Self {
    Self { keyword: keyword.into(), limit: SEARCH_LIMIT }
  }

  /// Trim the keyword, rejecting a blank one, and clamp the limit to
  /// `1..=MAX_SEARCH_LIMIT`.
  pub fn validate(self) -> Result<Self> {
    Ok(Self {
      keyword: non_blank(&self.keyword, "keyword")?,
      limit:   self.limit.clamp(1, MAX_SEARCH_LIMIT),
    })
  }
}

/// Market notes from visits in a recent window, newest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketInsights {
  pub period_days:        u32,
  pub since:              NaiveDate,
  pub total_market_notes: usize,
  pub notes:              Vec<NoteHit>,
}

impl MarketInsights {
  /// The first date inside a `days`-long window ending on `today`.
  pub fn window_start(today: NaiveDate, days: u32) -> NaiveDate {
    today
      .checked_sub_days(Days::new(u64::from(days)))
      .unwrap_or(NaiveDate::MIN)
  }

  pub fn new(period_days: u32, since: NaiveDate, notes: Vec<NoteHit>) -> Self {
    Self { period_days, since, total_market_notes: notes.len(), notes }
  }
}

// ─── Tracking ────────────────────────────────────────────────────────────────

/// The follow-up state of one note.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTracking {
  pub status:       WorkStatus,
  pub assigned_to:  Option<String>,
  pub completed_at: Option<DateTime<Utc>>,
}

/// One comment in a note's update thread.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteUpdate {
  pub update_id:  NoteUpdateId,
  pub note_id:    NoteId,
  pub body:       String,
  pub created_by: Option<String>,
  pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewNoteUpdate {
  #[serde(alias = "text", alias = "update_text")]
  pub body:       String,
  #[serde(default)]
  pub created_by: Option<String>,
}

impl NewNoteUpdate {
  pub fn validate(self) -> Result<Self> {
    Ok(Self {
      body:       non_blank(&self.body, "body")?,
      created_by: self.created_by.and_then(|c| non_blank(&c, "created_by").ok()),
    })
  }
}

/// A note with its tracking state and updates, newest update first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedNote {
  #[serde(flatten)]
  pub hit:      NoteHit,
  #[serde(flatten)]
  pub tracking: NoteTracking,
  pub updates:  Vec<NoteUpdate>,
}

/// A change to a note's tracking. Absent fields are left as they are; a
/// blank `assigned_to` clears the assignee.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteTrackingChange {
  #[serde(default)]
  pub status:      Option<WorkStatus>,
  #[serde(default)]
  pub assigned_to: Option<String>,
}

impl NoteTrackingChange {
  pub fn validate(self) -> Result<Self> {
    if self.status.is_none() && self.assigned_to.is_none() {
      return Err(Error::MissingField("status or assigned_to"));
    }
    Ok(self)
  }

  /// `None` leaves the assignee alone; `Some(None)` clears it.
  pub fn assignee(&self) -> Option<Option<String>> {
    self
      .assigned_to
      .as_deref()
      .map(|a| non_blank(a, "assigned_to").ok())
  }
}

/// Filters for listing tracked market notes.
///
/// Results run in progress first, then new, stalled and completed; within
/// a status, newest visit first, then by note sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketNoteQuery {
  pub status: Option<WorkStatus>,
  pub store:  Option<StoreNumber>,
}

/// Listing rank of a status: lower sorts first.
pub fn status_rank(status: WorkStatus) -> u8 {
  match status {
    WorkStatus::InProgress => 1,
    WorkStatus::New => 2,
    WorkStatus::Stalled => 3,
    WorkStatus::Completed => 4,
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
