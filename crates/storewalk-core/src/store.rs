//! The store traits and supporting query types.
//!
//! The traits are implemented by storage backends (e.g.
//! `storewalk-store-sqlite`). The HTTP layer depends on these abstractions,
//! not on any concrete backend.

use std::future::Future;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{
  draft::{VisitDraft, VisitPatch},
  fiscal::FiscalWeek,
  market::{
    MarketNoteQuery, NewNoteUpdate, NoteHit, NoteSearch, NoteTrackingChange, NoteUpdate,
    NoteUpdateId, TrackedNote,
  },
  note::{Note, NoteCategory, NoteId, NoteText},
  tracking::{
    Enabler, EnablerCompletion, EnablerId, EnablerQuery, EnablerStatus, GoldStarCompletion,
    GoldStarNote, GoldStarNotes, GoldStarWeek, Issue, IssueId, IssueQuery, NewEnabler, NewIssue,
    NewTask, Task, TaskId, TaskQuery, WorkStatus,
  },
  visit::{
    DuplicateCheck, NewPhoto, PhotoRef, Rating, StoreNumber, StoreStats, SummaryStats, VisitBrief,
    VisitDetail, VisitId,
  },
};

/// Briefs returned for a single store by [`VisitStore::list_visits`].
pub const RECENT_PER_STORE: u32 = 3;
/// Briefs returned across all stores by [`VisitStore::list_visits`].
pub const RECENT_OVERALL: u32 = 100;

// ─── Query type ──────────────────────────────────────────────────────────────

/// Parameters for [`VisitStore::search_visits`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitQuery {
  pub store:  Option<StoreNumber>,
  pub rating: Option<Rating>,
  pub limit:  u32,
}

impl VisitQuery {
  /// The query behind [`VisitStore::list_visits`].
  pub fn recent(store: Option<StoreNumber>) -> Self {
    let limit = if store.is_some() { RECENT_PER_STORE } else { RECENT_OVERALL };
    Self { store, rating: None, limit }
  }
}

// ─── Visits ──────────────────────────────────────────────────────────────────

/// Abstraction over a visit store backend.
///
/// Every brief listing is ordered by visit date descending, then creation
/// time descending, then id descending. Lookups by id return `None` (or
/// `false`) when the row does not exist.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait VisitStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Persist a validated visit with its notes, metrics and photo references
  /// in one transaction: either every row is written or none is.
  fn create_visit(
    &self,
    draft: VisitDraft,
    photos: Vec<NewPhoto>,
  ) -> impl Future<Output = Result<VisitDetail, Self::Error>> + Send + '_;

  /// Every visit matching `store` and `date` exactly. Advisory only: nothing
  /// is locked, so a concurrent insert can slip past the check.
  fn check_duplicate(
    &self,
    store: StoreNumber,
    date: NaiveDate,
  ) -> impl Future<Output = Result<DuplicateCheck, Self::Error>> + Send + '_;

  /// The 3 most recent visits for `store`, or the 100 most recent overall.
  fn list_visits(
    &self,
    store: Option<StoreNumber>,
  ) -> impl Future<Output = Result<Vec<VisitBrief>, Self::Error>> + Send + '_ {
    self.search_visits(VisitQuery::recent(store))
  }

  fn search_visits(
    &self,
    query: VisitQuery,
  ) -> impl Future<Output = Result<Vec<VisitBrief>, Self::Error>> + Send + '_;

  fn visit_detail(
    &self,
    id: VisitId,
  ) -> impl Future<Output = Result<Option<VisitDetail>, Self::Error>> + Send + '_;

  /// Apply an edit. Notes are untouched. Returns `None` if the visit does
  /// not exist.
  fn update_visit(
    &self,
    id: VisitId,
    patch: VisitPatch,
  ) -> impl Future<Output = Result<Option<VisitDetail>, Self::Error>> + Send + '_;

  /// Delete a visit with its notes, metrics and photo references.
  fn delete_visit(&self, id: VisitId)
  -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn set_notes_received(
    &self,
    id: VisitId,
    received: bool,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Notes ─────────────────────────────────────────────────────────────

  /// Append a note after the highest existing sequence of its category.
  fn add_note(
    &self,
    visit_id: VisitId,
    category: NoteCategory,
    body: NoteText,
  ) -> impl Future<Output = Result<Option<Note>, Self::Error>> + Send + '_;

  /// Replace a note's body; its sequence is kept.
  fn edit_note(
    &self,
    id: NoteId,
    body: NoteText,
  ) -> impl Future<Output = Result<Option<Note>, Self::Error>> + Send + '_;

  /// Delete one note. Siblings are not renumbered.
  fn delete_note(&self, id: NoteId) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Case-insensitive substring search over every note body, newest visit
  /// first.
  fn search_notes(
    &self,
    search: NoteSearch,
  ) -> impl Future<Output = Result<Vec<NoteHit>, Self::Error>> + Send + '_;

  /// Market notes from visits dated on or after `since`, newest first.
  fn market_notes_since(
    &self,
    since: NaiveDate,
  ) -> impl Future<Output = Result<Vec<NoteHit>, Self::Error>> + Send + '_;

  // ── Photos ────────────────────────────────────────────────────────────

  fn add_photo(
    &self,
    visit_id: VisitId,
    photo: NewPhoto,
  ) -> impl Future<Output = Result<Option<PhotoRef>, Self::Error>> + Send + '_;

  // ── Aggregates ────────────────────────────────────────────────────────

  fn store_stats(
    &self,
    store: StoreNumber,
  ) -> impl Future<Output = Result<StoreStats, Self::Error>> + Send + '_;

  fn summary_stats(&self) -> impl Future<Output = Result<SummaryStats, Self::Error>> + Send + '_;
}

// ─── Tracking ────────────────────────────────────────────────────────────────

/// Abstraction over task, issue, note follow-up, gold-star and enabler
/// storage.
///
/// Status writes set or clear `completed_at` in the same statement.
pub trait TrackingStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn create_task(&self, task: NewTask)
  -> impl Future<Output = Result<Task, Self::Error>> + Send + '_;

  fn list_tasks(
    &self,
    query: TaskQuery,
  ) -> impl Future<Output = Result<Vec<Task>, Self::Error>> + Send + '_;

  fn set_task_status(
    &self,
    id: TaskId,
    status: WorkStatus,
  ) -> impl Future<Output = Result<Option<Task>, Self::Error>> + Send + '_;

  fn delete_task(&self, id: TaskId) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn create_issue(
    &self,
    issue: NewIssue,
  ) -> impl Future<Output = Result<Issue, Self::Error>> + Send + '_;

  fn list_issues(
    &self,
    query: IssueQuery,
  ) -> impl Future<Output = Result<Vec<Issue>, Self::Error>> + Send + '_;

  fn set_issue_status(
    &self,
    id: IssueId,
    status: WorkStatus,
  ) -> impl Future<Output = Result<Option<Issue>, Self::Error>> + Send + '_;

  fn delete_issue(&self, id: IssueId)
  -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The gold-star notes and completions of `week`, created empty on first
  /// read.
  fn gold_star_week(
    &self,
    week: FiscalWeek,
  ) -> impl Future<Output = Result<GoldStarWeek, Self::Error>> + Send + '_;

  fn save_gold_star_notes(
    &self,
    week: FiscalWeek,
    notes: GoldStarNotes,
  ) -> impl Future<Output = Result<GoldStarWeek, Self::Error>> + Send + '_;

  /// Upsert one store's completion flag for one note of `week`.
  fn set_gold_star_completion(
    &self,
    week: FiscalWeek,
    store: StoreNumber,
    note: GoldStarNote,
    completed: bool,
  ) -> impl Future<Output = Result<GoldStarCompletion, Self::Error>> + Send + '_;

  // ── Note follow-up ────────────────────────────────────────────────────

  /// Market notes with their tracking state and update threads.
  fn list_market_notes(
    &self,
    query: MarketNoteQuery,
  ) -> impl Future<Output = Result<Vec<TrackedNote>, Self::Error>> + Send + '_;

  /// One note with its tracking state, or `None` if it does not exist.
  fn tracked_note(
    &self,
    id: NoteId,
  ) -> impl Future<Output = Result<Option<TrackedNote>, Self::Error>> + Send + '_;

  /// Upsert a note's tracking. Returns `None` if the note does not exist.
  fn set_note_tracking(
    &self,
    id: NoteId,
    change: NoteTrackingChange,
  ) -> impl Future<Output = Result<Option<TrackedNote>, Self::Error>> + Send + '_;

  fn add_note_update(
    &self,
    id: NoteId,
    update: NewNoteUpdate,
  ) -> impl Future<Output = Result<Option<NoteUpdate>, Self::Error>> + Send + '_;

  fn delete_note_update(
    &self,
    id: NoteUpdateId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Enablers ──────────────────────────────────────────────────────────

  fn create_enabler(
    &self,
    enabler: NewEnabler,
  ) -> impl Future<Output = Result<Enabler, Self::Error>> + Send + '_;

  fn list_enablers(
    &self,
    query: EnablerQuery,
  ) -> impl Future<Output = Result<Vec<Enabler>, Self::Error>> + Send + '_;

  fn set_enabler_status(
    &self,
    id: EnablerId,
    status: EnablerStatus,
  ) -> impl Future<Output = Result<Option<Enabler>, Self::Error>> + Send + '_;

  /// Delete an enabler with its completions.
  fn delete_enabler(
    &self,
    id: EnablerId,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Every store completion recorded for an enabler, by store. `None` if
  /// the enabler does not exist.
  fn enabler_completions(
    &self,
    id: EnablerId,
  ) -> impl Future<Output = Result<Option<Vec<EnablerCompletion>>, Self::Error>> + Send + '_;

  /// Upsert one store's completion of an enabler. `None` if the enabler
  /// does not exist.
  fn set_enabler_completion(
    &self,
    id: EnablerId,
    store: StoreNumber,
    completed: bool,
  ) -> impl Future<Output = Result<Option<EnablerCompletion>, Self::Error>> + Send + '_;
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recent_limits_depend_on_store() {
    assert_eq!(VisitQuery::recent(None).limit, RECENT_OVERALL);
    let store = StoreNumber::parse("1234").unwrap();
    assert_eq!(VisitQuery::recent(Some(store)).limit, RECENT_PER_STORE);
  }
}
