//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with microsecond precision so
//! that lexical order matches time order. Dates are stored as `YYYY-MM-DD`.
//! Enumerations are stored by their canonical lowercase name.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use storewalk_core::{
  market::{NoteHit, NoteTracking, NoteUpdate, TrackedNote},
  metric::{Metric, MetricValue, Metrics},
  note::{Note, NoteCategory, NoteText},
  tracking::{
    Enabler, EnablerCompletion, EnablerStatus, GoldStarCompletion, GoldStarNote, GoldStarNotes,
    GoldStarWeek, Issue, IssueKind, Task, WorkStatus,
  },
  visit::{NotePreview, PhotoRef, Rating, StoreNumber, Visit, VisitBrief, VisitDetail},
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

// ─── NaiveDate ───────────────────────────────────────────────────────────────

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

// ─── Enumerations ────────────────────────────────────────────────────────────

/// Stored enumerations and store numbers were validated on the way in, so a
/// failure here means the row was written by something else.
fn decode_with<T>(
  s: &str,
  what: &str,
  parse: impl FnOnce(&str) -> storewalk_core::Result<T>,
) -> Result<T> {
  parse(s).map_err(|e| Error::Decode(format!("{what} {s:?}: {e}")))
}

pub fn decode_store(s: &str) -> Result<StoreNumber> {
  decode_with(s, "store number", StoreNumber::parse)
}

pub fn decode_rating(s: &str) -> Result<Rating> { decode_with(s, "rating", Rating::parse) }

pub fn decode_category(s: &str) -> Result<NoteCategory> {
  decode_with(s, "note category", NoteCategory::parse)
}

pub fn decode_metric(s: &str) -> Result<Metric> { decode_with(s, "metric", Metric::lookup) }

pub fn decode_status(s: &str) -> Result<WorkStatus> { decode_with(s, "status", WorkStatus::parse) }

pub fn decode_issue_kind(s: &str) -> Result<IssueKind> {
  decode_with(s, "issue kind", IssueKind::parse)
}

pub fn decode_enabler_status(s: &str) -> Result<EnablerStatus> {
  decode_with(s, "enabler status", EnablerStatus::parse)
}

fn decode_count(n: i64) -> u32 { u32::try_from(n).unwrap_or(u32::MAX) }

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `visits` row.
pub struct RawVisit {
  pub visit_id:       i64,
  pub store_number:   String,
  pub visit_date:     String,
  pub rating:         String,
  pub notes_received: bool,
  pub created_at:     String,
}

/// Column list matching [`RawVisit::from_row`].
pub const VISIT_COLUMNS: &str =
  "visit_id, store_number, visit_date, rating, notes_received, created_at";

impl RawVisit {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      visit_id:       row.get(0)?,
      store_number:   row.get(1)?,
      visit_date:     row.get(2)?,
      rating:         row.get(3)?,
      notes_received: row.get(4)?,
      created_at:     row.get(5)?,
    })
  }

  pub fn into_visit(self) -> Result<Visit> {
    Ok(Visit {
      visit_id:       self.visit_id,
      store:          decode_store(&self.store_number)?,
      date:           decode_date(&self.visit_date)?,
      rating:         decode_rating(&self.rating)?,
      notes_received: self.notes_received,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}

/// One category's preview: `(category, note count, first body)`.
pub type RawPreview = (String, i64, Option<String>);

pub struct RawBrief {
  pub visit:    RawVisit,
  pub previews: Vec<RawPreview>,
}

impl RawBrief {
  pub fn into_brief(self) -> Result<VisitBrief> {
    let mut previews = BTreeMap::new();
    for (category, count, first) in self.previews {
      previews.insert(
        decode_category(&category)?,
        NotePreview::new(decode_count(count), first.as_deref()),
      );
    }
    Ok(VisitBrief::new(self.visit.into_visit()?, previews))
  }
}

/// Raw values read directly from a `visit_notes` row.
pub struct RawNote {
  pub note_id:    i64,
  pub visit_id:   i64,
  pub category:   String,
  pub sequence:   i64,
  pub body:       String,
  pub created_at: String,
}

pub const NOTE_COLUMNS: &str = "note_id, visit_id, category, sequence, body, created_at";

impl RawNote {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      note_id:    row.get(0)?,
      visit_id:   row.get(1)?,
      category:   row.get(2)?,
      sequence:   row.get(3)?,
      body:       row.get(4)?,
      created_at: row.get(5)?,
    })
  }

  pub fn into_note(self) -> Result<Note> {
    Ok(Note {
      note_id:    self.note_id,
      visit_id:   self.visit_id,
      category:   decode_category(&self.category)?,
      sequence:   u32::try_from(self.sequence)
        .map_err(|_| Error::Decode(format!("note sequence {}", self.sequence)))?,
      body:       NoteText::parse(&self.body).map_err(|e| Error::Decode(e.to_string()))?,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `visit_photos` row.
pub struct RawPhoto {
  pub photo_id:     i64,
  pub visit_id:     i64,
  pub path:         String,
  pub content_hash: String,
  pub media_type:   String,
  pub created_at:   String,
}

pub const PHOTO_COLUMNS: &str = "photo_id, visit_id, path, content_hash, media_type, created_at";

impl RawPhoto {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      photo_id:     row.get(0)?,
      visit_id:     row.get(1)?,
      path:         row.get(2)?,
      content_hash: row.get(3)?,
      media_type:   row.get(4)?,
      created_at:   row.get(5)?,
    })
  }

  pub fn into_photo(self) -> Result<PhotoRef> {
    Ok(PhotoRef {
      photo_id:     self.photo_id,
      visit_id:     self.visit_id,
      path:         self.path,
      content_hash: self.content_hash,
      media_type:   self.media_type,
      created_at:   decode_dt(&self.created_at)?,
    })
  }
}

/// Everything needed to assemble a [`VisitDetail`].
pub struct RawDetail {
  pub visit:   RawVisit,
  pub notes:   Vec<RawNote>,
  /// `(metric, stored value)` pairs.
  pub metrics: Vec<(String, i64)>,
  pub photos:  Vec<RawPhoto>,
}

impl RawDetail {
  pub fn into_detail(self) -> Result<VisitDetail> {
    let visit = self.visit.into_visit()?;
    let notes = self
      .notes
      .into_iter()
      .map(RawNote::into_note)
      .collect::<Result<Vec<_>>>()?;
    let metrics = self
      .metrics
      .into_iter()
      .map(|(name, stored)| {
        let metric = decode_metric(&name)?;
        Ok((metric, MetricValue::from_stored(metric, stored)))
      })
      .collect::<Result<Metrics>>()?;
    let photos = self
      .photos
      .into_iter()
      .map(RawPhoto::into_photo)
      .collect::<Result<Vec<_>>>()?;
    Ok(VisitDetail::assemble(visit, notes, &metrics, photos))
  }
}

/// Raw values read directly from a `tasks` row.
pub struct RawTask {
  pub task_id:      i64,
  pub content:      String,
  pub priority:     i32,
  pub assigned_to:  Option<String>,
  pub due_date:     Option<String>,
  pub store_number: Option<String>,
  pub status:       String,
  pub created_at:   String,
  pub updated_at:   String,
  pub completed_at: Option<String>,
}

pub const TASK_COLUMNS: &str = "task_id, content, priority, assigned_to, due_date, store_number, \
                                status, created_at, updated_at, completed_at";

impl RawTask {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      task_id:      row.get(0)?,
      content:      row.get(1)?,
      priority:     row.get(2)?,
      assigned_to:  row.get(3)?,
      due_date:     row.get(4)?,
      store_number: row.get(5)?,
      status:       row.get(6)?,
      created_at:   row.get(7)?,
      updated_at:   row.get(8)?,
      completed_at: row.get(9)?,
    })
  }

  pub fn into_task(self) -> Result<Task> {
    Ok(Task {
      task_id:      self.task_id,
      content:      self.content,
      priority:     self.priority,
      assigned_to:  self.assigned_to,
      due_date:     decode_opt_date(self.due_date)?,
      store:        self.store_number.as_deref().map(decode_store).transpose()?,
      status:       decode_status(&self.status)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
      completed_at: decode_opt_dt(self.completed_at)?,
    })
  }
}

/// Raw values read directly from an `issues` row.
pub struct RawIssue {
  pub issue_id:     i64,
  pub kind:         String,
  pub title:        String,
  pub description:  Option<String>,
  pub status:       String,
  pub created_at:   String,
  pub updated_at:   String,
  pub completed_at: Option<String>,
}

pub const ISSUE_COLUMNS: &str =
  "issue_id, kind, title, description, status, created_at, updated_at, completed_at";

impl RawIssue {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      issue_id:     row.get(0)?,
      kind:         row.get(1)?,
      title:        row.get(2)?,
      description:  row.get(3)?,
      status:       row.get(4)?,
      created_at:   row.get(5)?,
      updated_at:   row.get(6)?,
      completed_at: row.get(7)?,
    })
  }

  pub fn into_issue(self) -> Result<Issue> {
    Ok(Issue {
      issue_id:     self.issue_id,
      kind:         decode_issue_kind(&self.kind)?,
      title:        self.title,
      description:  self.description,
      status:       decode_status(&self.status)?,
      created_at:   decode_dt(&self.created_at)?,
      updated_at:   decode_dt(&self.updated_at)?,
      completed_at: decode_opt_dt(self.completed_at)?,
    })
  }
}

/// Raw values read directly from a `gold_star_completions` row.
pub struct RawCompletion {
  pub store_number: String,
  pub note_number:  u8,
  pub completed:    bool,
  pub completed_at: Option<String>,
}

pub const COMPLETION_COLUMNS: &str = "store_number, note_number, completed, completed_at";

impl RawCompletion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      store_number: row.get(0)?,
      note_number:  row.get(1)?,
      completed:    row.get(2)?,
      completed_at: row.get(3)?,
    })
  }

  pub fn into_completion(self) -> Result<GoldStarCompletion> {
    Ok(GoldStarCompletion {
      store:        decode_store(&self.store_number)?,
      note_number:  GoldStarNote::new(self.note_number)
        .map_err(|e| Error::Decode(e.to_string()))?,
      completed:    self.completed,
      completed_at: decode_opt_dt(self.completed_at)?,
    })
  }
}

/// A `gold_star_weeks` row with its completions.
pub struct RawGoldStarWeek {
  pub week_start:  String,
  pub notes:       [Option<String>; 3],
  pub completions: Vec<RawCompletion>,
}

impl RawGoldStarWeek {
  pub fn into_week(self) -> Result<GoldStarWeek> {
    let week_start = decode_date(&self.week_start)?;
    let [note_1, note_2, note_3] = self.notes;
    let completions = self
      .completions
      .into_iter()
      .map(RawCompletion::into_completion)
      .collect::<Result<Vec<_>>>()?;
    let mut week = GoldStarWeek {
      week_start,
      week_number: 0,
      notes: GoldStarNotes { note_1, note_2, note_3 },
      completions,
    };
    week.week_number = week.week().number();
    Ok(week)
  }
}

/// A `visit_notes` row joined to its visit: the note columns, then store,
/// date and rating. Expects the aliases `n` and `v`.
pub const NOTE_HIT_COLUMNS: &str = "n.note_id, n.visit_id, n.category, n.sequence, n.body, \
                                    n.created_at, v.store_number, v.visit_date, v.rating";

pub struct RawNoteHit {
  pub note:         RawNote,
  pub store_number: String,
  pub visit_date:   String,
  pub rating:       String,
}

impl RawNoteHit {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      note:         RawNote::from_row(row)?,
      store_number: row.get(6)?,
      visit_date:   row.get(7)?,
      rating:       row.get(8)?,
    })
  }

  pub fn into_hit(self) -> Result<NoteHit> {
    Ok(NoteHit {
      note:   self.note.into_note()?,
      store:  decode_store(&self.store_number)?,
      date:   decode_date(&self.visit_date)?,
      rating: decode_rating(&self.rating)?,
    })
  }
}

/// Raw values read directly from a `note_updates` row.
pub struct RawNoteUpdate {
  pub update_id:  i64,
  pub note_id:    i64,
  pub body:       String,
  pub created_by: Option<String>,
  pub created_at: String,
}

pub const NOTE_UPDATE_COLUMNS: &str = "update_id, note_id, body, created_by, created_at";

impl RawNoteUpdate {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      update_id:  row.get(0)?,
      note_id:    row.get(1)?,
      body:       row.get(2)?,
      created_by: row.get(3)?,
      created_at: row.get(4)?,
    })
  }

  pub fn into_update(self) -> Result<NoteUpdate> {
    Ok(NoteUpdate {
      update_id:  self.update_id,
      note_id:    self.note_id,
      body:       self.body,
      created_by: self.created_by,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}

/// A note hit followed by its `note_tracking` columns, which are all NULL
/// when the note has never been tracked. Expects the alias `t`.
pub const TRACKED_NOTE_COLUMNS: &str = "t.status, t.assigned_to, t.completed_at";

pub struct RawTrackedNote {
  pub hit:          RawNoteHit,
  pub status:       Option<String>,
  pub assigned_to:  Option<String>,
  pub completed_at: Option<String>,
  pub updates:      Vec<RawNoteUpdate>,
}

impl RawTrackedNote {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      hit:          RawNoteHit::from_row(row)?,
      status:       row.get(9)?,
      assigned_to:  row.get(10)?,
      completed_at: row.get(11)?,
      updates:      Vec::new(),
    })
  }

  pub fn into_tracked(self) -> Result<TrackedNote> {
    let tracking = NoteTracking {
      status:       self.status.as_deref().map(decode_status).transpose()?.unwrap_or_default(),
      assigned_to:  self.assigned_to,
      completed_at: decode_opt_dt(self.completed_at)?,
    };
    let updates = self
      .updates
      .into_iter()
      .map(RawNoteUpdate::into_update)
      .collect::<Result<Vec<_>>>()?;
    Ok(TrackedNote { hit: self.hit.into_hit()?, tracking, updates })
  }
}

/// Enabler columns with completion counts. Expects the alias `e`.
pub const ENABLER_COLUMNS: &str = "e.enabler_id, e.title, e.description, e.source, e.status, \
   e.week_start, \
   (SELECT COUNT(*) FROM enabler_completions c WHERE c.enabler_id = e.enabler_id AND c.completed), \
   (SELECT COUNT(*) FROM enabler_completions c WHERE c.enabler_id = e.enabler_id), \
   e.created_at, e.updated_at";

pub struct RawEnabler {
  pub enabler_id:      i64,
  pub title:           String,
  pub description:     Option<String>,
  pub source:          Option<String>,
  pub status:          String,
  pub week_start:      Option<String>,
  pub completed_count: i64,
  pub total_tracked:   i64,
  pub created_at:      String,
  pub updated_at:      String,
}

impl RawEnabler {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      enabler_id:      row.get(0)?,
      title:           row.get(1)?,
      description:     row.get(2)?,
      source:          row.get(3)?,
      status:          row.get(4)?,
      week_start:      row.get(5)?,
      completed_count: row.get(6)?,
      total_tracked:   row.get(7)?,
      created_at:      row.get(8)?,
      updated_at:      row.get(9)?,
    })
  }

  pub fn into_enabler(self) -> Result<Enabler> {
    Ok(Enabler {
      enabler_id:      self.enabler_id,
      title:           self.title,
      description:     self.description,
      source:          self.source,
      status:          decode_enabler_status(&self.status)?,
      week_start:      decode_opt_date(self.week_start)?,
      completed_count: decode_count(self.completed_count),
      total_tracked:   decode_count(self.total_tracked),
      created_at:      decode_dt(&self.created_at)?,
      updated_at:      decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from an `enabler_completions` row.
pub struct RawEnablerCompletion {
  pub enabler_id:   i64,
  pub store_number: String,
  pub completed:    bool,
  pub completed_at: Option<String>,
}

pub const ENABLER_COMPLETION_COLUMNS: &str =
  "enabler_id, store_number, completed, completed_at";

impl RawEnablerCompletion {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      enabler_id:   row.get(0)?,
      store_number: row.get(1)?,
      completed:    row.get(2)?,
      completed_at: row.get(3)?,
    })
  }

  pub fn into_completion(self) -> Result<EnablerCompletion> {
    Ok(EnablerCompletion {
      enabler_id:   self.enabler_id,
      store:        decode_store(&self.store_number)?,
      completed:    self.completed,
      completed_at: decode_opt_dt(self.completed_at)?,
    })
  }
}
