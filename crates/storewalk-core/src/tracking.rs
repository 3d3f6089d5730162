//! Work tracking: tasks, issues, weekly gold stars and enablers.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result, fiscal::FiscalWeek, visit::StoreNumber};

pub type TaskId = i64;
pub type IssueId = i64;
pub type EnablerId = i64;

/// Most rows a task or issue listing returns.
pub const LIST_LIMIT: u32 = 50;

// ─── Status ──────────────────────────────────────────────────────────────────

/// The lifecycle shared by tasks and issues. Any transition is allowed;
/// `completed_at` is set on entry into `Completed` and cleared on exit.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum WorkStatus {
  #[default]
  New,
  #[strum(to_string = "in_progress", serialize = "in progress", serialize = "in-progress")]
  InProgress,
  Stalled,
  Completed,
}

impl WorkStatus {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn parse(raw: &str) -> Result<Self> {
    Self::from_str(raw.trim()).map_err(|_| Error::UnknownStatus(raw.to_owned()))
  }
}

fn non_blank(raw: &str, field: &'static str) -> Result<String> {
  let trimmed = raw.trim();
  if trimmed.is_empty() {
    return Err(Error::BlankField(field));
  }
  Ok(trimmed.to_owned())
}

// ─── Tasks ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
  pub task_id:      TaskId,
  pub content:      String,
  pub priority:     i32,
  pub assigned_to:  Option<String>,
  pub due_date:     Option<NaiveDate>,
  pub store:        Option<StoreNumber>,
  pub status:       WorkStatus,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewTask {
  pub content:     String,
  #[serde(default)]
  pub priority:    i32,
  #[serde(default)]
  pub assigned_to: Option<String>,
  #[serde(default)]
  pub due_date:    Option<NaiveDate>,
  #[serde(default)]
  pub store:       Option<StoreNumber>,
}

impl NewTask {
  /// Trim text fields; blank content is rejected and a blank assignee is
  /// dropped.
  pub fn validate(self) -> Result<Self> {
    Ok(Self {
      content: non_blank(&self.content, "content")?,
      assigned_to: self.assigned_to.and_then(|a| non_blank(&a, "assigned_to").ok()),
      ..self
    })
  }
}

/// Filters for listing tasks. Results are ordered by priority descending,
/// then due date (undated last), then newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskQuery {
  pub status:      Option<WorkStatus>,
  /// Case-insensitive substring of the assignee.
  pub assigned_to: Option<String>,
  pub store:       Option<StoreNumber>,
}

// ─── Issues ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum IssueKind {
  Feature,
  Bug,
  Feedback,
}

impl IssueKind {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn parse(raw: &str) -> Result<Self> {
    Self::from_str(raw.trim()).map_err(|_| Error::UnknownIssueKind(raw.to_owned()))
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
  pub issue_id:     IssueId,
  pub kind:         IssueKind,
  pub title:        String,
  pub description:  Option<String>,
  pub status:       WorkStatus,
  pub created_at:   DateTime<Utc>,
  pub updated_at:   DateTime<Utc>,
  pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewIssue {
  pub kind:        IssueKind,
  pub title:       String,
  #[serde(default)]
  pub description: Option<String>,
}

impl NewIssue {
  pub fn validate(self) -> Result<Self> {
    Ok(Self {
      title: non_blank(&self.title, "title")?,
      description: self.description.and_then(|d| non_blank(&d, "description").ok()),
      ..self
    })
  }
}

/// Filters for listing issues, newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueQuery {
  pub status: Option<WorkStatus>,
  pub kind:   Option<IssueKind>,
}

// ─── Gold stars ──────────────────────────────────────────────────────────────

/// A gold-star note number; always `1..=3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct GoldStarNote(u8);

impl GoldStarNote {
  pub fn new(n: u8) -> Result<Self> {
    if (1..=3).contains(&n) { Ok(Self(n)) } else { Err(Error::InvalidGoldStarNote(n)) }
  }

  pub fn get(self) -> u8 { self.0 }
}

impl TryFrom<u8> for GoldStarNote {
  type Error = Error;

  fn try_from(n: u8) -> Result<Self> { Self::new(n) }
}

impl From<GoldStarNote> for u8 {
  fn from(n: GoldStarNote) -> Self { n.0 }
}

/// The three focus notes of a fiscal week.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldStarNotes {
  pub note_1: Option<String>,
  pub note_2: Option<String>,
  pub note_3: Option<String>,
}

impl GoldStarNotes {
  /// Trim each note; blank notes become `None`.
  pub fn normalized(self) -> Self {
    let clean = |n: Option<String>| n.and_then(|n| non_blank(&n, "note").ok());
    Self {
      note_1: clean(self.note_1),
      note_2: clean(self.note_2),
      note_3: clean(self.note_3),
    }
  }
}

/// One store's progress on one note of a week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldStarCompletion {
  pub store:        StoreNumber,
  pub note_number:  GoldStarNote,
  pub completed:    bool,
  pub completed_at: Option<DateTime<Utc>>,
}

/// A fiscal week's gold-star notes with every recorded completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoldStarWeek {
  pub week_start:  NaiveDate,
  pub week_number: u32,
  #[serde(flatten)]
  pub notes:       GoldStarNotes,
  pub completions: Vec<GoldStarCompletion>,
}

impl GoldStarWeek {
  pub fn week(&self) -> FiscalWeek { FiscalWeek::containing(self.week_start) }
}

// ─── Enablers ────────────────────────────────────────────────────────────────

/// How far an enabler (a tip or way of working shared with stores) has got.
#[derive(
  Debug,
  Clone,
  Copy,
  Default,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum EnablerStatus {
  #[default]
  Idea,
  #[strum(to_string = "slide_made", serialize = "slide made", serialize = "slide-made")]
  SlideMade,
  Presented,
}

impl EnablerStatus {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn parse(raw: &str) -> Result<Self> {
    Self::from_str(raw.trim()).map_err(|_| Error::UnknownStatus(raw.to_owned()))
  }
}

/// An enabler with its per-store completion counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enabler {
  pub enabler_id:      EnablerId,
  pub title:           String,
  pub description:     Option<String>,
  pub source:          Option<String>,
  pub status:          EnablerStatus,
  /// The Saturday of the fiscal week the enabler is scheduled for.
  pub week_start:      Option<NaiveDate>,
  pub completed_count: u32,
  pub total_tracked:   u32,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
}

impl Enabler {
  pub fn week(&self) -> Option<FiscalWeek> { self.week_start.map(FiscalWeek::containing) }
}

/// Input for creating an enabler. `week` may be any date; it is stored as
/// the start of its fiscal week.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEnabler {
  pub title:       String,
  #[serde(default)]
  pub description: Option<String>,
  #[serde(default)]
  pub source:      Option<String>,
  #[serde(default)]
  pub week:        Option<NaiveDate>,
}

impl NewEnabler {
  pub fn validate(self) -> Result<Self> {
    let clean = |v: Option<String>, field| v.and_then(|v| non_blank(&v, field).ok());
    Ok(Self {
      title:       non_blank(&self.title, "title")?,
      description: clean(self.description, "description"),
      source:      clean(self.source, "source"),
      week:        self.week.map(|d| FiscalWeek::containing(d).start()),
    })
  }
}

/// Filters for listing enablers. Results are ordered by week descending
/// (unscheduled last), then newest first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnablerQuery {
  pub status: Option<EnablerStatus>,
  pub week:   Option<FiscalWeek>,
}

/// One store's completion of one enabler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnablerCompletion {
  pub enabler_id:   EnablerId,
  pub store:        StoreNumber,
  pub completed:    bool,
  pub completed_at: Option<DateTime<Utc>>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
