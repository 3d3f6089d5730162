//! Visit records and their read shapes.

use std::{collections::BTreeMap, fmt, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator as _, IntoStaticStr};

use crate::{
  Error, Result,
  metric::{Metric, MetricValue, Metrics},
  note::{Note, NoteCategory},
};

pub type VisitId = i64;
pub type PhotoId = i64;

/// Longest note body, in characters, carried by a list-view preview.
pub const PREVIEW_CHARS: usize = 80;

// ─── Store number ────────────────────────────────────────────────────────────

/// A store identifier. Trimmed, non-empty, and limited to ASCII letters,
/// digits, `-` and `_`, so alphanumeric store codes are allowed. A leading
/// `#` is dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StoreNumber(String);

impl StoreNumber {
  pub fn parse(raw: &str) -> Result<Self> {
    let trimmed = raw.trim();
    let code = trimmed.strip_prefix('#').unwrap_or(trimmed).trim();
    let valid = !code.is_empty()
      && code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if !valid {
      return Err(Error::InvalidStoreNumber(raw.to_owned()));
    }
    Ok(Self(code.to_owned()))
  }

  /// Interpret an untrusted JSON value; a JSON integer is taken as its
  /// decimal text.
  pub fn from_value(value: &Value) -> Result<Option<Self>> {
    match value {
      Value::Null => Ok(None),
      Value::String(s) if s.trim().is_empty() => Ok(None),
      Value::String(s) => Self::parse(s).map(Some),
      Value::Number(n) if n.is_u64() => Self::parse(&n.to_string()).map(Some),
      other => Err(Error::InvalidStoreNumber(other.to_string())),
    }
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for StoreNumber {
  type Error = Error;

  fn try_from(raw: String) -> Result<Self> { Self::parse(&raw) }
}

impl From<StoreNumber> for String {
  fn from(store: StoreNumber) -> Self { store.0 }
}

impl fmt::Display for StoreNumber {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Rating ──────────────────────────────────────────────────────────────────

/// The qualitative outcome of a visit.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  PartialOrd,
  Ord,
  Hash,
  Serialize,
  Deserialize,
  EnumIter,
  EnumString,
  IntoStaticStr,
  Display,
)]
#[serde(try_from = "String")]
#[strum(ascii_case_insensitive)]
pub enum Rating {
  #[strum(to_string = "Green", serialize = "g")]
  Green,
  #[strum(to_string = "Yellow", serialize = "y")]
  Yellow,
  #[strum(to_string = "Red", serialize = "r")]
  Red,
}

impl Rating {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn parse(raw: &str) -> Result<Self> {
    Self::from_str(raw.trim()).map_err(|_| Error::InvalidRating(raw.to_owned()))
  }
}

impl TryFrom<String> for Rating {
  type Error = Error;

  fn try_from(raw: String) -> Result<Self> { Self::parse(&raw) }
}

/// Parse an ISO `YYYY-MM-DD` calendar date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
    .map_err(|_| Error::InvalidDate(raw.to_owned()))
}

// ─── Visit ───────────────────────────────────────────────────────────────────

/// The scalar fields of a persisted visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Visit {
  pub visit_id:       VisitId,
  pub store:          StoreNumber,
  pub date:           NaiveDate,
  pub rating:         Rating,
  pub notes_received: bool,
  pub created_at:     DateTime<Utc>,
}

/// A condensed view of one note category for list views.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotePreview {
  pub count:     u32,
  /// The lowest-sequence note, cut to [`PREVIEW_CHARS`] characters.
  pub first:     Option<String>,
  pub truncated: bool,
}

impl NotePreview {
  pub fn new(count: u32, first: Option<&str>) -> Self {
    let Some(first) = first else {
      return Self { count, first: None, truncated: false };
    };
    let truncated = first.chars().count() > PREVIEW_CHARS;
    let first = first.chars().take(PREVIEW_CHARS).collect();
    Self { count, first: Some(first), truncated }
  }

  /// The preview of an already-ordered note list.
  pub fn of(notes: &[Note]) -> Self {
    let count = u32::try_from(notes.len()).unwrap_or(u32::MAX);
    Self::new(count, notes.first().map(|n| n.body.as_str()))
  }
}

/// The list-view projection of a visit. Every category has a preview, even
/// when it holds no notes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisitBrief {
  #[serde(flatten)]
  pub visit:    Visit,
  pub previews: BTreeMap<NoteCategory, NotePreview>,
}

impl VisitBrief {
  /// Build a brief, filling categories missing from `previews` with an
  /// empty preview.
  pub fn new(visit: Visit, mut previews: BTreeMap<NoteCategory, NotePreview>) -> Self {
    for category in NoteCategory::iter() {
      previews.entry(category).or_default();
    }
    Self { visit, previews }
  }
}

/// A stored photo reference. Image bytes live on disk under the configured
/// photo directory, never in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhotoRef {
  pub photo_id:     PhotoId,
  pub visit_id:     VisitId,
  /// Path relative to the photo directory.
  pub path:         String,
  /// Lowercase hex SHA-256 of the file content.
  pub content_hash: String,
  pub media_type:   String,
  pub created_at:   DateTime<Utc>,
}

/// A photo reference to attach to a visit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPhoto {
  pub path:         String,
  pub content_hash: String,
  pub media_type:   String,
}

/// The full projection of a visit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitDetail {
  #[serde(flatten)]
  pub brief:   VisitBrief,
  /// Every category, each ordered by sequence.
  pub notes:   BTreeMap<NoteCategory, Vec<Note>>,
  /// Every registry metric; `None` when not recorded.
  pub metrics: BTreeMap<Metric, Option<MetricValue>>,
  pub photos:  Vec<PhotoRef>,
}

impl VisitDetail {
  /// Assemble a detail view from its parts. `notes` may arrive in any
  /// order.
  pub fn assemble(
    visit: Visit,
    notes: Vec<Note>,
    metrics: &Metrics,
    photos: Vec<PhotoRef>,
  ) -> Self {
    let mut by_category: BTreeMap<NoteCategory, Vec<Note>> =
      NoteCategory::iter().map(|c| (c, Vec::new())).collect();
    for note in notes {
      by_category.entry(note.category).or_default().push(note);
    }
    for list in by_category.values_mut() {
      list.sort_by_key(|n| n.sequence);
    }

    let previews = by_category
      .iter()
      .map(|(category, list)| (*category, NotePreview::of(list)))
      .collect();

    Self {
      brief: VisitBrief::new(visit, previews),
      notes: by_category,
      metrics: metrics.full_map(),
      photos,
    }
  }

  pub fn visit(&self) -> &Visit { &self.brief.visit }
}

// ─── Duplicates ──────────────────────────────────────────────────────────────

/// The result of an advisory (store, date) conflict lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateCheck {
  pub is_duplicate: bool,
  pub existing:     Vec<VisitBrief>,
}

impl DuplicateCheck {
  pub fn from_matches(existing: Vec<VisitBrief>) -> Self {
    Self { is_duplicate: !existing.is_empty(), existing }
  }
}

// ─── Statistics ──────────────────────────────────────────────────────────────

/// Visit counts per rating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatingCounts {
  pub green:  u32,
  pub yellow: u32,
  pub red:    u32,
}

impl RatingCounts {
  pub fn add(&mut self, rating: Rating, n: u32) {
    match rating {
      Rating::Green => self.green += n,
      Rating::Yellow => self.yellow += n,
      Rating::Red => self.red += n,
    }
  }

  pub fn total(&self) -> u32 { self.green + self.yellow + self.red }
}

/// Aggregates for a single store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreStats {
  pub store:           StoreNumber,
  pub total_visits:    u32,
  pub ratings:         RatingCounts,
  pub last_visit:      Option<NaiveDate>,
  /// Mean of recorded values only; metrics never recorded are omitted.
  pub metric_averages: BTreeMap<Metric, f64>,
}

/// Aggregates across every store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryStats {
  pub total_visits: u32,
  pub stores:       u32,
  pub first_visit:  Option<NaiveDate>,
  pub last_visit:   Option<NaiveDate>,
  pub ratings:      RatingCounts,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
