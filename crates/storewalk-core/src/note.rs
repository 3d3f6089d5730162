//! Visit notes and the note normalizer.
//!
//! Notes arrive either as one newline-delimited blob (manual entry) or as an
//! already-itemized list (transcription output). Both are reduced to an
//! ordered sequence of non-blank drafts numbered `1..=N` per category.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{Error, Result, visit::VisitId};

pub type NoteId = i64;

// ─── Category ────────────────────────────────────────────────────────────────

/// The four note categories a visit carries. Each keeps its own sequence.
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
  Display,
  EnumIter,
  EnumString,
  IntoStaticStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum NoteCategory {
  /// General store observations.
  #[strum(to_string = "observation", serialize = "store", serialize = "store_notes")]
  Observation,
  /// Market and competitor notes.
  #[strum(to_string = "market", serialize = "mkt", serialize = "mkt_notes")]
  Market,
  /// Positive highlights.
  #[strum(to_string = "positive", serialize = "good")]
  Positive,
  /// Improvement opportunities.
  #[strum(to_string = "improvement", serialize = "top_3")]
  Improvement,
}

impl NoteCategory {
  pub fn as_str(self) -> &'static str { self.into() }

  /// Parse a category name, accepting the legacy wire aliases.
  pub fn parse(name: &str) -> Result<Self> {
    Self::from_str(name.trim()).map_err(|_| Error::UnknownNoteCategory(name.to_owned()))
  }
}

// ─── Text ────────────────────────────────────────────────────────────────────

/// A trimmed, non-blank note body. Blank bodies are unrepresentable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NoteText(String);

impl NoteText {
  pub fn parse(raw: &str) -> Result<Self> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
      return Err(Error::EmptyNote);
    }
    Ok(Self(trimmed.to_owned()))
  }

  pub fn as_str(&self) -> &str { &self.0 }
}

impl TryFrom<String> for NoteText {
  type Error = Error;

  fn try_from(raw: String) -> Result<Self> { Self::parse(&raw) }
}

impl From<NoteText> for String {
  fn from(text: NoteText) -> Self { text.0 }
}

impl fmt::Display for NoteText {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

// ─── Raw input ───────────────────────────────────────────────────────────────

/// Unnormalized note input for one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawNotes {
  /// A newline-delimited blob.
  Text(String),
  /// An already-itemized list.
  Items(Vec<String>),
}

impl Default for RawNotes {
  fn default() -> Self { Self::Items(Vec::new()) }
}

impl RawNotes {
  /// Interpret an untrusted JSON value. `null` is empty; list elements that
  /// are numbers are kept as their text; `null` elements are skipped.
  pub fn from_value(value: &Value, category: NoteCategory) -> Result<Self> {
    match value {
      Value::Null => Ok(Self::default()),
      Value::String(s) => Ok(Self::Text(s.clone())),
      Value::Array(items) => items
        .iter()
        .filter(|item| !item.is_null())
        .map(|item| match item {
          Value::String(s) => Ok(s.clone()),
          Value::Number(n) => Ok(n.to_string()),
          _ => Err(Error::InvalidNotes(category.as_str())),
        })
        .collect::<Result<Vec<_>>>()
        .map(Self::Items),
      _ => Err(Error::InvalidNotes(category.as_str())),
    }
  }
}

// ─── Normalizer ──────────────────────────────────────────────────────────────

/// A note ready to be inserted: its category, its 1-based position, and its
/// body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteDraft {
  pub category: NoteCategory,
  pub sequence: u32,
  pub body:     NoteText,
}

/// Decompose raw input into an ordered sequence of drafts.
///
/// Strings are split on `\n`; every item is trimmed and blank items are
/// dropped before numbering, so sequences are always `1..=N` in input order.
/// Empty input yields an empty sequence.
pub fn normalize(raw: &RawNotes, category: NoteCategory) -> Vec<NoteDraft> {
  let items: Vec<&str> = match raw {
    RawNotes::Text(text) => text.split('\n').collect(),
    RawNotes::Items(items) => items.iter().map(String::as_str).collect(),
  };

  items
    .into_iter()
    .filter_map(|item| NoteText::parse(item).ok())
    .zip(1..)
    .map(|(body, sequence)| NoteDraft { category, sequence, body })
    .collect()
}

/// The list form of a normalized sequence; feeding it back through
/// [`normalize`] yields the same drafts.
pub fn itemize(drafts: &[NoteDraft]) -> RawNotes {
  RawNotes::Items(drafts.iter().map(|d| d.body.as_str().to_owned()).collect())
}

// ─── Persisted note ──────────────────────────────────────────────────────────

/// A stored note. `sequence` is fixed at creation: edits keep it and deletes
/// of siblings leave gaps rather than renumbering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
  pub note_id:    NoteId,
  pub visit_id:   VisitId,
  pub category:   NoteCategory,
  pub sequence:   u32,
  pub body:       NoteText,
  pub created_at: DateTime<Utc>,
}

// ─── Tests ───────────────────────────────────────────────────────────────────
