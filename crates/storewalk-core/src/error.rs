//! Error types for `storewalk-core`.
//!
//! Every variant except [`Error::Serialization`] is a validation failure and
//! is raised before any write begins.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("unknown metric: {0:?}")]
  UnknownMetric(String),

  #[error("invalid value for metric {metric}: {reason}")]
  InvalidMetricValue { metric: &'static str, reason: String },

  #[error("metrics must be an object keyed by metric name")]
  InvalidMetrics,

  #[error("invalid date {0:?}; expected YYYY-MM-DD")]
  InvalidDate(String),

  #[error("invalid rating {0:?}; expected Green, Yellow or Red")]
  InvalidRating(String),

  #[error("invalid store number {0:?}")]
  InvalidStoreNumber(String),

  #[error("missing required field: {0}")]
  MissingField(&'static str),

  #[error("unknown note category: {0:?}")]
  UnknownNoteCategory(String),

  #[error("notes for {0} must be a string or a list of strings")]
  InvalidNotes(&'static str),

  #[error("note text must not be blank")]
  EmptyNote,

  #[error("unknown status: {0:?}")]
  UnknownStatus(String),

  #[error("unknown issue kind: {0:?}")]
  UnknownIssueKind(String),

  #[error("{0} must not be blank")]
  BlankField(&'static str),

  #[error("gold star note number must be 1, 2 or 3; got {0}")]
  InvalidGoldStarNote(u8),

  #[error("fiscal year {year} has no week {week}")]
  InvalidFiscalWeek { year: i32, week: u32 },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// `true` for every failure caused by bad caller input.
  pub fn is_validation(&self) -> bool { !matches!(self, Self::Serialization(_)) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
