//! Visit submissions and their validation.
//!
//! Manual entry and transcription output share one untrusted shape,
//! [`RawVisitDraft`]. Everything is validated by [`VisitDraft::from_raw`]
//! before any write begins.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::IntoEnumIterator as _;

use crate::{
  Error, Result,
  metric::{Metric, MetricChanges, Metrics, metric_changes_from_raw},
  note::{NoteCategory, NoteDraft, RawNotes, normalize},
  visit::{Rating, StoreNumber, parse_date},
};

/// An unvalidated visit submission. Every field is kept as raw JSON so the
/// validator can report precise errors rather than a generic parse failure.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVisitDraft {
  #[serde(default, alias = "storeNbr", alias = "store_number")]
  pub store:       Value,
  #[serde(default, alias = "calendar_date", alias = "visit_date")]
  pub date:        Value,
  #[serde(default)]
  pub rating:      Value,
  #[serde(default)]
  pub metrics:     Value,
  #[serde(default, alias = "store_notes")]
  pub observation: Value,
  #[serde(default, alias = "mkt_notes")]
  pub market:      Value,
  #[serde(default, alias = "good")]
  pub positive:    Value,
  #[serde(default, alias = "top_3")]
  pub improvement: Value,
}

impl RawVisitDraft {
  /// The raw note input for one category.
  pub fn notes(&self, category: NoteCategory) -> &Value {
    match category {
      NoteCategory::Observation => &self.observation,
      NoteCategory::Market => &self.market,
      NoteCategory::Positive => &self.positive,
      NoteCategory::Improvement => &self.improvement,
    }
  }

  fn notes_mut(&mut self, category: NoteCategory) -> &mut Value {
    match category {
      NoteCategory::Observation => &mut self.observation,
      NoteCategory::Market => &mut self.market,
      NoteCategory::Positive => &mut self.positive,
      NoteCategory::Improvement => &mut self.improvement,
    }
  }
}

/// A scalar text field; blank counts as absent. Non-strings fail with
/// `invalid`.
fn text_field(value: &Value, invalid: fn(String) -> Error) -> Result<Option<String>> {
  match value {
    Value::Null => Ok(None),
    Value::String(s) if s.trim().is_empty() => Ok(None),
    Value::String(s) => Ok(Some(s.clone())),
    other => Err(invalid(other.to_string())),
  }
}

fn parse_date_field(value: &Value) -> Result<Option<NaiveDate>> {
  text_field(value, Error::InvalidDate)?
    .map(|d| parse_date(&d))
    .transpose()
}

fn parse_rating_field(value: &Value) -> Result<Option<Rating>> {
  text_field(value, Error::InvalidRating)?
    .map(|r| Rating::parse(&r))
    .transpose()
}

fn parse_notes(raw: &RawVisitDraft) -> Result<Vec<NoteDraft>> {
  let mut notes = Vec::new();
  for category in NoteCategory::iter() {
    let input = RawNotes::from_value(raw.notes(category), category)?;
    notes.extend(normalize(&input, category));
  }
  Ok(notes)
}

// ─── Validated draft ─────────────────────────────────────────────────────────

/// A fully validated visit, ready to persist in one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisitDraft {
  pub store:   StoreNumber,
  pub date:    NaiveDate,
  pub rating:  Rating,
  pub metrics: Metrics,
  /// Normalized notes across all categories.
  pub notes:   Vec<NoteDraft>,
}

impl VisitDraft {
  /// Validate a submission. Fails fast on the first problem.
  pub fn from_raw(raw: &RawVisitDraft) -> Result<Self> {
    let store = StoreNumber::from_value(&raw.store)?.ok_or(Error::MissingField("store"))?;
    let date = parse_date_field(&raw.date)?.ok_or(Error::MissingField("date"))?;
    let rating = parse_rating_field(&raw.rating)?.ok_or(Error::MissingField("rating"))?;
    let metrics = Metrics::from_raw(&raw.metrics)?;
    let notes = parse_notes(raw)?;
    Ok(Self { store, date, rating, metrics, notes })
  }

  /// The drafts of one category, in sequence order.
  pub fn notes_in(&self, category: NoteCategory) -> impl Iterator<Item = &NoteDraft> {
    self.notes.iter().filter(move |n| n.category == category)
  }
}

impl From<&VisitDraft> for RawVisitDraft {
  fn from(draft: &VisitDraft) -> Self {
    let mut raw = Self {
      store: Value::String(draft.store.to_string()),
      date: Value::String(draft.date.to_string()),
      rating: Value::String(draft.rating.to_string()),
      metrics: serde_json::to_value(&draft.metrics).unwrap_or(Value::Null),
      ..Self::default()
    };
    for category in NoteCategory::iter() {
      let items = draft
        .notes_in(category)
        .map(|n| Value::String(n.body.to_string()))
        .collect();
      *raw.notes_mut(category) = Value::Array(items);
    }
    raw
  }
}

// ─── Lenient draft ───────────────────────────────────────────────────────────

/// A best-effort reading of transcription output, for review before save.
///
/// Fields the model could not read are `None`; individual metric values that
/// fail validation are dropped and reported in `warnings` instead of
/// failing the whole draft.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialVisitDraft {
  pub store:    Option<StoreNumber>,
  pub date:     Option<NaiveDate>,
  pub rating:   Option<Rating>,
  pub metrics:  Metrics,
  pub notes:    BTreeMap<NoteCategory, Vec<String>>,
  pub warnings: Vec<String>,
}

impl PartialVisitDraft {
  pub fn from_raw(raw: &RawVisitDraft) -> Self {
    let mut warnings = Vec::new();
    let store = keep(&mut warnings, StoreNumber::from_value(&raw.store));
    let date = keep(&mut warnings, parse_date_field(&raw.date));
    let rating = keep(&mut warnings, parse_rating_field(&raw.rating));

    let mut metrics = Metrics::default();
    match &raw.metrics {
      Value::Object(map) => {
        for (name, value) in map {
          let parsed =
            Metric::lookup(name).and_then(|m| m.coerce(value).map(|v| v.map(|v| (m, v))));
          if let Some((metric, value)) = keep(&mut warnings, parsed) {
            metrics.insert(metric, value);
          }
        }
      }
      Value::Null => {}
      _ => warnings.push(Error::InvalidMetrics.to_string()),
    }

    let mut notes = BTreeMap::new();
    for category in NoteCategory::iter() {
      let items: Vec<String> = match RawNotes::from_value(raw.notes(category), category) {
        Ok(input) => normalize(&input, category)
          .into_iter()
          .map(|n| n.body.into())
          .collect(),
        Err(e) => {
          warnings.push(e.to_string());
          Vec::new()
        }
      };
      notes.insert(category, items);
    }

    Self { store, date, rating, metrics, notes, warnings }
  }
}

/// Unwrap a lenient result, recording the error as a warning.
fn keep<T>(warnings: &mut Vec<String>, result: Result<Option<T>>) -> Option<T> {
  result.unwrap_or_else(|e| {
    warnings.push(e.to_string());
    None
  })
}

// ─── Edits ───────────────────────────────────────────────────────────────────

/// An unvalidated edit to an existing visit's scalar fields and metrics.
/// Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawVisitPatch {
  #[serde(default, alias = "storeNbr")]
  pub store:   Option<Value>,
  #[serde(default, alias = "calendar_date")]
  pub date:    Option<Value>,
  #[serde(default)]
  pub rating:  Option<Value>,
  /// Metric name to value; an explicit `null` clears the metric.
  #[serde(default)]
  pub metrics: Value,
}

/// A validated visit edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VisitPatch {
  pub store:   Option<StoreNumber>,
  pub date:    Option<NaiveDate>,
  pub rating:  Option<Rating>,
  pub metrics: MetricChanges,
}

impl VisitPatch {
  pub fn from_raw(raw: &RawVisitPatch) -> Result<Self> {
    let store = match &raw.store {
      Some(v) => Some(StoreNumber::from_value(v)?.ok_or(Error::MissingField("store"))?),
      None => None,
    };
    let date = match &raw.date {
      Some(v) => Some(parse_date_field(v)?.ok_or(Error::MissingField("date"))?),
      None => None,
    };
    let rating = match &raw.rating {
      Some(v) => Some(parse_rating_field(v)?.ok_or(Error::MissingField("rating"))?),
      None => None,
    };
    let metrics = metric_changes_from_raw(&raw.metrics)?;
    Ok(Self { store, date, rating, metrics })
  }

  pub fn is_empty(&self) -> bool {
    self.store.is_none() && self.date.is_none() && self.rating.is_none() && self.metrics.is_empty()
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;
  use crate::metric::MetricValue;

  fn raw(value: Value) -> RawVisitDraft { serde_json::from_value(value).unwrap() }

  #[test]
  fn accepts_legacy_wire_names() {
    let raw = raw(json!({
      "storeNbr": 1234,
      "calendar_date": "2024-12-18",
      "rating": "green",
      "store_notes": "Note A\n\n  \nNote B\n",
      "mkt_notes": ["comp remodel"],
      "good": null,
      "top_3": ["", "fix endcaps"],
      "metrics": { "vizpick": "85.5%", "overstock": null },
    }));
    let draft = VisitDraft::from_raw(&raw).unwrap();
    assert_eq!(draft.store.as_str(), "1234");
    assert_eq!(draft.date.to_string(), "2024-12-18");
    assert_eq!(draft.rating, Rating::Green);
    assert_eq!(
      draft.metrics.get(Metric::Vizpick),
      Some(MetricValue::Decimal { hundredths: 8550 })
    );
    assert_eq!(draft.metrics.get(Metric::Overstock), None);

    let observation: Vec<_> = draft
      .notes_in(NoteCategory::Observation)
      .map(|n| (n.sequence, n.body.as_str()))
      .collect();
    assert_eq!(observation, [(1, "Note A"), (2, "Note B")]);
    let improvement: Vec<_> = draft
      .notes_in(NoteCategory::Improvement)
      .map(|n| n.sequence)
      .collect();
    assert_eq!(improvement, [1]);
    assert_eq!(draft.notes_in(NoteCategory::Positive).count(), 0);
  }

  #[test]
  fn missing_required_fields_fail() {
    let err = VisitDraft::from_raw(&raw(json!({ "date": "2024-12-18", "rating": "Red" })))
      .unwrap_err();
    assert!(matches!(err, Error::MissingField("store")));

    let err = VisitDraft::from_raw(&raw(json!({ "store": "1234", "rating": "Red" })))
      .unwrap_err();
    assert!(matches!(err, Error::MissingField("date")));
  }

  #[test]
  fn bad_values_fail_before_anything_else() {
    let base = json!({ "store": "1234", "date": "2024-12-18", "rating": "Red" });

    let mut v = base.clone();
    v["date"] = json!("18/12/2024");
    assert!(matches!(VisitDraft::from_raw(&raw(v)), Err(Error::InvalidDate(_))));

    let mut v = base.clone();
    v["metrics"] = json!({ "bogus": 1 });
    assert!(matches!(VisitDraft::from_raw(&raw(v)), Err(Error::UnknownMetric(_))));

    let mut v = base;
    v["market"] = json!({ "not": "notes" });
    assert!(matches!(VisitDraft::from_raw(&raw(v)), Err(Error::InvalidNotes("market"))));
  }

  #[test]
  fn round_trips_through_raw_form() {
    let first = VisitDraft::from_raw(&raw(json!({
      "store": "5678",
      "date": "2025-03-01",
      "rating": "Y",
      "observation": "one\ntwo",
      "metrics": { "picks": 3 },
    })))
    .unwrap();
    let again = VisitDraft::from_raw(&RawVisitDraft::from(&first)).unwrap();
    assert_eq!(first, again);
  }

  #[test]
  fn partial_draft_collects_warnings() {
    let partial = PartialVisitDraft::from_raw(&raw(json!({
      "storeNbr": "1234",
      "calendar_date": "sometime",
      "rating": null,
      "metrics": { "vizpick": 90, "picks": 2.5, "mystery": 1 },
      "store_notes": ["a", " ", "b"],
    })));
    assert_eq!(partial.store.as_ref().map(StoreNumber::as_str), Some("1234"));
    assert_eq!(partial.date, None);
    assert_eq!(partial.rating, None);
    assert_eq!(partial.metrics.len(), 1);
    assert_eq!(partial.notes[&NoteCategory::Observation], ["a", "b"]);
    assert!(partial.notes[&NoteCategory::Market].is_empty());
    assert_eq!(partial.warnings.len(), 3);
  }

  #[test]
  fn patch_distinguishes_clear_from_unchanged() {
    let raw: RawVisitPatch = serde_json::from_value(json!({
      "rating": "yellow",
      "metrics": { "picks": null, "mods": 2 },
    }))
    .unwrap();
    let patch = VisitPatch::from_raw(&raw).unwrap();
    assert_eq!(patch.rating, Some(Rating::Yellow));
    assert_eq!(patch.store, None);
    assert_eq!(patch.metrics[&Metric::Picks], None);
    assert_eq!(patch.metrics[&Metric::Mods], Some(MetricValue::Integer(2)));
    assert!(!patch.metrics.contains_key(&Metric::Vizpick));
  }

  #[test]
  fn patch_rejects_blank_required_field() {
    let raw: RawVisitPatch = serde_json::from_value(json!({ "store": "" })).unwrap();
    assert!(matches!(VisitPatch::from_raw(&raw), Err(Error::MissingField("store"))));
  }
}
