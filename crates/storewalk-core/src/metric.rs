//! The metric schema registry.
//!
//! A visit carries a fixed set of named metrics. Each is independently
//! nullable: a missing metric means "not recorded", which is distinct from a
//! recorded zero. Values are either decimals with two implied fractional
//! digits (held exactly as hundredths) or integers. No range is enforced.

use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator as _, IntoStaticStr};

use crate::{Error, Result};

// ─── Registry ────────────────────────────────────────────────────────────────

/// Every metric a visit may carry. The snake_case name is the wire and
/// database key.
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
#[strum(serialize_all = "snake_case")]
pub enum Metric {
  SalesCompYest,
  SalesIndexYest,
  SalesCompWtd,
  SalesIndexWtd,
  SalesCompMtd,
  SalesIndexMtd,
  Vizpick,
  Overstock,
  Picks,
  Vizfashion,
  Modflex,
  TagErrors,
  Mods,
  Pcs,
  Pinpoint,
  Ftpr,
  Presub,
}

/// The value domain of a metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
  /// Two implied fractional digits.
  Decimal,
  Integer,
}

impl Metric {
  pub fn as_str(self) -> &'static str { self.into() }

  pub fn kind(self) -> MetricKind {
    match self {
      Self::Overstock | Self::Picks | Self::TagErrors | Self::Mods | Self::Pcs => {
        MetricKind::Integer
      }
      _ => MetricKind::Decimal,
    }
  }

  /// Look up a metric by name, failing with [`Error::UnknownMetric`].
  pub fn lookup(name: &str) -> Result<Self> {
    Self::from_str(name.trim()).map_err(|_| Error::UnknownMetric(name.to_owned()))
  }

  /// Validate and coerce an untrusted JSON value for this metric.
  ///
  /// Returns `Ok(None)` when the value records absence (`null`, or one of
  /// the blank string spellings accepted on the transcription path).
  pub fn coerce(self, raw: &Value) -> Result<Option<MetricValue>> {
    let number = match raw {
      Value::Null => return Ok(None),
      Value::Number(n) => {
        if let (MetricKind::Integer, Some(i)) = (self.kind(), n.as_i64()) {
          return Ok(Some(MetricValue::Integer(i)));
        }
        n.as_f64()
          .ok_or_else(|| self.invalid(format!("{n} is not representable")))?
      }
      Value::String(s) => match clean_numeric(s) {
        None => return Ok(None),
        Some(text) => text
          .parse::<f64>()
          .map_err(|_| self.invalid(format!("{s:?} is not a number")))?,
      },
      Value::Bool(_) => return Err(self.invalid("expected a number, got a boolean")),
      Value::Array(_) => return Err(self.invalid("expected a number, got a list")),
      Value::Object(_) => return Err(self.invalid("expected a number, got an object")),
    };
    self.from_f64(number).map(Some)
  }

  fn from_f64(self, number: f64) -> Result<MetricValue> {
    if !number.is_finite() {
      return Err(self.invalid("value must be finite"));
    }
    match self.kind() {
      MetricKind::Decimal => {
        let scaled = (number * 100.0).round();
        if scaled.abs() >= i64::MAX as f64 {
          return Err(self.invalid("value is out of range"));
        }
        Ok(MetricValue::Decimal { hundredths: scaled as i64 })
      }
      MetricKind::Integer => {
        if number.fract() != 0.0 {
          return Err(self.invalid(format!("{number} is not a whole number")));
        }
        if number.abs() >= i64::MAX as f64 {
          return Err(self.invalid("value is out of range"));
        }
        Ok(MetricValue::Integer(number as i64))
      }
    }
  }

  fn invalid(self, reason: impl Into<String>) -> Error {
    Error::InvalidMetricValue { metric: self.as_str(), reason: reason.into() }
  }
}


/// Strip the decorations handwritten sheets carry (`%`, thousands
/// separators) and map the blank spellings to `None`.
fn clean_numeric(raw: &str) -> Option<String> {
  let cleaned: String = raw.chars().filter(|c| !matches!(c, '%' | ',')).collect();
  let cleaned = cleaned.trim();
  match cleaned.to_ascii_lowercase().as_str() {
    "" | "null" | "none" | "n/a" | "na" | "-" => None,
    _ => Some(cleaned.to_owned()),
  }
}

/// Validate a single named metric value.
///
/// Unknown names fail with [`Error::UnknownMetric`]; `null` succeeds with
/// `None`.
pub fn validate_metric(name: &str, raw: &Value) -> Result<Option<MetricValue>> {
  Metric::lookup(name)?.coerce(raw)
}

// ─── Values ──────────────────────────────────────────────────────────────────

/// A recorded metric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricValue {
  Decimal { hundredths: i64 },
  Integer(i64),
}

impl MetricValue {
  /// The integer stored in the database column.
  pub fn stored(self) -> i64 {
    match self {
      Self::Decimal { hundredths } => hundredths,
      Self::Integer(i) => i,
    }
  }

  /// Rebuild a value from its stored integer and the metric's kind.
  pub fn from_stored(metric: Metric, stored: i64) -> Self {
    match metric.kind() {
      MetricKind::Decimal => Self::Decimal { hundredths: stored },
      MetricKind::Integer => Self::Integer(stored),
    }
  }

  pub fn as_f64(self) -> f64 {
    match self {
      Self::Decimal { hundredths } => hundredths as f64 / 100.0,
      Self::Integer(i) => i as f64,
    }
  }
}

impl Serialize for MetricValue {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match *self {
      Self::Decimal { .. } => serializer.serialize_f64(self.as_f64()),
      Self::Integer(i) => serializer.serialize_i64(i),
    }
  }
}

impl<'de> Deserialize<'de> for MetricValue {
  fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Wire {
      Integer(i64),
      Decimal(f64),
    }

    Ok(match Wire::deserialize(deserializer)? {
      Wire::Integer(i) => Self::Integer(i),
      Wire::Decimal(d) => Self::Decimal { hundredths: (d * 100.0).round() as i64 },
    })
  }
}

// ─── Collections ─────────────────────────────────────────────────────────────

/// The recorded metrics of one visit. Absent metrics are omitted, never
/// zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metrics(BTreeMap<Metric, MetricValue>);

impl Metrics {
  /// Validate every entry of an untrusted JSON object. `null` input is an
  /// empty set.
  pub fn from_raw(raw: &Value) -> Result<Self> {
    let mut metrics = Self::default();
    match raw {
      Value::Null => {}
      Value::Object(map) => {
        for (name, value) in map {
          let metric = Metric::lookup(name)?;
          if let Some(v) = metric.coerce(value)? {
            metrics.0.insert(metric, v);
          }
        }
      }
      _ => return Err(Error::InvalidMetrics),
    }
    Ok(metrics)
  }

  pub fn get(&self, metric: Metric) -> Option<MetricValue> { self.0.get(&metric).copied() }

  pub fn insert(&mut self, metric: Metric, value: MetricValue) { self.0.insert(metric, value); }

  pub fn iter(&self) -> impl Iterator<Item = (Metric, MetricValue)> + '_ {
    self.0.iter().map(|(m, v)| (*m, *v))
  }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  /// Every registry metric, with `None` for those not recorded.
  pub fn full_map(&self) -> BTreeMap<Metric, Option<MetricValue>> {
    Metric::iter().map(|m| (m, self.get(m))).collect()
  }
}

impl FromIterator<(Metric, MetricValue)> for Metrics {
  fn from_iter<I: IntoIterator<Item = (Metric, MetricValue)>>(iter: I) -> Self {
    Self(iter.into_iter().collect())
  }
}

/// A partial metric update: `Some` sets a value, `None` clears it.
pub type MetricChanges = BTreeMap<Metric, Option<MetricValue>>;

/// Validate an untrusted JSON object as a [`MetricChanges`] set; an explicit
/// `null` becomes a clear.
pub fn metric_changes_from_raw(raw: &Value) -> Result<MetricChanges> {
  let mut changes = MetricChanges::new();
  match raw {
    Value::Null => {}
    Value::Object(map) => {
      for (name, value) in map {
        let metric = Metric::lookup(name)?;
        changes.insert(metric, metric.coerce(value)?);
      }
    }
    _ => return Err(Error::InvalidMetrics),
  }
  Ok(changes)
}

// ─── Tests ───────────────────────────────────────────────────────────────────
