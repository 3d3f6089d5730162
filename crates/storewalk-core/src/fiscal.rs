//! Saturday-anchored fiscal weeks.
//!
//! A fiscal week runs Saturday through Friday. The fiscal year `Y` begins
//! with the first Saturday on or after January 31 of calendar year `Y`; week
//! 1 starts there. A week whose Saturday falls before that boundary belongs
//! to fiscal year `Y - 1`.

use chrono::{Datelike, Days, NaiveDate};
use serde::{Serialize, Serializer, ser::SerializeStruct};

use crate::{Error, Result};

/// The most recent Saturday on or before `date`. Total and pure: in the
/// first days of the representable range, where that Saturday does not
/// exist, the result clamps to [`NaiveDate::MIN`].
pub fn week_start(date: NaiveDate) -> NaiveDate {
  // Saturday is 6 days from Sunday; (sunday_offset + 1) % 7 is the number
  // of days since the last Saturday.
  let back = (date.weekday().num_days_from_sunday() + 1) % 7;
  date.checked_sub_days(Days::new(u64::from(back))).unwrap_or(NaiveDate::MIN)
}

/// The Saturday that starts week 1 of fiscal year `year`.
fn year_anchor(year: i32) -> Option<NaiveDate> {
  let jan_31 = NaiveDate::from_yo_opt(year, 31)?;
  Some(week_start(jan_31.checked_add_days(Days::new(6))?))
}

/// A resolved fiscal week.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FiscalWeek {
  start: NaiveDate,
}

impl FiscalWeek {
  /// The fiscal week containing `date`.
  pub fn containing(date: NaiveDate) -> Self { Self { start: week_start(date) } }

  /// The Saturday that starts this week.
  pub fn start(&self) -> NaiveDate { self.start }

  /// The Friday that ends this week, clamped to [`NaiveDate::MAX`] for the
  /// final week of the representable range.
  pub fn end(&self) -> NaiveDate {
    self.start.checked_add_days(Days::new(6)).unwrap_or(NaiveDate::MAX)
  }

  /// The fiscal year this week belongs to, labelled by the calendar year in
  /// which it begins.
  pub fn fiscal_year(&self) -> i32 {
    let year = self.start.year();
    match year_anchor(year) {
      Some(anchor) if self.start < anchor => year - 1,
      _ => year,
    }
  }

  /// 1-based week number within [`Self::fiscal_year`].
  pub fn number(&self) -> u32 {
    let anchor = year_anchor(self.fiscal_year()).unwrap_or(self.start);
    let weeks = (self.start - anchor).num_days() / 7;
    u32::try_from(weeks + 1).unwrap_or(1)
  }

  /// The week numbered `week` of fiscal year `year`.
  pub fn from_number(year: i32, week: u32) -> Result<Self> {
    let invalid = || Error::InvalidFiscalWeek { year, week };
    if !(1..=53).contains(&week) {
      return Err(invalid());
    }
    let anchor = year_anchor(year).ok_or_else(invalid)?;
    let start = anchor
      .checked_add_days(Days::new(u64::from(week - 1) * 7))
      .ok_or_else(invalid)?;
    let resolved = Self { start };
    if resolved.fiscal_year() != year {
      return Err(invalid());
    }
    Ok(resolved)
  }
}

impl Serialize for FiscalWeek {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut s = serializer.serialize_struct("FiscalWeek", 4)?;
    s.serialize_field("start", &self.start)?;
    s.serialize_field("end", &self.end())?;
    s.serialize_field("fiscal_year", &self.fiscal_year())?;
    s.serialize_field("week_number", &self.number())?;
    s.end()
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use chrono::Weekday;

  use super::*;

  fn d(s: &str) -> NaiveDate { s.parse().unwrap() }

  #[test]
  fn saturday_maps_to_itself() {
    assert_eq!(week_start(d("2026-02-28")), d("2026-02-28"));
  }

  #[test]
  fn tuesday_maps_to_previous_saturday() {
    assert_eq!(week_start(d("2026-03-03")), d("2026-02-28"));
  }

  #[test]
  fn friday_maps_six_days_back() {
    assert_eq!(week_start(d("2026-03-06")), d("2026-02-28"));
  }

  #[test]
  fn every_date_resolves_within_its_week() {
    let mut date = d("2024-12-25");
    for _ in 0..400 {
      let start = week_start(date);
      assert_eq!(start.weekday(), Weekday::Sat);
      assert!(start <= date);
      assert!((date - start).num_days() < 7);
      date = date.succ_opt().unwrap();
    }
  }

  #[test]
  fn crosses_year_boundary() {
    assert_eq!(week_start(d("2025-01-02")), d("2024-12-28"));
  }

  #[test]
  fn week_one_starts_first_saturday_on_or_after_jan_31() {
    // 2026-01-31 is a Saturday.
    let w = FiscalWeek::containing(d("2026-02-02"));
    assert_eq!(w.start(), d("2026-01-31"));
    assert_eq!(w.fiscal_year(), 2026);
    assert_eq!(w.number(), 1);

    // 2025-01-31 is a Friday; week 1 starts on 2025-02-01.
    let w = FiscalWeek::containing(d("2025-02-01"));
    assert_eq!((w.fiscal_year(), w.number()), (2025, 1));
  }

  #[test]
  fn weeks_before_the_boundary_belong_to_previous_year() {
    // The week starting 2026-01-24 is the last week of fiscal 2025.
    let w = FiscalWeek::containing(d("2026-01-30"));
    assert_eq!(w.start(), d("2026-01-24"));
    assert_eq!(w.fiscal_year(), 2025);
    assert_eq!(w.number(), 52);
  }

  #[test]
  fn from_number_inverts_number() {
    let w = FiscalWeek::containing(d("2026-03-03"));
    assert_eq!(FiscalWeek::from_number(w.fiscal_year(), w.number()).unwrap(), w);
    assert_eq!(w.end(), d("2026-03-06"));
  }

  #[test]
  fn from_number_rejects_out_of_range() {
    assert!(FiscalWeek::from_number(2026, 0).is_err());
    assert!(FiscalWeek::from_number(2026, 54).is_err());
    // Fiscal 2025 has 52 weeks; week 53 would be week 1 of 2026.
    assert!(FiscalWeek::from_number(2025, 53).is_err());
  }

  #[test]
  fn resolver_is_total_at_range_edges() {
    // NaiveDate::MIN is a Thursday with no Saturday before it.
    assert_eq!(week_start(NaiveDate::MIN), NaiveDate::MIN);
    let first = FiscalWeek::containing(NaiveDate::MIN);
    assert!(first.number() >= 1);
    assert!(serde_json::to_value(first).is_ok());

    let last = FiscalWeek::containing(NaiveDate::MAX);
    assert_eq!(last.start().weekday(), Weekday::Sat);
    assert_eq!(last.end(), NaiveDate::MAX);
    let json = serde_json::to_value(last).unwrap();
    assert_eq!(json["end"], serde_json::to_value(NaiveDate::MAX).unwrap());

    let numbered = FiscalWeek::from_number(last.fiscal_year(), last.number()).unwrap();
    assert_eq!(numbered, last);
    assert!(serde_json::to_value(numbered).is_ok());
  }

  #[test]
  fn serializes_with_derived_fields() {
    let w = FiscalWeek::containing(d("2026-03-03"));
    let json = serde_json::to_value(w).unwrap();
    assert_eq!(json["start"], "2026-02-28");
    assert_eq!(json["end"], "2026-03-06");
    assert_eq!(json["fiscal_year"], 2026);
    assert_eq!(json["week_number"], 5);
  }
}
