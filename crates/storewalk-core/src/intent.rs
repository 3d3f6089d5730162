//! Rule-based routing of free-text assistant questions.
//!
//! Each question maps to exactly one [`Intent`], which the API answers with
//! a single store query. Rules are tried in priority order and the first
//! match wins; anything unrecognised falls back to summary statistics.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
  market::INSIGHT_DAYS,
  tracking::{EnablerStatus, IssueKind, WorkStatus},
  visit::{Rating, StoreNumber},
};

/// Visits returned for a store question that does not ask for just one.
pub const DEFAULT_VISIT_LIMIT: u32 = 5;

static STORE_NUMBER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\b\d{4,5}\b").expect("valid store number regex"));

static SINGLE_VISIT: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\b(last|latest|most recent)\s+visit\b").expect("valid single visit regex")
});

static ASSIGNED_TO: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"assigned to (\w+)").expect("valid assignee regex"));

static WEEK_NUMBER: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\b(?:week|wk|w)\s*(\d{1,2})\b").expect("valid week regex"));

static DAYS: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\b(\d{1,3})\s*days?\b").expect("valid days regex"));

static KEYWORD: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r#"\b(?:search|find)\s+(?:for\s+)?(?:stores?\s+with\s+)?["']?([^"'?]+)"#)
    .expect("valid keyword regex")
});

/// Leading words that make a search a visit lookup rather than a note search.
const VISIT_WORDS: &[&str] = &["green", "yellow", "red", "visits", "visit", "store", "stores"];

static RATING: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"\b(green|yellow|red)\b").expect("valid rating regex"));

/// What a question is asking for, with any filters read out of it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "intent", rename_all = "snake_case")]
pub enum Intent {
  Tasks {
    status:      Option<WorkStatus>,
    assigned_to: Option<String>,
    store:       Option<StoreNumber>,
  },
  GoldStars {
    week_number: Option<u32>,
  },
  Issues {
    status: Option<WorkStatus>,
    kind:   Option<IssueKind>,
  },
  SummaryStats,
  CompareStores {
    stores: Vec<StoreNumber>,
  },
  StoreTrends {
    store: StoreNumber,
  },
  SearchVisits {
    store:  StoreNumber,
    limit:  u32,
    rating: Option<Rating>,
  },
  Enablers {
    status: Option<EnablerStatus>,
  },
  MarketNotes {
    status: Option<WorkStatus>,
  },
  MarketInsights {
    days: u32,
  },
  SearchNotes {
    keyword: String,
  },
}

fn has_any(message: &str, words: &[&str]) -> bool { words.iter().any(|w| message.contains(w)) }

fn extract_status(message: &str) -> Option<WorkStatus> {
  if has_any(message, &["in progress", "in_progress"]) {
    Some(WorkStatus::InProgress)
  } else if message.contains("stalled") {
    Some(WorkStatus::Stalled)
  } else if has_any(message, &["completed", "done"]) {
    Some(WorkStatus::Completed)
  } else if has_any(message, &["new", "open"]) {
    Some(WorkStatus::New)
  } else {
    None
  }
}

fn extract_rating(message: &str) -> Option<Rating> {
  RATING
    .captures(message)
    .and_then(|c| Rating::parse(&c[1]).ok())
}

fn extract_issue_kind(message: &str) -> Option<IssueKind> {
  if message.contains("feedback") {
    Some(IssueKind::Feedback)
  } else if message.contains("bug") {
    Some(IssueKind::Bug)
  } else if message.contains("feature") {
    Some(IssueKind::Feature)
  } else {
    None
  }
}

fn extract_enabler_status(message: &str) -> Option<EnablerStatus> {
  if message.contains("idea") {
    Some(EnablerStatus::Idea)
  } else if message.contains("slide") {
    Some(EnablerStatus::SlideMade)
  } else if message.contains("presented") {
    Some(EnablerStatus::Presented)
  } else {
    None
  }
}

/// The search term of a "search for ..." or "find ..." question, unless it
/// asks for visits.
fn extract_keyword(message: &str) -> Option<String> {
  let keyword = KEYWORD.captures(message)?[1].trim().to_owned();
  let first = keyword.split_whitespace().next()?;
  if VISIT_WORDS.contains(&first) {
    return None;
  }
  Some(keyword)
}

/// Classify a question.
pub fn classify(message: &str) -> Intent {
  let lower = message.to_lowercase();
  let stores: Vec<StoreNumber> = STORE_NUMBER
    .find_iter(message)
    .filter_map(|m| StoreNumber::parse(m.as_str()).ok())
    .collect();
  let first_store = stores.first().cloned();

  if lower.contains("enabler") || (lower.contains("tip") && lower.contains("trick")) {
    return Intent::Enablers { status: extract_enabler_status(&lower) };
  }

  if has_any(&lower, &["task", "todo", "to-do"]) {
    return Intent::Tasks {
      status:      extract_status(&lower),
      assigned_to: ASSIGNED_TO.captures(&lower).map(|c| c[1].to_owned()),
      store:       first_store,
    };
  }

  if has_any(&lower, &["gold star", "goldstar"]) {
    return Intent::GoldStars {
      week_number: WEEK_NUMBER
        .captures(&lower)
        .and_then(|c| c[1].parse().ok()),
    };
  }

  if has_any(&lower, &["issue", "feedback", "bug", "feature request"]) {
    return Intent::Issues { status: extract_status(&lower), kind: extract_issue_kind(&lower) };
  }

  let market = lower.contains("market");
  if market
    && has_any(&lower, &[
      "status",
      "progress",
      "assigned",
      "completion",
      "outstanding",
      "open",
      "incomplete",
      "update",
    ])
  {
    return Intent::MarketNotes { status: extract_status(&lower) };
  }

  if has_any(&lower, &["summary", "stats", "overview"]) {
    return Intent::SummaryStats;
  }

  if market && has_any(&lower, &["insight", "note"]) {
    let days = DAYS
      .captures(&lower)
      .and_then(|c| c[1].parse().ok())
      .filter(|d| *d > 0)
      .unwrap_or(INSIGHT_DAYS);
    return Intent::MarketInsights { days };
  }

  if lower.contains("compare") && !stores.is_empty() {
    return Intent::CompareStores { stores };
  }

  if let Some(store) = first_store {
    if has_any(&lower, &["trend", "analysis"]) {
      return Intent::StoreTrends { store };
    }
    let single = SINGLE_VISIT.is_match(&lower) && !lower.contains("visits");
    if let Some(keyword) = extract_keyword(&lower) {
      return Intent::SearchNotes { keyword };
    }
    return Intent::SearchVisits {
      store,
      limit: if single { 1 } else { DEFAULT_VISIT_LIMIT },
      rating: extract_rating(&lower),
    };
  }

  if let Some(keyword) = extract_keyword(&lower) {
    return Intent::SearchNotes { keyword };
  }

  Intent::SummaryStats
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  fn store(s: &str) -> StoreNumber { StoreNumber::parse(s).unwrap() }

  #[test]
  fn last_visit_narrows_to_one() {
    assert_eq!(classify("What happened on the last visit to 1234?"), Intent::SearchVisits {
      store:  store("1234"),
      limit:  1,
      rating: None,
    });
  }

  #[test]
  fn store_question_defaults_to_five() {
    assert_eq!(classify("show me red visits for store 5678"), Intent::SearchVisits {
      store:  store("5678"),
      limit:  DEFAULT_VISIT_LIMIT,
      rating: Some(Rating::Red),
    });
  }

  #[test]
  fn plural_visits_is_not_single() {
    let intent = classify("last visit and other visits at 1234");
    assert!(matches!(intent, Intent::SearchVisits { limit: 5, .. }));
  }

  #[test]
  fn rating_words_need_boundaries() {
    // "reduced" contains "red" but is not a rating.
    let intent = classify("reduced overstock at 1234");
    assert!(matches!(intent, Intent::SearchVisits { rating: None, .. }));
  }

  #[test]
  fn tasks_take_priority() {
    assert_eq!(classify("stalled tasks assigned to dana for 1234"), Intent::Tasks {
      status:      Some(WorkStatus::Stalled),
      assigned_to: Some("dana".into()),
      store:       Some(store("1234")),
    });
  }

  #[test]
  fn gold_stars_read_week_number() {
    assert_eq!(classify("gold stars for week 12"), Intent::GoldStars { week_number: Some(12) });
    assert_eq!(classify("Gold Star notes"), Intent::GoldStars { week_number: None });
  }

  #[test]
  fn issues_read_kind_and_status() {
    assert_eq!(classify("open feedback items"), Intent::Issues {
      status: Some(WorkStatus::New),
      kind:   Some(IssueKind::Feedback),
    });
  }

  #[test]
  fn compare_collects_every_store() {
    assert_eq!(classify("compare 1234 and 56789"), Intent::CompareStores {
      stores: vec![store("1234"), store("56789")],
    });
  }

  #[test]
  fn trends_need_a_store() {
    assert_eq!(classify("trend analysis for 4321"), Intent::StoreTrends { store: store("4321") });
    assert_eq!(classify("any trends lately?"), Intent::SummaryStats);
  }

  #[test]
  fn short_and_long_numbers_are_not_stores() {
    assert_eq!(classify("how about 123 or 123456"), Intent::SummaryStats);
  }

  #[test]
  fn serializes_with_tag() {
    let json = serde_json::to_value(Intent::StoreTrends { store: store("1234") }).unwrap();
    assert_eq!(json, json!({ "intent": "store_trends", "store": "1234" }));
    let json = serde_json::to_value(Intent::SummaryStats).unwrap();
    assert_eq!(json, json!({ "intent": "summary_stats" }));
  }

  #[test]
  fn enablers_come_first() {
    assert_eq!(classify("enabler tasks with a slide"), Intent::Enablers {
      status: Some(EnablerStatus::SlideMade),
    });
    assert_eq!(classify("any tips and tricks?"), Intent::Enablers { status: None });
  }

  #[test]
  fn market_status_and_insights() {
    assert_eq!(classify("open market notes"), Intent::MarketNotes {
      status: Some(WorkStatus::New),
    });
    assert_eq!(classify("market notes in progress"), Intent::MarketNotes {
      status: Some(WorkStatus::InProgress),
    });
    assert_eq!(classify("market insights"), Intent::MarketInsights { days: INSIGHT_DAYS });
    assert_eq!(classify("market notes from the last 7 days"), Intent::MarketInsights {
      days: 7,
    });
  }

  #[test]
  fn keyword_search_skips_visit_lookups() {
    assert_eq!(classify("search for freezer doors?"), Intent::SearchNotes {
      keyword: "freezer doors".into(),
    });
    assert_eq!(classify("find 'price gap' at 1234"), Intent::SearchNotes {
      keyword: "price gap".into(),
    });
    assert!(matches!(classify("find visits for 1234"), Intent::SearchVisits { .. }));
    assert_eq!(classify("find red stores"), Intent::SummaryStats);
  }

  #[test]
  fn people_directory_questions_fall_through() {
    assert_eq!(classify("who are my champions?"), Intent::SummaryStats);
    assert_eq!(classify("mentee circle for 1234"), Intent::SearchVisits {
      store:  store("1234"),
      limit:  DEFAULT_VISIT_LIMIT,
      rating: None,
    });
  }
}
