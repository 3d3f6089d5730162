//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::NaiveDate;
use serde_json::{Value, json};
use storewalk_core::{
  draft::{RawVisitDraft, RawVisitPatch, VisitDraft, VisitPatch},
  fiscal::FiscalWeek,
  market::{MarketNoteQuery, NewNoteUpdate, NoteSearch, NoteTrackingChange},
  metric::{Metric, MetricValue},
  note::{NoteCategory, NoteText},
  store::{RECENT_OVERALL, RECENT_PER_STORE, TrackingStore, VisitQuery, VisitStore},
  tracking::{
    EnablerQuery, EnablerStatus, GoldStarNote, GoldStarNotes, IssueKind, IssueQuery, NewEnabler,
    NewIssue, NewTask, TaskQuery, WorkStatus,
  },
  visit::{NewPhoto, Rating, StoreNumber},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn draft(value: Value) -> VisitDraft {
  let raw: RawVisitDraft = serde_json::from_value(value).unwrap();
  VisitDraft::from_raw(&raw).unwrap()
}

fn simple(store: &str, date: &str) -> VisitDraft {
  draft(json!({ "store": store, "date": date, "rating": "Green" }))
}

fn sn(s: &str) -> StoreNumber { StoreNumber::parse(s).unwrap() }

fn day(s: &str) -> NaiveDate { s.parse().unwrap() }

// ─── Visit creation ──────────────────────────────────────────────────────────

#[tokio::test]
async fn create_visit_persists_notes_and_metrics() {
  let s = store().await;
  let detail = s
    .create_visit(
      draft(json!({
        "storeNbr": "1234",
        "calendar_date": "2024-12-18",
        "rating": "Yellow",
        "store_notes": "Note A\n\n  \nNote B\n",
        "top_3": ["fix endcaps"],
        "metrics": { "vizpick": 85.5, "overstock": 0 },
      })),
      Vec::new(),
    )
    .await
    .unwrap();

  assert_eq!(detail.visit().store, sn("1234"));
  assert_eq!(detail.visit().rating, Rating::Yellow);
  assert!(!detail.visit().notes_received);

  let obs: Vec<_> = detail.notes[&NoteCategory::Observation]
    .iter()
    .map(|n| (n.sequence, n.body.as_str()))
    .collect();
  assert_eq!(obs, [(1, "Note A"), (2, "Note B")]);
  assert_eq!(detail.notes[&NoteCategory::Improvement].len(), 1);
  assert!(detail.notes[&NoteCategory::Market].is_empty());

  assert_eq!(
    detail.metrics[&Metric::Vizpick],
    Some(MetricValue::Decimal { hundredths: 8550 })
  );
  assert_eq!(detail.metrics[&Metric::Overstock], Some(MetricValue::Integer(0)));
  assert_eq!(detail.metrics[&Metric::Picks], None);
}

#[tokio::test]
async fn failed_note_insert_rolls_back_the_visit() {
  let s = store().await;
  s.conn
    .call(|conn| {
      conn.execute_batch(
        "CREATE TRIGGER reject_market BEFORE INSERT ON visit_notes
         WHEN NEW.category = 'market'
         BEGIN SELECT RAISE(ABORT, 'market notes rejected'); END;",
      )?;
      Ok(())
    })
    .await
    .unwrap();

  let result = s
    .create_visit(
      draft(json!({
        "store": "1234",
        "date": "2024-12-18",
        "rating": "Red",
        "observation": "kept?",
        "market": "boom",
        "metrics": { "picks": 4 },
      })),
      Vec::new(),
    )
    .await;
  assert!(matches!(result, Err(Error::Database(_))));

  assert!(s.list_visits(None).await.unwrap().is_empty());
  let leftovers: (i64, i64) = s
    .conn
    .call(|conn| {
      Ok(conn.query_row(
        "SELECT (SELECT COUNT(*) FROM visit_notes), (SELECT COUNT(*) FROM visit_metrics)",
        [],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )?)
    })
    .await
    .unwrap();
  assert_eq!(leftovers, (0, 0));
}

#[tokio::test]
async fn create_visit_records_photos() {
  let s = store().await;
  let photo = NewPhoto {
    path:         "ab12.jpg".into(),
    content_hash: "ab12".into(),
    media_type:   "image/jpeg".into(),
  };
  let detail = s.create_visit(simple("1234", "2024-12-18"), vec![photo]).await.unwrap();
  assert_eq!(detail.photos.len(), 1);
  assert_eq!(detail.photos[0].content_hash, "ab12");
}

// ─── Duplicate detection ─────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_check_returns_every_match() {
  let s = store().await;
  s.create_visit(simple("1234", "2024-12-18"), Vec::new()).await.unwrap();
  s.create_visit(simple("1234", "2024-12-18"), Vec::new()).await.unwrap();
  s.create_visit(simple("1234", "2024-12-19"), Vec::new()).await.unwrap();
  s.create_visit(simple("12345", "2024-12-18"), Vec::new()).await.unwrap();

  let check = s.check_duplicate(sn("1234"), day("2024-12-18")).await.unwrap();
  assert!(check.is_duplicate);
  assert_eq!(check.existing.len(), 2);
  assert!(check.existing.iter().all(|b| b.visit.store == sn("1234")));
}

#[tokio::test]
async fn duplicate_check_without_matches() {
  let s = store().await;
  s.create_visit(simple("1234", "2024-12-18"), Vec::new()).await.unwrap();
  let check = s.check_duplicate(sn("1234"), day("2024-12-17")).await.unwrap();
  assert!(!check.is_duplicate);
  assert!(check.existing.is_empty());
}

// ─── Briefs ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn store_listing_keeps_three_most_recent() {
  let s = store().await;
  for date in ["2024-12-01", "2024-12-15", "2024-12-08", "2024-12-22", "2024-11-30"] {
    s.create_visit(simple("1234", date), Vec::new()).await.unwrap();
  }
  s.create_visit(simple("5678", "2024-12-30"), Vec::new()).await.unwrap();

  let briefs = s.list_visits(Some(sn("1234"))).await.unwrap();
  let dates: Vec<String> = briefs.iter().map(|b| b.visit.date.to_string()).collect();
  assert_eq!(dates.len(), RECENT_PER_STORE as usize);
  assert_eq!(dates, ["2024-12-22", "2024-12-15", "2024-12-08"]);
}

#[tokio::test]
async fn same_day_ties_break_newest_first() {
  let s = store().await;
  let first = s.create_visit(simple("1234", "2024-12-18"), Vec::new()).await.unwrap();
  let second = s.create_visit(simple("1234", "2024-12-18"), Vec::new()).await.unwrap();

  let briefs = s.list_visits(None).await.unwrap();
  let ids: Vec<i64> = briefs.iter().map(|b| b.visit.visit_id).collect();
  assert_eq!(ids, [second.visit().visit_id, first.visit().visit_id]);
}

#[tokio::test]
async fn overall_listing_caps_at_one_hundred() {
  let s = store().await;
  let start = day("2024-01-01");
  for i in 0..(RECENT_OVERALL + 5) {
    let date = start + chrono::Days::new(u64::from(i));
    s.create_visit(simple(&format!("{}", 1000 + i % 7), &date.to_string()), Vec::new())
      .await
      .unwrap();
  }
  let briefs = s.list_visits(None).await.unwrap();
  assert_eq!(briefs.len(), RECENT_OVERALL as usize);
  assert!(briefs.windows(2).all(|w| w[0].visit.date >= w[1].visit.date));
}

#[tokio::test]
async fn briefs_carry_previews() {
  let s = store().await;
  let long = "x".repeat(120);
  s.create_visit(
    draft(json!({
      "store": "1234",
      "date": "2024-12-18",
      "rating": "Green",
      "market": [long, "second"],
    })),
    Vec::new(),
  )
  .await
  .unwrap();

  let brief = &s.list_visits(None).await.unwrap()[0];
  let market = &brief.previews[&NoteCategory::Market];
  assert_eq!(market.count, 2);
  assert_eq!(market.first.as_ref().unwrap().len(), 80);
  assert!(market.truncated);
  assert_eq!(brief.previews[&NoteCategory::Positive].count, 0);
}

#[tokio::test]
async fn search_filters_by_rating() {
  let s = store().await;
  s.create_visit(simple("1234", "2024-12-01"), Vec::new()).await.unwrap();
  s.create_visit(
    draft(json!({ "store": "1234", "date": "2024-12-02", "rating": "Red" })),
    Vec::new(),
  )
  .await
  .unwrap();

  let red = s
    .search_visits(VisitQuery { store: Some(sn("1234")), rating: Some(Rating::Red), limit: 5 })
    .await
    .unwrap();
  assert_eq!(red.len(), 1);
  assert_eq!(red[0].visit.rating, Rating::Red);
}

// ─── Detail ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn detail_of_missing_visit_is_none() {
  let s = store().await;
  assert!(s.visit_detail(42).await.unwrap().is_none());
}

#[tokio::test]
async fn detail_lists_every_metric_even_when_none_recorded() {
  let s = store().await;
  let created = s.create_visit(simple("1234", "2024-12-18"), Vec::new()).await.unwrap();
  let detail = s.visit_detail(created.visit().visit_id).await.unwrap().unwrap();
  assert_eq!(detail.metrics.len(), 17);
  assert!(detail.metrics.values().all(Option::is_none));
}

#[tokio::test]
async fn update_visit_sets_and_clears_metrics() {
  let s = store().await;
  let created = s
    .create_visit(
      draft(json!({
        "store": "1234", "date": "2024-12-18", "rating": "Green",
        "metrics": { "picks": 4, "mods": 1 },
      })),
      Vec::new(),
    )
    .await
    .unwrap();
  let id = created.visit().visit_id;

  let raw: RawVisitPatch = serde_json::from_value(json!({
    "rating": "red",
    "metrics": { "picks": null, "ftpr": 97.25 },
  }))
  .unwrap();
  let detail = s
    .update_visit(id, VisitPatch::from_raw(&raw).unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(detail.visit().rating, Rating::Red);
  assert_eq!(detail.metrics[&Metric::Picks], None);
  assert_eq!(detail.metrics[&Metric::Mods], Some(MetricValue::Integer(1)));
  assert_eq!(detail.metrics[&Metric::Ftpr], Some(MetricValue::Decimal { hundredths: 9725 }));

  assert!(s.update_visit(999, VisitPatch::default()).await.unwrap().is_none());
}

#[tokio::test]
async fn notes_received_toggles() {
  let s = store().await;
  let id = s
    .create_visit(simple("1234", "2024-12-18"), Vec::new())
    .await
    .unwrap()
    .visit()
    .visit_id;
  assert!(s.set_notes_received(id, true).await.unwrap());
  assert!(s.visit_detail(id).await.unwrap().unwrap().visit().notes_received);
  assert!(!s.set_notes_received(999, true).await.unwrap());
}

// ─── Notes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn deleting_a_note_leaves_a_gap_and_append_takes_max_plus_one() {
  let s = store().await;
  let created = s
    .create_visit(
      draft(json!({
        "store": "1234", "date": "2024-12-18", "rating": "Green",
        "market": ["one", "two", "three"],
      })),
      Vec::new(),
    )
    .await
    .unwrap();
  let id = created.visit().visit_id;
  let market = &created.notes[&NoteCategory::Market];

  assert!(s.delete_note(market[1].note_id).await.unwrap());
  assert!(!s.delete_note(market[1].note_id).await.unwrap());

  let appended = s
    .add_note(id, NoteCategory::Market, NoteText::parse("four").unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(appended.sequence, 4);

  let first_positive = s
    .add_note(id, NoteCategory::Positive, NoteText::parse("great staff").unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(first_positive.sequence, 1);

  let detail = s.visit_detail(id).await.unwrap().unwrap();
  let seqs: Vec<u32> = detail.notes[&NoteCategory::Market].iter().map(|n| n.sequence).collect();
  assert_eq!(seqs, [1, 3, 4]);
}

#[tokio::test]
async fn editing_a_note_keeps_its_sequence() {
  let s = store().await;
  let created = s
    .create_visit(
      draft(json!({
        "store": "1234", "date": "2024-12-18", "rating": "Green",
        "observation": "a\nb",
      })),
      Vec::new(),
    )
    .await
    .unwrap();
  let target = &created.notes[&NoteCategory::Observation][1];

  let edited = s
    .edit_note(target.note_id, NoteText::parse("  b, revised ").unwrap())
    .await
    .unwrap()
    .unwrap();
  assert_eq!(edited.sequence, 2);
  assert_eq!(edited.body.as_str(), "b, revised");

  assert!(s.edit_note(999, NoteText::parse("x").unwrap()).await.unwrap().is_none());
}

#[tokio::test]
async fn add_note_to_missing_visit_is_none() {
  let s = store().await;
  let note = s
    .add_note(7, NoteCategory::Market, NoteText::parse("x").unwrap())
    .await
    .unwrap();
  assert!(note.is_none());
}

#[tokio::test]
async fn deleting_a_visit_cascades() {
  let s = store().await;
  let created = s
    .create_visit(
      draft(json!({
        "store": "1234", "date": "2024-12-18", "rating": "Green",
        "observation": "a", "metrics": { "pcs": 3 },
      })),
      vec![NewPhoto {
        path:         "p.png".into(),
        content_hash: "p".into(),
        media_type:   "image/png".into(),
      }],
    )
    .await
    .unwrap();
  let id = created.visit().visit_id;

  assert!(s.delete_visit(id).await.unwrap());
  assert!(!s.delete_visit(id).await.unwrap());
  assert!(s.visit_detail(id).await.unwrap().is_none());

  let remaining: i64 = s
    .conn
    .call(|conn| {
      Ok(conn.query_row(
        "SELECT (SELECT COUNT(*) FROM visit_notes)
              + (SELECT COUNT(*) FROM visit_metrics)
              + (SELECT COUNT(*) FROM visit_photos)",
        [],
        |row| row.get(0),
      )?)
    })
    .await
    .unwrap();
  assert_eq!(remaining, 0);
}

// ─── Aggregates ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn store_stats_average_recorded_values_only() {
  let s = store().await;
  s.create_visit(
    draft(json!({
      "store": "1234", "date": "2024-12-01", "rating": "Green",
      "metrics": { "vizpick": 80, "picks": 2 },
    })),
    Vec::new(),
  )
  .await
  .unwrap();
  s.create_visit(
    draft(json!({
      "store": "1234", "date": "2024-12-08", "rating": "Red",
      "metrics": { "vizpick": 91.5 },
    })),
    Vec::new(),
  )
  .await
  .unwrap();

  let stats = s.store_stats(sn("1234")).await.unwrap();
  assert_eq!(stats.total_visits, 2);
  assert_eq!((stats.ratings.green, stats.ratings.red), (1, 1));
  assert_eq!(stats.last_visit, Some(day("2024-12-08")));
  assert_eq!(stats.metric_averages[&Metric::Vizpick], 85.75);
  assert_eq!(stats.metric_averages[&Metric::Picks], 2.0);
  assert!(!stats.metric_averages.contains_key(&Metric::Mods));
}

#[tokio::test]
async fn summary_stats_span_all_stores() {
  let s = store().await;
  let empty = s.summary_stats().await.unwrap();
  assert_eq!(empty.total_visits, 0);
  assert_eq!(empty.first_visit, None);

  s.create_visit(simple("1234", "2024-12-01"), Vec::new()).await.unwrap();
  s.create_visit(simple("5678", "2024-12-09"), Vec::new()).await.unwrap();
  s.create_visit(simple("1234", "2024-12-05"), Vec::new()).await.unwrap();

  let stats = s.summary_stats().await.unwrap();
  assert_eq!(stats.total_visits, 3);
  assert_eq!(stats.stores, 2);
  assert_eq!(stats.first_visit, Some(day("2024-12-01")));
  assert_eq!(stats.last_visit, Some(day("2024-12-09")));
  assert_eq!(stats.ratings.green, 3);
}

// ─── Tasks and issues ────────────────────────────────────────────────────────

#[tokio::test]
async fn task_completed_at_follows_status() {
  let s = store().await;
  let task = s
    .create_task(NewTask { content: "reset endcap".into(), ..NewTask::default() })
    .await
    .unwrap();
  assert_eq!(task.status, WorkStatus::New);
  assert!(task.completed_at.is_none());

  let done = s
    .set_task_status(task.task_id, WorkStatus::Completed)
    .await
    .unwrap()
    .unwrap();
  assert!(done.completed_at.is_some());

  let again = s
    .set_task_status(task.task_id, WorkStatus::Completed)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(again.completed_at, done.completed_at);

  let reopened = s
    .set_task_status(task.task_id, WorkStatus::InProgress)
    .await
    .unwrap()
    .unwrap();
  assert!(reopened.completed_at.is_none());

  assert!(s.set_task_status(999, WorkStatus::Stalled).await.unwrap().is_none());
}

#[tokio::test]
async fn blank_task_is_rejected() {
  let s = store().await;
  let err = s
    .create_task(NewTask { content: "  ".into(), ..NewTask::default() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Core(_)));
}

#[tokio::test]
async fn tasks_order_by_priority_then_due_date() {
  let s = store().await;
  let mk = |content: &str, priority: i32, due: Option<&str>, who: Option<&str>| NewTask {
    content: content.into(),
    priority,
    due_date: due.map(day),
    assigned_to: who.map(Into::into),
    store: None,
  };
  s.create_task(mk("low", 0, None, Some("Dana Smith"))).await.unwrap();
  s.create_task(mk("high undated", 5, None, None)).await.unwrap();
  s.create_task(mk("high due", 5, Some("2025-01-10"), Some("dana"))).await.unwrap();

  let all = s.list_tasks(TaskQuery::default()).await.unwrap();
  let order: Vec<&str> = all.iter().map(|t| t.content.as_str()).collect();
  assert_eq!(order, ["high due", "high undated", "low"]);

  let danas = s
    .list_tasks(TaskQuery { assigned_to: Some("DANA".into()), ..TaskQuery::default() })
    .await
    .unwrap();
  assert_eq!(danas.len(), 2);
}

#[tokio::test]
async fn issues_filter_and_complete() {
  let s = store().await;
  let bug = s
    .create_issue(NewIssue {
      kind:        IssueKind::Bug,
      title:       "Photo upload fails".into(),
      description: Some("on large images".into()),
    })
    .await
    .unwrap();
  s.create_issue(NewIssue {
    kind:        IssueKind::Feedback,
    title:       "Love the weekly view".into(),
    description: None,
  })
  .await
  .unwrap();

  let bugs = s
    .list_issues(IssueQuery { kind: Some(IssueKind::Bug), ..IssueQuery::default() })
    .await
    .unwrap();
  assert_eq!(bugs.len(), 1);

  let closed = s
    .set_issue_status(bug.issue_id, WorkStatus::Completed)
    .await
    .unwrap()
    .unwrap();
  assert!(closed.completed_at.is_some());

  let open = s
    .list_issues(IssueQuery { status: Some(WorkStatus::New), ..IssueQuery::default() })
    .await
    .unwrap();
  assert_eq!(open.len(), 1);
  assert!(s.delete_issue(bug.issue_id).await.unwrap());
}

// ─── Gold stars ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn gold_star_week_is_created_on_first_read() {
  let s = store().await;
  let week = FiscalWeek::containing(day("2026-03-03"));
  let gs = s.gold_star_week(week).await.unwrap();
  assert_eq!(gs.week_start, day("2026-02-28"));
  assert_eq!(gs.week_number, 5);
  assert_eq!(gs.notes, GoldStarNotes::default());
  assert!(gs.completions.is_empty());
}

#[tokio::test]
async fn gold_star_notes_and_completions() {
  let s = store().await;
  let week = FiscalWeek::containing(day("2026-03-03"));
  let saved = s
    .save_gold_star_notes(week, GoldStarNotes {
      note_1: Some("Zone softlines".into()),
      note_2: None,
      note_3: Some("  ".into()),
    })
    .await
    .unwrap();
  assert_eq!(saved.notes.note_1.as_deref(), Some("Zone softlines"));
  assert_eq!(saved.notes.note_3, None);

  let note = GoldStarNote::new(1).unwrap();
  let done = s
    .set_gold_star_completion(week, sn("1234"), note, true)
    .await
    .unwrap();
  assert!(done.completed);
  assert!(done.completed_at.is_some());

  let undone = s
    .set_gold_star_completion(week, sn("1234"), note, false)
    .await
    .unwrap();
  assert!(!undone.completed);
  assert!(undone.completed_at.is_none());

  let gs = s.gold_star_week(FiscalWeek::containing(day("2026-03-06"))).await.unwrap();
  assert_eq!(gs.completions.len(), 1);
  assert_eq!(gs.notes.note_1.as_deref(), Some("Zone softlines"));
}

// ─── Note follow-up ──────────────────────────────────────────────────────────

async fn market_visit(s: &SqliteStore, store: &str, date: &str, notes: Value) -> Vec<i64> {
  let detail = s
    .create_visit(
      draft(json!({
        "store": store, "date": date, "rating": "Yellow",
        "mkt_notes": notes, "store_notes": "Freezer door broken",
      })),
      Vec::new(),
    )
    .await
    .unwrap();
  detail.notes[&NoteCategory::Market].iter().map(|n| n.note_id).collect()
}

#[tokio::test]
async fn market_notes_default_to_new_and_list_in_progress_first() {
  let s = store().await;
  let older = market_visit(&s, "1234", "2024-12-01", json!(["comp remodel", "new signage"])).await;
  let newer = market_visit(&s, "5678", "2024-12-09", json!(["price match"])).await;

  let all = s.list_market_notes(MarketNoteQuery::default()).await.unwrap();
  let ids: Vec<_> = all.iter().map(|n| n.hit.note.note_id).collect();
  assert_eq!(ids, [newer[0], older[0], older[1]]);
  assert!(all.iter().all(|n| n.tracking.status == WorkStatus::New));
  assert!(all.iter().all(|n| n.hit.note.category == NoteCategory::Market));
  assert_eq!(all[0].hit.store, sn("5678"));

  let change = NoteTrackingChange {
    status:      Some(WorkStatus::InProgress),
    assigned_to: Some("Dana".into()),
  };
  let tracked = s.set_note_tracking(older[1], change).await.unwrap().unwrap();
  assert_eq!(tracked.tracking.status, WorkStatus::InProgress);
  assert_eq!(tracked.tracking.assigned_to.as_deref(), Some("Dana"));

  let all = s.list_market_notes(MarketNoteQuery::default()).await.unwrap();
  assert_eq!(all[0].hit.note.note_id, older[1]);

  let query = MarketNoteQuery { status: Some(WorkStatus::New), store: Some(sn("1234")) };
  let filtered = s.list_market_notes(query).await.unwrap();
  assert_eq!(filtered.len(), 1);
  assert_eq!(filtered[0].hit.note.note_id, older[0]);
}

#[tokio::test]
async fn note_tracking_keeps_unchanged_fields() {
  let s = store().await;
  let ids = market_visit(&s, "1234", "2024-12-01", json!(["comp remodel"])).await;
  let id = ids[0];

  let assign = NoteTrackingChange { status: None, assigned_to: Some("Lee".into()) };
  let assigned = s.set_note_tracking(id, assign).await.unwrap().unwrap();
  assert_eq!(assigned.tracking.status, WorkStatus::New);
  assert_eq!(assigned.tracking.assigned_to.as_deref(), Some("Lee"));

  let complete = NoteTrackingChange { status: Some(WorkStatus::Completed), assigned_to: None };
  let done = s.set_note_tracking(id, complete.clone()).await.unwrap().unwrap();
  assert_eq!(done.tracking.assigned_to.as_deref(), Some("Lee"));
  let stamped = done.tracking.completed_at;
  assert!(stamped.is_some());

  let again = s.set_note_tracking(id, complete).await.unwrap().unwrap();
  assert_eq!(again.tracking.completed_at, stamped);

  let reopen = NoteTrackingChange {
    status:      Some(WorkStatus::Stalled),
    assigned_to: Some(" ".into()),
  };
  let reopened = s.set_note_tracking(id, reopen).await.unwrap().unwrap();
  assert_eq!(reopened.tracking.completed_at, None);
  assert_eq!(reopened.tracking.assigned_to, None);

  let missing = NoteTrackingChange { status: Some(WorkStatus::New), assigned_to: None };
  assert!(s.set_note_tracking(9999, missing).await.unwrap().is_none());
  let err = s.set_note_tracking(id, NoteTrackingChange::default()).await.unwrap_err();
  assert!(matches!(err, Error::Core(_)));
}

#[tokio::test]
async fn note_updates_thread_and_cascade() {
  let s = store().await;
  let ids = market_visit(&s, "1234", "2024-12-01", json!(["comp remodel"])).await;
  let id = ids[0];

  let first = s
    .add_note_update(id, NewNoteUpdate { body: "called the DM".into(), created_by: None })
    .await
    .unwrap()
    .unwrap();
  let second = s
    .add_note_update(id, NewNoteUpdate {
      body:       " vendor booked ".into(),
      created_by: Some("Dana".into()),
    })
    .await
    .unwrap()
    .unwrap();
  assert_eq!(second.body, "vendor booked");
  assert!(s.add_note_update(9999, NewNoteUpdate::default()).await.is_err());
  let orphan = NewNoteUpdate { body: "x".into(), created_by: None };
  assert!(s.add_note_update(9999, orphan).await.unwrap().is_none());

  let tracked = s.tracked_note(id).await.unwrap().unwrap();
  let thread: Vec<_> = tracked.updates.iter().map(|u| u.update_id).collect();
  assert_eq!(thread, [second.update_id, first.update_id]);

  assert!(s.delete_note_update(first.update_id).await.unwrap());
  assert!(!s.delete_note_update(first.update_id).await.unwrap());

  s.set_note_tracking(id, NoteTrackingChange {
    status:      Some(WorkStatus::InProgress),
    assigned_to: None,
  })
  .await
  .unwrap();
  assert!(s.delete_note(id).await.unwrap());
  assert!(s.tracked_note(id).await.unwrap().is_none());

  let remaining: i64 = s
    .conn
    .call(|conn| {
      Ok(conn.query_row(
        "SELECT (SELECT COUNT(*) FROM note_tracking) + (SELECT COUNT(*) FROM note_updates)",
        [],
        |row| row.get(0),
      )?)
    })
    .await
    .unwrap();
  assert_eq!(remaining, 0);
}

#[tokio::test]
async fn note_search_spans_categories_case_insensitively() {
  let s = store().await;
  market_visit(&s, "1234", "2024-12-01", json!(["Freezer aisle competitor promo"])).await;
  market_visit(&s, "5678", "2024-12-09", json!(["price match"])).await;

  let hits = s.search_notes(NoteSearch::new("FREEZER")).await.unwrap();
  assert_eq!(hits.len(), 3);
  assert_eq!(hits[0].date, day("2024-12-09"));
  assert_eq!(hits[0].note.category, NoteCategory::Observation);
  assert!(hits.iter().any(|h| h.note.category == NoteCategory::Market));

  let limited = s.search_notes(NoteSearch { keyword: "freezer".into(), limit: 1 }).await.unwrap();
  assert_eq!(limited.len(), 1);

  assert!(s.search_notes(NoteSearch::new("forklift")).await.unwrap().is_empty());
  assert!(matches!(s.search_notes(NoteSearch::new(" ")).await, Err(Error::Core(_))));
}

#[tokio::test]
async fn market_notes_since_respects_the_window() {
  let s = store().await;
  market_visit(&s, "1234", "2024-11-01", json!(["old promo"])).await;
  market_visit(&s, "1234", "2024-12-01", json!(["comp remodel", "new signage"])).await;

  let recent = s.market_notes_since(day("2024-11-15")).await.unwrap();
  let bodies: Vec<_> = recent.iter().map(|h| h.note.body.as_str()).collect();
  assert_eq!(bodies, ["comp remodel", "new signage"]);
  assert_eq!(s.market_notes_since(day("2024-01-01")).await.unwrap().len(), 3);
}

// ─── Enablers ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn enablers_filter_by_status_and_week() {
  let s = store().await;
  let scheduled = s
    .create_enabler(NewEnabler {
      title: "Pack-out huddle".into(),
      week: Some(day("2026-03-03")),
      ..NewEnabler::default()
    })
    .await
    .unwrap();
  assert_eq!(scheduled.status, EnablerStatus::Idea);
  assert_eq!(scheduled.week_start, Some(day("2026-02-28")));
  assert_eq!(scheduled.week().map(|w| w.number()), Some(5));

  let later = s
    .create_enabler(NewEnabler {
      title: "Claims cart".into(),
      week: Some(day("2026-03-10")),
      ..NewEnabler::default()
    })
    .await
    .unwrap();
  let unscheduled = s
    .create_enabler(NewEnabler { title: "Zone board".into(), ..NewEnabler::default() })
    .await
    .unwrap();

  let all = s.list_enablers(EnablerQuery::default()).await.unwrap();
  let ids: Vec<_> = all.iter().map(|e| e.enabler_id).collect();
  assert_eq!(ids, [later.enabler_id, scheduled.enabler_id, unscheduled.enabler_id]);

  let week = FiscalWeek::containing(day("2026-03-06"));
  let in_week = s.list_enablers(EnablerQuery { status: None, week: Some(week) }).await.unwrap();
  assert_eq!(in_week.len(), 1);
  assert_eq!(in_week[0].enabler_id, scheduled.enabler_id);

  let presented = s
    .set_enabler_status(later.enabler_id, EnablerStatus::Presented)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(presented.status, EnablerStatus::Presented);
  let query = EnablerQuery { status: Some(EnablerStatus::Presented), week: None };
  assert_eq!(s.list_enablers(query).await.unwrap().len(), 1);
  assert!(s.set_enabler_status(999, EnablerStatus::Idea).await.unwrap().is_none());

  let err = s.create_enabler(NewEnabler::default()).await.unwrap_err();
  assert!(matches!(err, Error::Core(_)));
}

#[tokio::test]
async fn enabler_completions_count_per_store() {
  let s = store().await;
  let enabler = s
    .create_enabler(NewEnabler { title: "Pack-out huddle".into(), ..NewEnabler::default() })
    .await
    .unwrap();
  let id = enabler.enabler_id;

  let done = s.set_enabler_completion(id, sn("1234"), true).await.unwrap().unwrap();
  assert!(done.completed);
  assert!(done.completed_at.is_some());
  s.set_enabler_completion(id, sn("5678"), false).await.unwrap();

  let again = s.set_enabler_completion(id, sn("1234"), true).await.unwrap().unwrap();
  assert_eq!(again.completed_at, done.completed_at);

  let listed = s.list_enablers(EnablerQuery::default()).await.unwrap();
  assert_eq!((listed[0].completed_count, listed[0].total_tracked), (1, 2));

  let completions = s.enabler_completions(id).await.unwrap().unwrap();
  let stores: Vec<_> = completions.iter().map(|c| c.store.to_string()).collect();
  assert_eq!(stores, ["1234", "5678"]);

  assert!(s.set_enabler_completion(999, sn("1234"), true).await.unwrap().is_none());
  assert!(s.enabler_completions(999).await.unwrap().is_none());

  assert!(s.delete_enabler(id).await.unwrap());
  assert!(s.enabler_completions(id).await.unwrap().is_none());
  let remaining: i64 = s
    .conn
    .call(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM enabler_completions", [], |r| r.get(0))?))
    .await
    .unwrap();
  assert_eq!(remaining, 0);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn closed_store_rejects_calls() {
  let s = store().await;
  let handle = s.clone();
  s.close().await.unwrap();
  assert!(matches!(handle.summary_stats().await, Err(Error::Database(_))));
}
