//! The SQLite implementation of [`TrackingStore`].

use chrono::Utc;
use rusqlite::{Connection, OptionalExtension as _};
use tracing::info;

use storewalk_core::{
  fiscal::FiscalWeek,
  market::{
    MarketNoteQuery, NewNoteUpdate, NoteTrackingChange, NoteUpdate, NoteUpdateId, TrackedNote,
    status_rank,
  },
  note::{NoteCategory, NoteId},
  tracking::{
    Enabler, EnablerCompletion, EnablerId, EnablerQuery, EnablerStatus, GoldStarCompletion,
    GoldStarNote, GoldStarNotes, GoldStarWeek, Issue, IssueId, IssueQuery, LIST_LIMIT,
    NewEnabler, NewIssue, NewTask, Task, TaskId, TaskQuery, WorkStatus,
  },
  store::TrackingStore,
  visit::StoreNumber,
};

use crate::{
  Error, Result, SqliteStore,
  encode::{
    COMPLETION_COLUMNS, ENABLER_COLUMNS, ENABLER_COMPLETION_COLUMNS, ISSUE_COLUMNS,
    NOTE_HIT_COLUMNS, NOTE_UPDATE_COLUMNS, RawCompletion, RawEnabler, RawEnablerCompletion,
    RawGoldStarWeek, RawIssue, RawNoteUpdate, RawTask, RawTrackedNote, TASK_COLUMNS,
    TRACKED_NOTE_COLUMNS, encode_date, encode_dt,
  },
};

/// `completed_at` for a status write: stamped on entry into `completed`,
/// kept while it stays there, cleared on exit. `?2` is the new status and
/// `?3` the current time.
const COMPLETED_AT: &str =
  "CASE WHEN ?2 = 'completed' THEN COALESCE(completed_at, ?3) ELSE NULL END";

fn read_task(conn: &Connection, id: TaskId) -> rusqlite::Result<Option<RawTask>> {
  conn
    .query_row(
      &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?1"),
      [id],
      RawTask::from_row,
    )
    .optional()
}

fn read_issue(conn: &Connection, id: IssueId) -> rusqlite::Result<Option<RawIssue>> {
  conn
    .query_row(
      &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE issue_id = ?1"),
      [id],
      RawIssue::from_row,
    )
    .optional()
}

/// Create the week row if it does not exist yet.
fn ensure_week(conn: &Connection, week_start: &str, at: &str) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT OR IGNORE INTO gold_star_weeks (week_start, created_at, updated_at)
     VALUES (?1, ?2, ?2)",
    rusqlite::params![week_start, at],
  )?;
  Ok(())
}

fn read_week(conn: &Connection, week_start: &str) -> rusqlite::Result<RawGoldStarWeek> {
  let notes = conn.query_row(
    "SELECT note_1, note_2, note_3 FROM gold_star_weeks WHERE week_start = ?1",
    [week_start],
    |row| Ok([row.get(0)?, row.get(1)?, row.get(2)?]),
  )?;
  let completions = conn
    .prepare_cached(&format!(
      "SELECT {COMPLETION_COLUMNS} FROM gold_star_completions
        WHERE week_start = ?1
        ORDER BY store_number, note_number"
    ))?
    .query_map([week_start], RawCompletion::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  Ok(RawGoldStarWeek { week_start: week_start.to_owned(), notes, completions })
}

/// Tracked notes matching `filter`, each with its update thread. `filter`
/// is SQL over the aliases `n`, `v` and `t`.
fn read_tracked_notes(
  conn: &Connection,
  filter: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawTrackedNote>> {
  let mut notes = conn
    .prepare(&format!(
      "SELECT {NOTE_HIT_COLUMNS}, {TRACKED_NOTE_COLUMNS}
         FROM visit_notes n
         JOIN visits v ON v.visit_id = n.visit_id
         LEFT JOIN note_tracking t ON t.note_id = n.note_id
        WHERE {filter}
        ORDER BY v.visit_date DESC, v.created_at DESC, n.sequence, n.note_id"
    ))?
    .query_map(params, RawTrackedNote::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let mut stmt = conn.prepare_cached(&format!(
    "SELECT {NOTE_UPDATE_COLUMNS} FROM note_updates
      WHERE note_id = ?1
      ORDER BY created_at DESC, update_id DESC"
  ))?;
  for note in &mut notes {
    note.updates = stmt
      .query_map([note.hit.note.note_id], RawNoteUpdate::from_row)?
      .collect::<rusqlite::Result<Vec<_>>>()?;
  }
  Ok(notes)
}

fn read_tracked_note(conn: &Connection, id: NoteId) -> rusqlite::Result<Option<RawTrackedNote>> {
  Ok(read_tracked_notes(conn, "n.note_id = ?1", [id])?.into_iter().next())
}

fn note_exists(conn: &Connection, id: NoteId) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM visit_notes WHERE note_id = ?1", [id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn read_enabler(conn: &Connection, id: EnablerId) -> rusqlite::Result<Option<RawEnabler>> {
  conn
    .query_row(
      &format!("SELECT {ENABLER_COLUMNS} FROM enablers e WHERE e.enabler_id = ?1"),
      [id],
      RawEnabler::from_row,
    )
    .optional()
}

fn enabler_exists(conn: &Connection, id: EnablerId) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM enablers WHERE enabler_id = ?1", [id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn missing_after_write(what: &str, id: i64) -> Error {
  Error::Decode(format!("{what} {id} missing after write"))
}

// ─── TrackingStore impl ──────────────────────────────────────────────────────

impl TrackingStore for SqliteStore {
  type Error = Error;

  // ── Tasks ─────────────────────────────────────────────────────────────────

  async fn create_task(&self, task: NewTask) -> Result<Task> {
    let task = task.validate()?;
    let due_str = task.due_date.map(encode_date);
    let store_str = task.store.as_ref().map(StoreNumber::to_string);
    let at_str = encode_dt(Utc::now());

    let (id, raw) = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO tasks (content, priority, assigned_to, due_date, store_number,
                              status, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, 'new', ?6, ?6)",
          rusqlite::params![
            task.content,
            task.priority,
            task.assigned_to,
            due_str,
            store_str,
            at_str
          ],
        )?;
        let id = conn.last_insert_rowid();
        Ok((id, read_task(conn, id)?))
      })
      .await?;

    info!(task_id = id, "task created");
    raw.ok_or_else(|| missing_after_write("task", id))?.into_task()
  }

  async fn list_tasks(&self, query: TaskQuery) -> Result<Vec<Task>> {
    let status_str = query.status.map(WorkStatus::as_str);
    let assignee = query.assigned_to.map(|a| a.trim().to_lowercase());
    let store_str = query.store.as_ref().map(StoreNumber::to_string);

    let raws = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .prepare(&format!(
              "SELECT {TASK_COLUMNS} FROM tasks
                WHERE (?1 IS NULL OR status = ?1)
                  AND (?2 IS NULL OR instr(lower(assigned_to), ?2) > 0)
                  AND (?3 IS NULL OR store_number = ?3)
                ORDER BY priority DESC, due_date IS NULL, due_date, created_at DESC, task_id DESC
                LIMIT ?4"
            ))?
            .query_map(
              rusqlite::params![status_str, assignee, store_str, LIST_LIMIT],
              RawTask::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        )
      })
      .await?;

    raws.into_iter().map(RawTask::into_task).collect()
  }

  async fn set_task_status(&self, id: TaskId, status: WorkStatus) -> Result<Option<Task>> {
    let status_str = status.as_str();
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          &format!(
            "UPDATE tasks SET status = ?2, updated_at = ?3, completed_at = {COMPLETED_AT}
              WHERE task_id = ?1"
          ),
          rusqlite::params![id, status_str, at_str],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        Ok(read_task(conn, id)?)
      })
      .await?;

    if raw.is_some() {
      info!(task_id = id, %status, "task status changed");
    }
    raw.map(RawTask::into_task).transpose()
  }

  async fn delete_task(&self, id: TaskId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM tasks WHERE task_id = ?1", [id])?))
      .await?;
    Ok(deleted > 0)
  }

  // ── Issues ────────────────────────────────────────────────────────────────

  async fn create_issue(&self, issue: NewIssue) -> Result<Issue> {
    let issue = issue.validate()?;
    let kind_str = issue.kind.as_str();
    let at_str = encode_dt(Utc::now());

    let (id, raw) = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO issues (kind, title, description, status, created_at, updated_at)
           VALUES (?1, ?2, ?3, 'new', ?4, ?4)",
          rusqlite::params![kind_str, issue.title, issue.description, at_str],
        )?;
        let id = conn.last_insert_rowid();
        Ok((id, read_issue(conn, id)?))
      })
      .await?;

    info!(issue_id = id, kind = kind_str, "issue created");
    raw.ok_or_else(|| missing_after_write("issue", id))?.into_issue()
  }

  async fn list_issues(&self, query: IssueQuery) -> Result<Vec<Issue>> {
    let status_str = query.status.map(WorkStatus::as_str);
    let kind_str = query.kind.map(|k| k.as_str());

    let raws = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .prepare(&format!(
              "SELECT {ISSUE_COLUMNS} FROM issues
                WHERE (?1 IS NULL OR status = ?1)
                  AND (?2 IS NULL OR kind = ?2)
                ORDER BY created_at DESC, issue_id DESC
                LIMIT ?3"
            ))?
            .query_map(rusqlite::params![status_str, kind_str, LIST_LIMIT], RawIssue::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        )
      })
      .await?;

    raws.into_iter().map(RawIssue::into_issue).collect()
  }

  async fn set_issue_status(&self, id: IssueId, status: WorkStatus) -> Result<Option<Issue>> {
    let status_str = status.as_str();
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          &format!(
            "UPDATE issues SET status = ?2, updated_at = ?3, completed_at = {COMPLETED_AT}
              WHERE issue_id = ?1"
          ),
          rusqlite::params![id, status_str, at_str],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        Ok(read_issue(conn, id)?)
      })
      .await?;

    if raw.is_some() {
      info!(issue_id = id, %status, "issue status changed");
    }
    raw.map(RawIssue::into_issue).transpose()
  }

  async fn delete_issue(&self, id: IssueId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM issues WHERE issue_id = ?1", [id])?))
      .await?;
    Ok(deleted > 0)
  }

  // ── Gold stars ────────────────────────────────────────────────────────────

  async fn gold_star_week(&self, week: FiscalWeek) -> Result<GoldStarWeek> {
    let week_str = encode_date(week.start());
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        ensure_week(conn, &week_str, &at_str)?;
        Ok(read_week(conn, &week_str)?)
      })
      .await?;
    raw.into_week()
  }

  async fn save_gold_star_notes(
    &self,
    week: FiscalWeek,
    notes: GoldStarNotes,
  ) -> Result<GoldStarWeek> {
    let notes = notes.normalized();
    let week_str = encode_date(week.start());
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO gold_star_weeks (week_start, note_1, note_2, note_3, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?5)
           ON CONFLICT (week_start) DO UPDATE SET
             note_1 = excluded.note_1,
             note_2 = excluded.note_2,
             note_3 = excluded.note_3,
             updated_at = excluded.updated_at",
          rusqlite::params![week_str, notes.note_1, notes.note_2, notes.note_3, at_str],
        )?;
        Ok(read_week(conn, &week_str)?)
      })
      .await?;

    info!(week_start = %week.start(), "gold star notes saved");
    raw.into_week()
  }

  async fn set_gold_star_completion(
    &self,
    week: FiscalWeek,
    store: StoreNumber,
    note: GoldStarNote,
    completed: bool,
  ) -> Result<GoldStarCompletion> {
    let week_str = encode_date(week.start());
    let store_str = store.to_string();
    let note_number = note.get();
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        ensure_week(&tx, &week_str, &at_str)?;
        tx.execute(
          "INSERT INTO gold_star_completions
             (week_start, store_number, note_number, completed, completed_at)
           VALUES (?1, ?2, ?3, ?4, CASE WHEN ?4 THEN ?5 ELSE NULL END)
           ON CONFLICT (week_start, store_number, note_number) DO UPDATE SET
             completed = excluded.completed,
             completed_at = CASE
               WHEN excluded.completed THEN COALESCE(gold_star_completions.completed_at, ?5)
               ELSE NULL
             END",
          rusqlite::params![week_str, store_str, note_number, completed, at_str],
        )?;
        let raw = tx
          .query_row(
            &format!(
              "SELECT {COMPLETION_COLUMNS} FROM gold_star_completions
                WHERE week_start = ?1 AND store_number = ?2 AND note_number = ?3"
            ),
            rusqlite::params![week_str, store_str, note_number],
            RawCompletion::from_row,
          )
          .optional()?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    info!(%store, note = note_number, completed, "gold star completion set");
    raw
      .ok_or_else(|| Error::Decode(format!("completion for store {store} missing after write")))?
      .into_completion()
  }

  // ── Note follow-up ────────────────────────────────────────────────────────

  async fn list_market_notes(&self, query: MarketNoteQuery) -> Result<Vec<TrackedNote>> {
    let category_str = NoteCategory::Market.as_str();
    let status_str = query.status.map(WorkStatus::as_str);
    let store_str = query.store.as_ref().map(StoreNumber::to_string);

    let raws = self
      .conn
      .call(move |conn| {
        Ok(read_tracked_notes(
          conn,
          "n.category = ?1
           AND (?2 IS NULL OR COALESCE(t.status, 'new') = ?2)
           AND (?3 IS NULL OR v.store_number = ?3)",
          rusqlite::params![category_str, status_str, store_str],
        )?)
      })
      .await?;

    let mut notes = raws
      .into_iter()
      .map(RawTrackedNote::into_tracked)
      .collect::<Result<Vec<_>>>()?;
    notes.sort_by_key(|n| status_rank(n.tracking.status));
    Ok(notes)
  }

  async fn tracked_note(&self, id: NoteId) -> Result<Option<TrackedNote>> {
    let raw = self
      .conn
      .call(move |conn| Ok(read_tracked_note(conn, id)?))
      .await?;
    raw.map(RawTrackedNote::into_tracked).transpose()
  }

  async fn set_note_tracking(
    &self,
    id: NoteId,
    change: NoteTrackingChange,
  ) -> Result<Option<TrackedNote>> {
    let change = change.validate()?;
    let status_str = change.status.map(WorkStatus::as_str);
    let assignee = change.assignee();
    let reassign = assignee.is_some();
    let assignee = assignee.flatten();
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !note_exists(&tx, id)? {
          return Ok(None);
        }
        tx.execute(
          "INSERT INTO note_tracking (note_id, status, assigned_to, completed_at, updated_at)
           VALUES (?1, COALESCE(?2, 'new'), ?3, CASE WHEN ?2 = 'completed' THEN ?5 END, ?5)
           ON CONFLICT (note_id) DO UPDATE SET
             status = COALESCE(?2, note_tracking.status),
             assigned_to = CASE WHEN ?4 THEN ?3 ELSE note_tracking.assigned_to END,
             completed_at = CASE
               WHEN ?2 IS NULL THEN note_tracking.completed_at
               WHEN ?2 = 'completed' THEN COALESCE(note_tracking.completed_at, ?5)
               ELSE NULL
             END,
             updated_at = ?5",
          rusqlite::params![id, status_str, assignee, reassign, at_str],
        )?;
        let raw = read_tracked_note(&tx, id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    if raw.is_some() {
      info!(note_id = id, status = ?change.status, "note tracking updated");
    }
    raw.map(RawTrackedNote::into_tracked).transpose()
  }

  async fn add_note_update(&self, id: NoteId, update: NewNoteUpdate) -> Result<Option<NoteUpdate>> {
    let update = update.validate()?;
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        if !note_exists(conn, id)? {
          return Ok(None);
        }
        conn.execute(
          "INSERT INTO note_updates (note_id, body, created_by, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![id, update.body, update.created_by, at_str],
        )?;
        Ok(
          conn
            .query_row(
              &format!("SELECT {NOTE_UPDATE_COLUMNS} FROM note_updates WHERE update_id = ?1"),
              [conn.last_insert_rowid()],
              RawNoteUpdate::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    if let Some(update) = &raw {
      info!(note_id = id, update_id = update.update_id, "note update added");
    }
    raw.map(RawNoteUpdate::into_update).transpose()
  }

  async fn delete_note_update(&self, id: NoteUpdateId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM note_updates WHERE update_id = ?1", [id])?)
      })
      .await?;
    Ok(deleted > 0)
  }

  // ── Enablers ──────────────────────────────────────────────────────────────

  async fn create_enabler(&self, enabler: NewEnabler) -> Result<Enabler> {
    let enabler = enabler.validate()?;
    let week_str = enabler.week.map(encode_date);
    let at_str = encode_dt(Utc::now());

    let (id, raw) = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO enablers (title, description, source, status, week_start,
                                 created_at, updated_at)
           VALUES (?1, ?2, ?3, 'idea', ?4, ?5, ?5)",
          rusqlite::params![
            enabler.title,
            enabler.description,
            enabler.source,
            week_str,
            at_str
          ],
        )?;
        let id = conn.last_insert_rowid();
        Ok((id, read_enabler(conn, id)?))
      })
      .await?;

    info!(enabler_id = id, "enabler created");
    raw.ok_or_else(|| missing_after_write("enabler", id))?.into_enabler()
  }

  async fn list_enablers(&self, query: EnablerQuery) -> Result<Vec<Enabler>> {
    let status_str = query.status.map(EnablerStatus::as_str);
    let week_str = query.week.map(|w| encode_date(w.start()));

    let raws = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .prepare(&format!(
              "SELECT {ENABLER_COLUMNS} FROM enablers e
                WHERE (?1 IS NULL OR e.status = ?1)
                  AND (?2 IS NULL OR e.week_start = ?2)
                ORDER BY e.week_start IS NULL, e.week_start DESC,
                         e.created_at DESC, e.enabler_id DESC
                LIMIT ?3"
            ))?
            .query_map(
              rusqlite::params![status_str, week_str, LIST_LIMIT],
              RawEnabler::from_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        )
      })
      .await?;

    raws.into_iter().map(RawEnabler::into_enabler).collect()
  }

  async fn set_enabler_status(
    &self,
    id: EnablerId,
    status: EnablerStatus,
  ) -> Result<Option<Enabler>> {
    let status_str = status.as_str();
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE enablers SET status = ?2, updated_at = ?3 WHERE enabler_id = ?1",
          rusqlite::params![id, status_str, at_str],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        Ok(read_enabler(conn, id)?)
      })
      .await?;

    if raw.is_some() {
      info!(enabler_id = id, %status, "enabler status changed");
    }
    raw.map(RawEnabler::into_enabler).transpose()
  }

  async fn delete_enabler(&self, id: EnablerId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM enablers WHERE enabler_id = ?1", [id])?))
      .await?;
    Ok(deleted > 0)
  }

  async fn enabler_completions(&self, id: EnablerId) -> Result<Option<Vec<EnablerCompletion>>> {
    let raws = self
      .conn
      .call(move |conn| {
        if !enabler_exists(conn, id)? {
          return Ok(None);
        }
        Ok(Some(
          conn
            .prepare_cached(&format!(
              "SELECT {ENABLER_COMPLETION_COLUMNS} FROM enabler_completions
                WHERE enabler_id = ?1
                ORDER BY store_number"
            ))?
            .query_map([id], RawEnablerCompletion::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        ))
      })
      .await?;

    raws
      .map(|raws| {
        raws
          .into_iter()
          .map(RawEnablerCompletion::into_completion)
          .collect::<Result<Vec<_>>>()
      })
      .transpose()
  }

  async fn set_enabler_completion(
    &self,
    id: EnablerId,
    store: StoreNumber,
    completed: bool,
  ) -> Result<Option<EnablerCompletion>> {
    let store_str = store.to_string();
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !enabler_exists(&tx, id)? {
          return Ok(None);
        }
        tx.execute(
          "INSERT INTO enabler_completions (enabler_id, store_number, completed, completed_at)
           VALUES (?1, ?2, ?3, CASE WHEN ?3 THEN ?4 ELSE NULL END)
           ON CONFLICT (enabler_id, store_number) DO UPDATE SET
             completed = excluded.completed,
             completed_at = CASE
               WHEN excluded.completed THEN COALESCE(enabler_completions.completed_at, ?4)
               ELSE NULL
             END",
          rusqlite::params![id, store_str, completed, at_str],
        )?;
        tx.execute(
          "UPDATE enablers SET updated_at = ?2 WHERE enabler_id = ?1",
          rusqlite::params![id, at_str],
        )?;
        let raw = tx
          .query_row(
            &format!(
              "SELECT {ENABLER_COMPLETION_COLUMNS} FROM enabler_completions
                WHERE enabler_id = ?1 AND store_number = ?2"
            ),
            rusqlite::params![id, store_str],
            RawEnablerCompletion::from_row,
          )
          .optional()?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    if raw.is_some() {
      info!(enabler_id = id, %store, completed, "enabler completion set");
    }
    raw.map(RawEnablerCompletion::into_completion).transpose()
  }
}
