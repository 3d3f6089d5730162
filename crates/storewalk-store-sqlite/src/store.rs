//! The SQLite implementation of [`VisitStore`].

use std::path::Path;

use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use tracing::{debug, info};

use storewalk_core::{
  draft::{VisitDraft, VisitPatch},
  market::{NoteHit, NoteSearch},
  metric::{Metric, MetricKind},
  note::{Note, NoteCategory, NoteId, NoteText},
  store::{VisitQuery, VisitStore},
  visit::{
    DuplicateCheck, NewPhoto, PhotoRef, RatingCounts, StoreNumber, StoreStats, SummaryStats,
    VisitBrief, VisitDetail, VisitId,
  },
};

use crate::{
  Error, Result,
  encode::{
    NOTE_COLUMNS, NOTE_HIT_COLUMNS, PHOTO_COLUMNS, RawBrief, RawDetail, RawNote, RawNoteHit,
    RawPhoto, RawPreview, RawVisit, VISIT_COLUMNS, decode_date, decode_metric, decode_rating,
    encode_date, encode_dt,
  },
  schema::SCHEMA,
};

/// Brief ordering shared by every visit listing.
const VISIT_ORDER: &str = "ORDER BY visit_date DESC, created_at DESC, visit_id DESC";

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Storewalk store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  pub(crate) conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Close the connection, flushing the WAL. Clones of this store fail
  /// every later call.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    info!("store closed");
    Ok(())
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row helpers ─────────────────────────────────────────────────────────────
//
// These run inside `Connection::call` and take a plain `&Connection` so they
// work on a transaction as well.

fn read_previews(conn: &Connection, visit_id: VisitId) -> rusqlite::Result<Vec<RawPreview>> {
  let mut stmt = conn.prepare_cached(
    "SELECT n.category,
            COUNT(*),
            (SELECT f.body FROM visit_notes f
              WHERE f.visit_id = n.visit_id AND f.category = n.category
              ORDER BY f.sequence LIMIT 1)
       FROM visit_notes n
      WHERE n.visit_id = ?1
      GROUP BY n.category",
  )?;
  stmt
    .query_map([visit_id], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
    .collect()
}

/// Run a visit query and attach previews to each row.
fn read_briefs(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<RawBrief>> {
  let visits = conn
    .prepare(sql)?
    .query_map(params, RawVisit::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  visits
    .into_iter()
    .map(|visit| {
      let previews = read_previews(conn, visit.visit_id)?;
      Ok(RawBrief { visit, previews })
    })
    .collect()
}

fn read_detail(conn: &Connection, visit_id: VisitId) -> rusqlite::Result<Option<RawDetail>> {
  let visit = conn
    .query_row(
      &format!("SELECT {VISIT_COLUMNS} FROM visits WHERE visit_id = ?1"),
      [visit_id],
      RawVisit::from_row,
    )
    .optional()?;
  let Some(visit) = visit else {
    return Ok(None);
  };

  let notes = conn
    .prepare_cached(&format!(
      "SELECT {NOTE_COLUMNS} FROM visit_notes WHERE visit_id = ?1 ORDER BY category, sequence"
    ))?
    .query_map([visit_id], RawNote::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let metrics = conn
    .prepare_cached("SELECT metric, value FROM visit_metrics WHERE visit_id = ?1")?
    .query_map([visit_id], |row| Ok((row.get(0)?, row.get(1)?)))?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  let photos = conn
    .prepare_cached(&format!(
      "SELECT {PHOTO_COLUMNS} FROM visit_photos WHERE visit_id = ?1 ORDER BY photo_id"
    ))?
    .query_map([visit_id], RawPhoto::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;

  Ok(Some(RawDetail { visit, notes, metrics, photos }))
}

fn read_note(conn: &Connection, note_id: NoteId) -> rusqlite::Result<Option<RawNote>> {
  conn
    .query_row(
      &format!("SELECT {NOTE_COLUMNS} FROM visit_notes WHERE note_id = ?1"),
      [note_id],
      RawNote::from_row,
    )
    .optional()
}

fn visit_exists(conn: &Connection, visit_id: VisitId) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row("SELECT 1 FROM visits WHERE visit_id = ?1", [visit_id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

fn insert_photo(
  conn: &Connection,
  visit_id: VisitId,
  photo: &NewPhoto,
  at: &str,
) -> rusqlite::Result<i64> {
  conn.execute(
    "INSERT INTO visit_photos (visit_id, path, content_hash, media_type, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5)",
    rusqlite::params![visit_id, photo.path, photo.content_hash, photo.media_type, at],
  )?;
  Ok(conn.last_insert_rowid())
}

fn counts_by_rating(
  conn: &Connection,
  sql: &str,
  params: impl rusqlite::Params,
) -> rusqlite::Result<Vec<(String, i64)>> {
  conn
    .prepare(sql)?
    .query_map(params, |row| Ok((row.get(0)?, row.get(1)?)))?
    .collect()
}

fn tally(rows: Vec<(String, i64)>) -> Result<RatingCounts> {
  let mut counts = RatingCounts::default();
  for (rating, n) in rows {
    counts.add(decode_rating(&rating)?, u32::try_from(n).unwrap_or(u32::MAX));
  }
  Ok(counts)
}

fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

fn missing_after_write(visit_id: VisitId) -> Error {
  Error::Decode(format!("visit {visit_id} missing after write"))
}

// ─── VisitStore impl ─────────────────────────────────────────────────────────

impl VisitStore for SqliteStore {
  type Error = Error;

  async fn create_visit(&self, draft: VisitDraft, photos: Vec<NewPhoto>) -> Result<VisitDetail> {
    let store_str = draft.store.to_string();
    let date_str = encode_date(draft.date);
    let rating_str = draft.rating.as_str();
    let at_str = encode_dt(Utc::now());
    let metrics: Vec<(&'static str, i64)> =
      draft.metrics.iter().map(|(m, v)| (m.as_str(), v.stored())).collect();
    let notes: Vec<(&'static str, u32, String)> = draft
      .notes
      .iter()
      .map(|n| (n.category.as_str(), n.sequence, n.body.to_string()))
      .collect();
    let note_count = notes.len();

    let (visit_id, raw) = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO visits (store_number, visit_date, rating, notes_received, created_at)
           VALUES (?1, ?2, ?3, 0, ?4)",
          rusqlite::params![store_str, date_str, rating_str, at_str],
        )?;
        let visit_id = tx.last_insert_rowid();

        for (metric, value) in &metrics {
          tx.execute(
            "INSERT INTO visit_metrics (visit_id, metric, value) VALUES (?1, ?2, ?3)",
            rusqlite::params![visit_id, metric, value],
          )?;
        }
        for (category, sequence, body) in &notes {
          tx.execute(
            "INSERT INTO visit_notes (visit_id, category, sequence, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            rusqlite::params![visit_id, category, sequence, body, at_str],
          )?;
        }
        for photo in &photos {
          insert_photo(&tx, visit_id, photo, &at_str)?;
        }

        let raw = read_detail(&tx, visit_id)?;
        tx.commit()?;
        Ok((visit_id, raw))
      })
      .await?;

    info!(visit_id, notes = note_count, "visit created");
    raw.ok_or_else(|| missing_after_write(visit_id))?.into_detail()
  }

  async fn check_duplicate(&self, store: StoreNumber, date: NaiveDate) -> Result<DuplicateCheck> {
    let store_str = store.to_string();
    let date_str = encode_date(date);

    let raws = self
      .conn
      .call(move |conn| {
        Ok(read_briefs(
          conn,
          &format!(
            "SELECT {VISIT_COLUMNS} FROM visits
              WHERE store_number = ?1 AND visit_date = ?2
              {VISIT_ORDER}"
          ),
          rusqlite::params![store_str, date_str],
        )?)
      })
      .await?;

    let existing = raws.into_iter().map(RawBrief::into_brief).collect::<Result<Vec<_>>>()?;
    debug!(%store, %date, matches = existing.len(), "duplicate check");
    Ok(DuplicateCheck::from_matches(existing))
  }

  async fn search_visits(&self, query: VisitQuery) -> Result<Vec<VisitBrief>> {
    let store_str = query.store.as_ref().map(StoreNumber::to_string);
    let rating_str = query.rating.map(|r| r.as_str());
    let limit = query.limit;

    let raws = self
      .conn
      .call(move |conn| {
        Ok(read_briefs(
          conn,
          &format!(
            "SELECT {VISIT_COLUMNS} FROM visits
              WHERE (?1 IS NULL OR store_number = ?1)
                AND (?2 IS NULL OR rating = ?2)
              {VISIT_ORDER}
              LIMIT ?3"
          ),
          rusqlite::params![store_str, rating_str, limit],
        )?)
      })
      .await?;

    debug!(rows = raws.len(), "visit search");
    raws.into_iter().map(RawBrief::into_brief).collect()
  }

  async fn visit_detail(&self, id: VisitId) -> Result<Option<VisitDetail>> {
    let raw = self.conn.call(move |conn| Ok(read_detail(conn, id)?)).await?;
    raw.map(RawDetail::into_detail).transpose()
  }

  async fn update_visit(&self, id: VisitId, patch: VisitPatch) -> Result<Option<VisitDetail>> {
    let store_str = patch.store.as_ref().map(StoreNumber::to_string);
    let date_str = patch.date.map(encode_date);
    let rating_str = patch.rating.map(|r| r.as_str());
    let changes: Vec<(&'static str, Option<i64>)> = patch
      .metrics
      .iter()
      .map(|(m, v)| (m.as_str(), v.map(|v| v.stored())))
      .collect();

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let updated = tx.execute(
          "UPDATE visits
              SET store_number = COALESCE(?2, store_number),
                  visit_date   = COALESCE(?3, visit_date),
                  rating       = COALESCE(?4, rating)
            WHERE visit_id = ?1",
          rusqlite::params![id, store_str, date_str, rating_str],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        for (metric, value) in &changes {
          match value {
            Some(v) => tx.execute(
              "INSERT INTO visit_metrics (visit_id, metric, value) VALUES (?1, ?2, ?3)
               ON CONFLICT (visit_id, metric) DO UPDATE SET value = excluded.value",
              rusqlite::params![id, metric, v],
            )?,
            None => tx.execute(
              "DELETE FROM visit_metrics WHERE visit_id = ?1 AND metric = ?2",
              rusqlite::params![id, metric],
            )?,
          };
        }
        let raw = read_detail(&tx, id)?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    if raw.is_some() {
      info!(visit_id = id, "visit updated");
    }
    raw.map(RawDetail::into_detail).transpose()
  }

  async fn delete_visit(&self, id: VisitId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM visits WHERE visit_id = ?1", [id])?))
      .await?;
    if deleted > 0 {
      info!(visit_id = id, "visit deleted");
    }
    Ok(deleted > 0)
  }

  async fn set_notes_received(&self, id: VisitId, received: bool) -> Result<bool> {
    let updated = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE visits SET notes_received = ?2 WHERE visit_id = ?1",
          rusqlite::params![id, received],
        )?)
      })
      .await?;
    Ok(updated > 0)
  }

  // ── Notes ─────────────────────────────────────────────────────────────────

  async fn add_note(
    &self,
    visit_id: VisitId,
    category: NoteCategory,
    body: NoteText,
  ) -> Result<Option<Note>> {
    let category_str = category.as_str();
    let body_str = body.to_string();
    let at_str = encode_dt(Utc::now());

    let raw = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        if !visit_exists(&tx, visit_id)? {
          return Ok(None);
        }
        tx.execute(
          "INSERT INTO visit_notes (visit_id, category, sequence, body, created_at)
           SELECT ?1, ?2, COALESCE(MAX(sequence), 0) + 1, ?3, ?4
             FROM visit_notes
            WHERE visit_id = ?1 AND category = ?2",
          rusqlite::params![visit_id, category_str, body_str, at_str],
        )?;
        let raw = read_note(&tx, tx.last_insert_rowid())?;
        tx.commit()?;
        Ok(raw)
      })
      .await?;

    if let Some(note) = &raw {
      info!(visit_id, note_id = note.note_id, %category, "note added");
    }
    raw.map(RawNote::into_note).transpose()
  }

  async fn edit_note(&self, id: NoteId, body: NoteText) -> Result<Option<Note>> {
    let body_str = body.to_string();
    let raw = self
      .conn
      .call(move |conn| {
        let updated = conn.execute(
          "UPDATE visit_notes SET body = ?2 WHERE note_id = ?1",
          rusqlite::params![id, body_str],
        )?;
        if updated == 0 {
          return Ok(None);
        }
        Ok(read_note(conn, id)?)
      })
      .await?;
    raw.map(RawNote::into_note).transpose()
  }

  async fn delete_note(&self, id: NoteId) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| Ok(conn.execute("DELETE FROM visit_notes WHERE note_id = ?1", [id])?))
      .await?;
    Ok(deleted > 0)
  }

  async fn search_notes(&self, search: NoteSearch) -> Result<Vec<NoteHit>> {
    let search = search.validate()?;
    let needle = search.keyword.to_lowercase();
    let limit = search.limit;

    let raws = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .prepare_cached(&format!(
              "SELECT {NOTE_HIT_COLUMNS}
                 FROM visit_notes n
                 JOIN visits v ON v.visit_id = n.visit_id
                WHERE instr(lower(n.body), ?1) > 0
                ORDER BY v.visit_date DESC, v.created_at DESC, n.category, n.sequence
                LIMIT ?2"
            ))?
            .query_map(rusqlite::params![needle, limit], RawNoteHit::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        )
      })
      .await?;

    debug!(keyword = %search.keyword, hits = raws.len(), "note search");
    raws.into_iter().map(RawNoteHit::into_hit).collect()
  }

  async fn market_notes_since(&self, since: NaiveDate) -> Result<Vec<NoteHit>> {
    let since_str = encode_date(since);
    let category_str = NoteCategory::Market.as_str();

    let raws = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .prepare_cached(&format!(
              "SELECT {NOTE_HIT_COLUMNS}
                 FROM visit_notes n
                 JOIN visits v ON v.visit_id = n.visit_id
                WHERE n.category = ?1 AND v.visit_date >= ?2
                ORDER BY v.visit_date DESC, v.created_at DESC, n.sequence"
            ))?
            .query_map(rusqlite::params![category_str, since_str], RawNoteHit::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        )
      })
      .await?;

    raws.into_iter().map(RawNoteHit::into_hit).collect()
  }

  // ── Photos ────────────────────────────────────────────────────────────────

  async fn add_photo(&self, visit_id: VisitId, photo: NewPhoto) -> Result<Option<PhotoRef>> {
    let at_str = encode_dt(Utc::now());
    let raw = self
      .conn
      .call(move |conn| {
        if !visit_exists(conn, visit_id)? {
          return Ok(None);
        }
        let photo_id = insert_photo(conn, visit_id, &photo, &at_str)?;
        Ok(
          conn
            .query_row(
              &format!("SELECT {PHOTO_COLUMNS} FROM visit_photos WHERE photo_id = ?1"),
              [photo_id],
              RawPhoto::from_row,
            )
            .optional()?,
        )
      })
      .await?;
    if raw.is_some() {
      info!(visit_id, "photo attached");
    }
    raw.map(RawPhoto::into_photo).transpose()
  }

  // ── Aggregates ────────────────────────────────────────────────────────────

  async fn store_stats(&self, store: StoreNumber) -> Result<StoreStats> {
    let store_str = store.to_string();

    let (ratings, last_visit, averages) = self
      .conn
      .call(move |conn| {
        let ratings = counts_by_rating(
          conn,
          "SELECT rating, COUNT(*) FROM visits WHERE store_number = ?1 GROUP BY rating",
          [&store_str],
        )?;
        let last_visit: Option<String> = conn.query_row(
          "SELECT MAX(visit_date) FROM visits WHERE store_number = ?1",
          [&store_str],
          |row| row.get(0),
        )?;
        let averages = conn
          .prepare(
            "SELECT m.metric, AVG(m.value)
               FROM visit_metrics m
               JOIN visits v ON v.visit_id = m.visit_id
              WHERE v.store_number = ?1
              GROUP BY m.metric",
          )?
          .query_map([&store_str], |row| Ok((row.get::<_, String>(0)?, row.get::<_, f64>(1)?)))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok((ratings, last_visit, averages))
      })
      .await?;

    let ratings = tally(ratings)?;
    let mut metric_averages = std::collections::BTreeMap::new();
    for (name, mean) in averages {
      let metric: Metric = decode_metric(&name)?;
      let mean = match metric.kind() {
        MetricKind::Decimal => mean / 100.0,
        MetricKind::Integer => mean,
      };
      metric_averages.insert(metric, (mean * 100.0).round() / 100.0);
    }

    Ok(StoreStats {
      store,
      total_visits: ratings.total(),
      ratings,
      last_visit: decode_opt_date(last_visit)?,
      metric_averages,
    })
  }

  async fn summary_stats(&self) -> Result<SummaryStats> {
    let (ratings, (stores, first, last)) = self
      .conn
      .call(|conn| {
        let ratings =
          counts_by_rating(conn, "SELECT rating, COUNT(*) FROM visits GROUP BY rating", [])?;
        let span: (i64, Option<String>, Option<String>) = conn.query_row(
          "SELECT COUNT(DISTINCT store_number), MIN(visit_date), MAX(visit_date) FROM visits",
          [],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;
        Ok((ratings, span))
      })
      .await?;

    let ratings = tally(ratings)?;
    Ok(SummaryStats {
      total_visits: ratings.total(),
      stores: u32::try_from(stores).unwrap_or(u32::MAX),
      first_visit: decode_opt_date(first)?,
      last_visit: decode_opt_date(last)?,
      ratings,
    })
  }
}
