//! SQL schema for the Storewalk SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- No uniqueness on (store_number, visit_date): duplicates are checked
-- before insert and may be force-saved.
CREATE TABLE IF NOT EXISTS visits (
    visit_id       INTEGER PRIMARY KEY AUTOINCREMENT,
    store_number   TEXT    NOT NULL,
    visit_date     TEXT    NOT NULL,   -- YYYY-MM-DD
    rating         TEXT    NOT NULL,   -- 'Green' | 'Yellow' | 'Red'
    notes_received INTEGER NOT NULL DEFAULT 0,
    created_at     TEXT    NOT NULL    -- RFC 3339 UTC, microseconds; server-assigned
);

-- One row per recorded metric. A missing row means not recorded.
CREATE TABLE IF NOT EXISTS visit_metrics (
    visit_id INTEGER NOT NULL REFERENCES visits(visit_id) ON DELETE CASCADE,
    metric   TEXT    NOT NULL,
    value    INTEGER NOT NULL,   -- hundredths for decimal metrics
    PRIMARY KEY (visit_id, metric)
);

CREATE TABLE IF NOT EXISTS visit_notes (
    note_id    INTEGER PRIMARY KEY AUTOINCREMENT,
    visit_id   INTEGER NOT NULL REFERENCES visits(visit_id) ON DELETE CASCADE,
    category   TEXT    NOT NULL,   -- 'observation' | 'market' | 'positive' | 'improvement'
    sequence   INTEGER NOT NULL,
    body       TEXT    NOT NULL CHECK (trim(body) <> ''),
    created_at TEXT    NOT NULL,
    UNIQUE (visit_id, category, sequence)
);

CREATE TABLE IF NOT EXISTS visit_photos (
    photo_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    visit_id     INTEGER NOT NULL REFERENCES visits(visit_id) ON DELETE CASCADE,
    path         TEXT    NOT NULL,   -- relative to the photo directory
    content_hash TEXT    NOT NULL,   -- hex SHA-256
    media_type   TEXT    NOT NULL,
    created_at   TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS tasks (
    task_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    content      TEXT    NOT NULL,
    priority     INTEGER NOT NULL DEFAULT 0,
    assigned_to  TEXT,
    due_date     TEXT,
    store_number TEXT,
    status       TEXT    NOT NULL DEFAULT 'new',
    created_at   TEXT    NOT NULL,
    updated_at   TEXT    NOT NULL,
    completed_at TEXT    -- non-NULL exactly when status = 'completed'
);

CREATE TABLE IF NOT EXISTS issues (
    issue_id     INTEGER PRIMARY KEY AUTOINCREMENT,
    kind         TEXT    NOT NULL,   -- 'feature' | 'bug' | 'feedback'
    title        TEXT    NOT NULL,
    description  TEXT,
    status       TEXT    NOT NULL DEFAULT 'new',
    created_at   TEXT    NOT NULL,
    updated_at   TEXT    NOT NULL,
    completed_at TEXT
);

CREATE TABLE IF NOT EXISTS gold_star_weeks (
    week_start TEXT PRIMARY KEY,   -- Saturday, YYYY-MM-DD
    note_1     TEXT,
    note_2     TEXT,
    note_3     TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS gold_star_completions (
    week_start   TEXT    NOT NULL REFERENCES gold_star_weeks(week_start) ON DELETE CASCADE,
    store_number TEXT    NOT NULL,
    note_number  INTEGER NOT NULL CHECK (note_number BETWEEN 1 AND 3),
    completed    INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT,
    PRIMARY KEY (week_start, store_number, note_number)
);

-- Follow-up state of a note; a note without a row is 'new' and unassigned.
CREATE TABLE IF NOT EXISTS note_tracking (
    note_id      INTEGER PRIMARY KEY REFERENCES visit_notes(note_id) ON DELETE CASCADE,
    status       TEXT    NOT NULL DEFAULT 'new',
    assigned_to  TEXT,
    completed_at TEXT,   -- non-NULL exactly when status = 'completed'
    updated_at   TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS note_updates (
    update_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    note_id    INTEGER NOT NULL REFERENCES visit_notes(note_id) ON DELETE CASCADE,
    body       TEXT    NOT NULL CHECK (trim(body) <> ''),
    created_by TEXT,
    created_at TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS enablers (
    enabler_id  INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT    NOT NULL,
    description TEXT,
    source      TEXT,
    status      TEXT    NOT NULL DEFAULT 'idea',   -- 'idea' | 'slide_made' | 'presented'
    week_start  TEXT,                              -- Saturday, YYYY-MM-DD
    created_at  TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);

CREATE TABLE IF NOT EXISTS enabler_completions (
    enabler_id   INTEGER NOT NULL REFERENCES enablers(enabler_id) ON DELETE CASCADE,
    store_number TEXT    NOT NULL,
    completed    INTEGER NOT NULL DEFAULT 0,
    completed_at TEXT,
    PRIMARY KEY (enabler_id, store_number)
);

CREATE INDEX IF NOT EXISTS visits_store_date_idx ON visits(store_number, visit_date);
CREATE INDEX IF NOT EXISTS visits_recent_idx     ON visits(visit_date, created_at);
CREATE INDEX IF NOT EXISTS notes_visit_idx       ON visit_notes(visit_id, category);
CREATE INDEX IF NOT EXISTS photos_visit_idx      ON visit_photos(visit_id);
CREATE INDEX IF NOT EXISTS note_updates_idx      ON note_updates(note_id);
CREATE INDEX IF NOT EXISTS enablers_week_idx     ON enablers(week_start);

PRAGMA user_version = 2;
";
