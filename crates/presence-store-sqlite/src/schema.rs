//! SQL schema for the presence SQLite store.
//!
//! Executed once at connection startup. Upgrades from older files are gated
//! on `PRAGMA user_version` and run before [`SCHEMA`].

/// Full schema DDL; idempotent thanks to `IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

CREATE TABLE IF NOT EXISTS subjects (
    subject_id    TEXT PRIMARY KEY,
    name          TEXT NOT NULL,
    registration  TEXT UNIQUE,
    email         TEXT UNIQUE,
    created_at    TEXT NOT NULL,
    password_hash TEXT              -- argon2 PHC string; NULL disables self-service
);

CREATE TABLE IF NOT EXISTS environments (
    environment_id TEXT PRIMARY KEY,
    name           TEXT NOT NULL,
    kind           TEXT NOT NULL,
    capacity       INTEGER,
    created_at     TEXT NOT NULL
);

-- Entries are never deleted. The only UPDATE ever issued sets check_out_at
-- on a row where it is still NULL.
CREATE TABLE IF NOT EXISTS entries (
    entry_id       TEXT PRIMARY KEY,
    subject_id     TEXT NOT NULL REFERENCES subjects(subject_id),
    environment_id TEXT NOT NULL REFERENCES environments(environment_id),
    check_in_at    TEXT NOT NULL,   -- fixed-width RFC 3339 UTC, sortable
    check_out_at   TEXT,            -- NULL while open
    CHECK (check_out_at IS NULL OR check_out_at >= check_in_at)
);

-- At most one open entry per subject.
CREATE UNIQUE INDEX IF NOT EXISTS entries_one_open_per_subject
    ON entries(subject_id) WHERE check_out_at IS NULL;

CREATE INDEX IF NOT EXISTS entries_subject_idx     ON entries(subject_id, check_in_at);
CREATE INDEX IF NOT EXISTS entries_environment_idx ON entries(environment_id);

PRAGMA user_version = 2;
";

/// Version written by [`SCHEMA`].
pub const SCHEMA_VERSION: i64 = 2;

/// Version 1 predates subject credentials.
pub const MIGRATE_V1_TO_V2: &str = "
ALTER TABLE subjects ADD COLUMN password_hash TEXT;
PRAGMA user_version = 2;
";
