//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 UTC strings with a fixed microsecond
//! precision, so that text ordering in SQL matches chronological ordering.
//! UUIDs are stored as hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, SubsecRound as _, Utc};
use presence_core::{
  directory::{Environment, Subject},
  entry::Entry,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ─────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ────────────────────────────────────────────────────────────

/// Truncate to the precision the store keeps, so values handed back to
/// callers equal what a later read returns.
pub fn to_stored_precision(dt: DateTime<Utc>) -> DateTime<Utc> { dt.trunc_subsecs(6) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Row types ───────────────────────────────────────────────────────────────

pub const ENTRY_COLUMNS: &str =
  "entry_id, subject_id, environment_id, check_in_at, check_out_at";

/// Raw strings read directly from an `entries` row.
pub struct RawEntry {
  pub entry_id:       String,
  pub subject_id:     String,
  pub environment_id: String,
  pub check_in_at:    String,
  pub check_out_at:   Option<String>,
}

impl RawEntry {
  /// Map a row selected with [`ENTRY_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:       row.get(0)?,
      subject_id:     row.get(1)?,
      environment_id: row.get(2)?,
      check_in_at:    row.get(3)?,
      check_out_at:   row.get(4)?,
    })
  }

  pub fn into_entry(self) -> Result<Entry> {
    Ok(Entry {
      entry_id:       decode_uuid(&self.entry_id)?,
      subject_id:     decode_uuid(&self.subject_id)?,
      environment_id: decode_uuid(&self.environment_id)?,
      check_in_at:    decode_dt(&self.check_in_at)?,
      check_out_at:   self.check_out_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

pub const SUBJECT_COLUMNS: &str =
  "subject_id, name, registration, email, created_at, password_hash";

/// Raw strings read directly from a `subjects` row.
pub struct RawSubject {
  pub subject_id:    String,
  pub name:          String,
  pub registration:  Option<String>,
  pub email:         Option<String>,
  pub created_at:    String,
  pub password_hash: Option<String>,
}

impl RawSubject {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      subject_id:    row.get(0)?,
      name:          row.get(1)?,
      registration:  row.get(2)?,
      email:         row.get(3)?,
      created_at:    row.get(4)?,
      password_hash: row.get(5)?,
    })
  }

  pub fn into_subject(self) -> Result<Subject> {
    Ok(Subject {
      subject_id:    decode_uuid(&self.subject_id)?,
      name:          self.name,
      registration:  self.registration,
      email:         self.email,
      created_at:    decode_dt(&self.created_at)?,
      password_hash: self.password_hash,
    })
  }
}

/// `COUNT(*)` comes back as `i64`; a negative value means the database
/// handed back something other than a count.
pub fn decode_count(count: i64) -> Result<usize> {
  usize::try_from(count).map_err(|_| Error::InvalidCount(count))
}

pub const ENVIRONMENT_COLUMNS: &str =
  "environment_id, name, kind, capacity, created_at";

/// Raw values read directly from an `environments` row.
pub struct RawEnvironment {
  pub environment_id: String,
  pub name:           String,
  pub kind:           String,
  pub capacity:       Option<u32>,
  pub created_at:     String,
}

impl RawEnvironment {
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      environment_id: row.get(0)?,
      name:           row.get(1)?,
      kind:           row.get(2)?,
      capacity:       row.get(3)?,
      created_at:     row.get(4)?,
    })
  }

  pub fn into_environment(self) -> Result<Environment> {
    Ok(Environment {
      environment_id: decode_uuid(&self.environment_id)?,
      name:           self.name,
      kind:           self.kind,
      capacity:       self.capacity,
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}
