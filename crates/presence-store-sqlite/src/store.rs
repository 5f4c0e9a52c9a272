//! [`SqliteStore`] is the SQLite implementation of [`PresenceStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, ffi};
use uuid::Uuid;

use presence_core::{
  directory::{Environment, NewEnvironment, NewSubject, Subject, SubjectUpdate},
  entry::Entry,
  store::PresenceStore,
};

use crate::{
  Error, Result,
  encode::{
    ENTRY_COLUMNS, ENVIRONMENT_COLUMNS, RawEntry, RawEnvironment, RawSubject,
    SUBJECT_COLUMNS, decode_count, decode_uuid, encode_dt, encode_uuid,
    to_stored_precision,
  },
  schema::{MIGRATE_V1_TO_V2, SCHEMA, SCHEMA_VERSION},
};

// ─── Closure outcomes ────────────────────────────────────────────────────────

// Domain failures detected inside a `call` closure travel out as values; the
// closure's error channel is reserved for database errors.

enum Insert {
  Created,
  SubjectMissing,
  EnvironmentMissing,
  /// Carries the environment of the entry that is already open, if it could
  /// be read back.
  AlreadyOpen(Option<String>),
}

enum Update {
  Updated(RawSubject),
  NotFound,
  Duplicate,
}

enum Close {
  Closed(RawEntry),
  NotFound,
  AlreadyClosed,
  BeforeCheckIn,
}

fn is_unique_violation(e: &rusqlite::Error) -> bool {
  matches!(
    e,
    rusqlite::Error::SqliteFailure(err, _)
      if err.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
  )
}

fn open_environment_of(
  conn: &rusqlite::Connection,
  subject_id: &str,
) -> rusqlite::Result<Option<String>> {
  conn
    .query_row(
      "SELECT environment_id FROM entries
       WHERE subject_id = ?1 AND check_out_at IS NULL
       ORDER BY check_in_at DESC, rowid DESC
       LIMIT 1",
      rusqlite::params![subject_id],
      |r| r.get(0),
    )
    .optional()
}

fn exists(
  conn: &rusqlite::Connection,
  sql: &str,
  id: &str,
) -> rusqlite::Result<bool> {
  Ok(
    conn
      .query_row(sql, rusqlite::params![id], |_| Ok(()))
      .optional()?
      .is_some(),
  )
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A presence store backed by a single SQLite file.
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

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Shut the connection down, flushing outstanding work.
  pub async fn close(self) -> Result<()> {
    self.conn.close().await?;
    Ok(())
  }

  pub(crate) async fn init_schema(&self) -> Result<()> {
    let from: i64 = self
      .conn
      .call(|conn| {
        let version: i64 = conn.query_row("PRAGMA user_version", [], |r| r.get(0))?;
        if version == 1 {
          conn.execute_batch(MIGRATE_V1_TO_V2)?;
        }
        conn.execute_batch(SCHEMA)?;
        Ok(version)
      })
      .await?;

    if from != 0 && from < SCHEMA_VERSION {
      tracing::info!(from, to = SCHEMA_VERSION, "migrated store schema");
    }
    Ok(())
  }

  /// Run an entry query taking bound string parameters.
  async fn select_entries(&self, sql: String, params: Vec<String>) -> Result<Vec<Entry>> {
    let raws: Vec<RawEntry> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawEntry::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEntry::into_entry).collect()
  }
}

// ─── PresenceStore impl ──────────────────────────────────────────────────────

impl PresenceStore for SqliteStore {
  type Error = Error;

  // ── Directory ─────────────────────────────────────────────────────────────

  async fn add_subject(&self, input: NewSubject) -> Result<Subject> {
    let subject = Subject {
      subject_id:    Uuid::new_v4(),
      name:          input.name,
      registration:  input.registration,
      email:         input.email,
      created_at:    to_stored_precision(Utc::now()),
      password_hash: input.password_hash,
    };

    let id_str       = encode_uuid(subject.subject_id);
    let name         = subject.name.clone();
    let registration = subject.registration.clone();
    let email        = subject.email.clone();
    let at_str       = encode_dt(subject.created_at);
    let hash         = subject.password_hash.clone();

    let inserted: bool = self
      .conn
      .call(move |conn| {
        match conn.execute(
          "INSERT INTO subjects
             (subject_id, name, registration, email, created_at, password_hash)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![id_str, name, registration, email, at_str, hash],
        ) {
          Ok(_) => Ok(true),
          Err(e) if is_unique_violation(&e) => Ok(false),
          Err(e) => Err(e.into()),
        }
      })
      .await?;

    if !inserted {
      return Err(presence_core::Error::DuplicateSubject.into());
    }
    Ok(subject)
  }

  async fn get_subject(&self, id: Uuid) -> Result<Option<Subject>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1"),
              rusqlite::params![id_str],
              RawSubject::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn find_subject_by_email(&self, email: String) -> Result<Option<Subject>> {
    let raw: Option<RawSubject> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE email = ?1"),
              rusqlite::params![email],
              RawSubject::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawSubject::into_subject).transpose()
  }

  async fn list_subjects(&self) -> Result<Vec<Subject>> {
    let raws: Vec<RawSubject> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {SUBJECT_COLUMNS} FROM subjects ORDER BY created_at DESC, rowid DESC"
        ))?;
        let rows = stmt
          .query_map([], RawSubject::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawSubject::into_subject).collect()
  }

  async fn update_subject(&self, id: Uuid, update: SubjectUpdate) -> Result<Subject> {
    let id_str = encode_uuid(id);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let changed = match tx.execute(
          "UPDATE subjects SET
             name          = COALESCE(?2, name),
             registration  = COALESCE(?3, registration),
             email         = COALESCE(?4, email),
             password_hash = COALESCE(?5, password_hash)
           WHERE subject_id = ?1",
          rusqlite::params![
            id_str,
            update.name,
            update.registration,
            update.email,
            update.password_hash
          ],
        ) {
          Ok(n) => n,
          Err(e) if is_unique_violation(&e) => return Ok(Update::Duplicate),
          Err(e) => return Err(e.into()),
        };
        if changed == 0 {
          return Ok(Update::NotFound);
        }

        let raw = tx.query_row(
          &format!("SELECT {SUBJECT_COLUMNS} FROM subjects WHERE subject_id = ?1"),
          rusqlite::params![id_str],
          RawSubject::from_row,
        )?;
        tx.commit()?;
        Ok(Update::Updated(raw))
      })
      .await?;

    match outcome {
      Update::Updated(raw) => raw.into_subject(),
      Update::NotFound => Err(presence_core::Error::SubjectNotFound(id).into()),
      Update::Duplicate => Err(presence_core::Error::DuplicateSubject.into()),
    }
  }

  async fn add_environment(&self, input: NewEnvironment) -> Result<Environment> {
    let env = Environment {
      environment_id: Uuid::new_v4(),
      name:           input.name,
      kind:           input.kind,
      capacity:       input.capacity,
      created_at:     to_stored_precision(Utc::now()),
    };

    let id_str   = encode_uuid(env.environment_id);
    let name     = env.name.clone();
    let kind     = env.kind.clone();
    let capacity = env.capacity;
    let at_str   = encode_dt(env.created_at);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO environments (environment_id, name, kind, capacity, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, name, kind, capacity, at_str],
        )?;
        Ok(())
      })
      .await?;

    Ok(env)
  }

  async fn get_environment(&self, id: Uuid) -> Result<Option<Environment>> {
    let id_str = encode_uuid(id);

    let raw: Option<RawEnvironment> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ENVIRONMENT_COLUMNS} FROM environments WHERE environment_id = ?1"
              ),
              rusqlite::params![id_str],
              RawEnvironment::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawEnvironment::into_environment).transpose()
  }

  async fn list_environments(&self) -> Result<Vec<Environment>> {
    let raws: Vec<RawEnvironment> = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ENVIRONMENT_COLUMNS} FROM environments ORDER BY rowid"
        ))?;
        let rows = stmt
          .query_map([], RawEnvironment::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawEnvironment::into_environment).collect()
  }

  // ── Ledger writes ────────────────────────────────────────────────────────

  async fn create_entry(
    &self,
    subject_id:     Uuid,
    environment_id: Uuid,
    now:            DateTime<Utc>,
  ) -> Result<Entry> {
    let entry = Entry::open(subject_id, environment_id, to_stored_precision(now));

    let entry_id_str   = encode_uuid(entry.entry_id);
    let subject_id_str = encode_uuid(subject_id);
    let env_id_str     = encode_uuid(environment_id);
    let at_str         = encode_dt(entry.check_in_at);

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        if !exists(&tx, "SELECT 1 FROM subjects WHERE subject_id = ?1", &subject_id_str)? {
          return Ok(Insert::SubjectMissing);
        }
        if !exists(
          &tx,
          "SELECT 1 FROM environments WHERE environment_id = ?1",
          &env_id_str,
        )? {
          return Ok(Insert::EnvironmentMissing);
        }
        if let Some(env) = open_environment_of(&tx, &subject_id_str)? {
          return Ok(Insert::AlreadyOpen(Some(env)));
        }

        // The partial unique index is the last line: it also holds against
        // writers on other connections to the same file.
        match tx.execute(
          "INSERT INTO entries (entry_id, subject_id, environment_id, check_in_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![entry_id_str, subject_id_str, env_id_str, at_str],
        ) {
          Ok(_) => {}
          Err(e) if is_unique_violation(&e) => {
            let env = open_environment_of(&tx, &subject_id_str)?;
            return Ok(Insert::AlreadyOpen(env));
          }
          Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(Insert::Created)
      })
      .await?;

    match outcome {
      Insert::Created => Ok(entry),
      Insert::SubjectMissing => {
        Err(presence_core::Error::SubjectNotFound(subject_id).into())
      }
      Insert::EnvironmentMissing => {
        Err(presence_core::Error::EnvironmentNotFound(environment_id).into())
      }
      Insert::AlreadyOpen(env) => {
        let environment_id = match env {
          Some(s) => decode_uuid(&s)?,
          None => environment_id,
        };
        Err(presence_core::Error::AlreadyPresent { subject_id, environment_id }.into())
      }
    }
  }

  async fn close_entry(&self, entry_id: Uuid, now: DateTime<Utc>) -> Result<Entry> {
    let id_str = encode_uuid(entry_id);
    let at_str = encode_dt(to_stored_precision(now));

    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let row: Option<(String, Option<String>)> = tx
          .query_row(
            "SELECT check_in_at, check_out_at FROM entries WHERE entry_id = ?1",
            rusqlite::params![id_str],
            |r| Ok((r.get(0)?, r.get(1)?)),
          )
          .optional()?;

        let check_in_at = match row {
          None => return Ok(Close::NotFound),
          Some((_, Some(_))) => return Ok(Close::AlreadyClosed),
          Some((check_in_at, None)) => check_in_at,
        };
        // Both sides use the same fixed-width encoding.
        if at_str < check_in_at {
          return Ok(Close::BeforeCheckIn);
        }

        let changed = tx.execute(
          "UPDATE entries SET check_out_at = ?2
           WHERE entry_id = ?1 AND check_out_at IS NULL",
          rusqlite::params![id_str, at_str],
        )?;
        if changed == 0 {
          return Ok(Close::AlreadyClosed);
        }

        let raw = tx.query_row(
          &format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE entry_id = ?1"),
          rusqlite::params![id_str],
          RawEntry::from_row,
        )?;
        tx.commit()?;
        Ok(Close::Closed(raw))
      })
      .await?;

    match outcome {
      Close::Closed(raw) => raw.into_entry(),
      Close::NotFound => Err(presence_core::Error::EntryNotFound(entry_id).into()),
      Close::AlreadyClosed => Err(presence_core::Error::AlreadyClosed(entry_id).into()),
      Close::BeforeCheckIn => {
        Err(presence_core::Error::CheckOutBeforeCheckIn { entry_id }.into())
      }
    }
  }

  // ── Ledger reads ─────────────────────────────────────────────────────────

  async fn find_open_entry(&self, subject_id: Uuid) -> Result<Option<Entry>> {
    let mut open = self
      .select_entries(
        format!(
          "SELECT {ENTRY_COLUMNS} FROM entries
           WHERE subject_id = ?1 AND check_out_at IS NULL
           ORDER BY check_in_at DESC, rowid DESC
           LIMIT 1"
        ),
        vec![encode_uuid(subject_id)],
      )
      .await?;
    Ok(open.pop())
  }

  async fn open_entries_for_subject(&self, subject_id: Uuid) -> Result<Vec<Entry>> {
    self
      .select_entries(
        format!(
          "SELECT {ENTRY_COLUMNS} FROM entries
           WHERE subject_id = ?1 AND check_out_at IS NULL
           ORDER BY check_in_at DESC, rowid DESC"
        ),
        vec![encode_uuid(subject_id)],
      )
      .await
  }

  async fn list_by_subject(&self, subject_id: Uuid) -> Result<Vec<Entry>> {
    self
      .select_entries(
        format!(
          "SELECT {ENTRY_COLUMNS} FROM entries
           WHERE subject_id = ?1
           ORDER BY check_in_at DESC, rowid DESC"
        ),
        vec![encode_uuid(subject_id)],
      )
      .await
  }

  async fn list_by_environment(&self, environment_id: Uuid) -> Result<Vec<Entry>> {
    self
      .select_entries(
        format!(
          "SELECT {ENTRY_COLUMNS} FROM entries
           WHERE environment_id = ?1
           ORDER BY rowid"
        ),
        vec![encode_uuid(environment_id)],
      )
      .await
  }

  async fn count_open_by_environment(&self, environment_id: Uuid) -> Result<usize> {
    let id_str = encode_uuid(environment_id);

    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM entries
           WHERE environment_id = ?1 AND check_out_at IS NULL",
          rusqlite::params![id_str],
          |r| r.get(0),
        )?)
      })
      .await?;

    decode_count(count)
  }

  async fn list_open_entries(&self) -> Result<Vec<Entry>> {
    self
      .select_entries(
        format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE check_out_at IS NULL ORDER BY rowid"),
        Vec::new(),
      )
      .await
  }
}
