//! The `PresenceStore` trait.
//!
//! The trait is implemented by storage backends (e.g.
//! `presence-store-sqlite`). Higher layers (`presence-api`,
//! `presence-server`) depend on this abstraction, not on any concrete
//! backend.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  directory::{Environment, NewEnvironment, NewSubject, Subject, SubjectUpdate},
  entry::Entry,
};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a presence store backend.
///
/// Entries are never deleted. The only mutation is the single
/// open-to-closed transition performed by [`PresenceStore::close_entry`].
///
/// Backends must convert into [`crate::Error`] so that typed outcomes
/// (`AlreadyPresent`, `AlreadyClosed`, ...) survive the trip through the
/// service layer. Anything else should become [`crate::Error::Store`].
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait PresenceStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Directory ─────────────────────────────────────────────────────────

  /// Register a subject. Fails with `DuplicateSubject` if the registration
  /// or email is already taken.
  fn add_subject(
    &self,
    input: NewSubject,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  /// Retrieve a subject by UUID. Returns `None` if not found.
  fn get_subject(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// Look a subject up by its email, the self-service login name.
  fn find_subject_by_email(
    &self,
    email: String,
  ) -> impl Future<Output = Result<Option<Subject>, Self::Error>> + Send + '_;

  /// All subjects, newest first.
  fn list_subjects(
    &self,
  ) -> impl Future<Output = Result<Vec<Subject>, Self::Error>> + Send + '_;

  /// Overwrite the fields set in `update`. Fails with `SubjectNotFound` for
  /// an unknown id and `DuplicateSubject` if the new registration or email
  /// belongs to another subject.
  fn update_subject(
    &self,
    id: Uuid,
    update: SubjectUpdate,
  ) -> impl Future<Output = Result<Subject, Self::Error>> + Send + '_;

  fn add_environment(
    &self,
    input: NewEnvironment,
  ) -> impl Future<Output = Result<Environment, Self::Error>> + Send + '_;

  /// Retrieve an environment by UUID. Returns `None` if not found.
  fn get_environment(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Environment>, Self::Error>> + Send + '_;

  /// All environments, in creation order.
  fn list_environments(
    &self,
  ) -> impl Future<Output = Result<Vec<Environment>, Self::Error>> + Send + '_;

  // ── Ledger writes ────────────────────────────────────────────────────

  /// Insert a new open entry for `subject_id` in `environment_id`.
  ///
  /// The "no open entry for this subject" check and the insert must be one
  /// atomic unit: if another open entry exists (or appears concurrently),
  /// this fails with `AlreadyPresent` instead of creating a second one.
  fn create_entry(
    &self,
    subject_id: Uuid,
    environment_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Entry, Self::Error>> + Send + '_;

  /// Set `check_out_at = now` on an open entry.
  ///
  /// Fails with `EntryNotFound`, `AlreadyClosed`, or `CheckOutBeforeCheckIn`.
  /// A second close of the same entry is rejected, never silently accepted.
  fn close_entry(
    &self,
    entry_id: Uuid,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<Entry, Self::Error>> + Send + '_;

  // ── Ledger reads ─────────────────────────────────────────────────────

  /// The subject's open entry, if any. Should more than one exist, the one
  /// with the latest `check_in_at` is returned.
  fn find_open_entry(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Option<Entry>, Self::Error>> + Send + '_;

  /// Every open entry for the subject, latest `check_in_at` first. Holds at
  /// most one element unless the store has been corrupted externally.
  fn open_entries_for_subject(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Entry>, Self::Error>> + Send + '_;

  /// All entries for a subject, latest `check_in_at` first.
  fn list_by_subject(
    &self,
    subject_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Entry>, Self::Error>> + Send + '_;

  /// All entries (open and closed) for an environment, in insertion order.
  fn list_by_environment(
    &self,
    environment_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Entry>, Self::Error>> + Send + '_;

  /// Number of open entries in the environment.
  fn count_open_by_environment(
    &self,
    environment_id: Uuid,
  ) -> impl Future<Output = Result<usize, Self::Error>> + Send + '_;

  /// Every open entry across all environments.
  fn list_open_entries(
    &self,
  ) -> impl Future<Output = Result<Vec<Entry>, Self::Error>> + Send + '_;
}
