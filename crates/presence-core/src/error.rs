//! Error types for `presence-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("subject not found: {0}")]
  SubjectNotFound(Uuid),

  #[error("environment not found: {0}")]
  EnvironmentNotFound(Uuid),

  #[error("entry not found: {0}")]
  EntryNotFound(Uuid),

  #[error("subject {subject_id} is already present in environment {environment_id}")]
  AlreadyPresent {
    subject_id:     Uuid,
    environment_id: Uuid,
  },

  #[error("subject {0} has no open entry")]
  NoOpenEntry(Uuid),

  #[error("entry {0} is already closed")]
  AlreadyClosed(Uuid),

  /// The supplied clock is behind the stored check-in time; closing the entry
  /// would produce `check_out_at < check_in_at`.
  #[error("entry {entry_id} cannot be checked out before it was checked in")]
  CheckOutBeforeCheckIn { entry_id: Uuid },

  #[error("a subject with this registration or email already exists")]
  DuplicateSubject,

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

/// Coarse classification of an [`Error`], for transports that map outcomes to
/// status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  NotFound,
  Conflict,
  AlreadyClosed,
  Invalid,
  Internal,
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::SubjectNotFound(_)
      | Self::EnvironmentNotFound(_)
      | Self::EntryNotFound(_) => ErrorKind::NotFound,
      Self::AlreadyPresent { .. }
      | Self::NoOpenEntry(_)
      | Self::DuplicateSubject => ErrorKind::Conflict,
      Self::AlreadyClosed(_) => ErrorKind::AlreadyClosed,
      Self::CheckOutBeforeCheckIn { .. } => ErrorKind::Invalid,
      Self::Store(_) => ErrorKind::Internal,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
