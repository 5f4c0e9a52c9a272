//! Error type for `presence-store-sqlite`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A typed domain outcome (not found, conflict, already closed, ...).
  #[error(transparent)]
  Core(#[from] presence_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("invalid row count: {0}")]
  InvalidCount(i64),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for presence_core::Error {
  fn from(e: Error) -> Self {
    match e {
      Error::Core(core) => core,
      other => presence_core::Error::Store(Box::new(other)),
    }
  }
}
