//! Entry: one presence record bounded by a check-in and an optional
//! check-out.
//!
//! An entry is created open by a check-in and transitions exactly once, to
//! closed, via a check-out. `check_in_at` never changes after creation and
//! `check_out_at`, once set, is never unset or changed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The two states of an [`Entry`]. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryState {
  Open,
  Closed,
}

/// A presence record for one subject in one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
  pub entry_id:       Uuid,
  pub subject_id:     Uuid,
  pub environment_id: Uuid,
  /// Set at creation; immutable.
  pub check_in_at:    DateTime<Utc>,
  /// `None` while the subject is still present.
  pub check_out_at:   Option<DateTime<Utc>>,
}

impl Entry {
  /// A fresh open entry.
  pub fn open(
    subject_id: Uuid,
    environment_id: Uuid,
    check_in_at: DateTime<Utc>,
  ) -> Self {
    Self {
      entry_id: Uuid::new_v4(),
      subject_id,
      environment_id,
      check_in_at,
      check_out_at: None,
    }
  }

  pub fn is_open(&self) -> bool { self.check_out_at.is_none() }

  pub fn state(&self) -> EntryState {
    if self.is_open() {
      EntryState::Open
    } else {
      EntryState::Closed
    }
  }
}
