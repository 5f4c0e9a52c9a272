//! Subjects and environments, the entities entries point at.
//!
//! The ledger references both by id only and never owns their lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A person whose presence is tracked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
  pub subject_id:    Uuid,
  pub name:          String,
  /// Institutional registration number; unique when present.
  pub registration:  Option<String>,
  /// Unique when present. Doubles as the self-service login.
  pub email:         Option<String>,
  pub created_at:    DateTime<Utc>,
  /// Argon2 PHC string. A subject without one cannot use self-service.
  #[serde(skip)]
  pub password_hash: Option<String>,
}

/// Input to [`crate::store::PresenceStore::add_subject`].
#[derive(Debug, Clone, Default)]
pub struct NewSubject {
  pub name:          String,
  pub registration:  Option<String>,
  pub email:         Option<String>,
  pub password_hash: Option<String>,
}

/// Input to [`crate::store::PresenceStore::update_subject`]. `None` leaves the
/// stored value as it is.
#[derive(Debug, Clone, Default)]
pub struct SubjectUpdate {
  pub name:          Option<String>,
  pub registration:  Option<String>,
  pub email:         Option<String>,
  pub password_hash: Option<String>,
}

/// A physical space monitored for occupancy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
  pub environment_id: Uuid,
  pub name:           String,
  /// Free-text category, e.g. "classroom" or "lab".
  pub kind:           String,
  pub capacity:       Option<u32>,
  pub created_at:     DateTime<Utc>,
}

/// Input to [`crate::store::PresenceStore::add_environment`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewEnvironment {
  pub name:     String,
  pub kind:     String,
  #[serde(default)]
  pub capacity: Option<u32>,
}
