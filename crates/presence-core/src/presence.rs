//! [`PresenceService`]: check-in/check-out orchestration over a
//! [`PresenceStore`].
//!
//! The service enforces the single-open-entry rule and the ownership rules
//! for the two call modes:
//!
//! - **self-service**: a subject acts for itself. Its id comes from its
//!   authenticated identity and is never taken from the request body.
//! - **operator**: an administrative caller names the subject explicitly.
//!
//! The "is there already an open entry" check-and-set is delegated to
//! [`PresenceStore::create_entry`], which backends implement atomically. The
//! service's own pre-check only exists to report which environment the
//! subject is already in.

use std::{collections::HashMap, sync::Arc};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::{
  Error, Result,
  directory::Environment,
  entry::{Entry, EntryState},
  occupancy::{self, OccupancyPoint},
  store::PresenceStore,
};

// ─── Actor ───────────────────────────────────────────────────────────────────

/// Who is asking for a check-in or check-out, and for which subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
  /// A subject acting on its own behalf.
  SelfService(Uuid),
  /// An operator acting on behalf of the given subject.
  Operator(Uuid),
}

impl Actor {
  pub fn subject_id(&self) -> Uuid {
    match *self {
      Self::SelfService(id) | Self::Operator(id) => id,
    }
  }

  fn mode(&self) -> &'static str {
    match self {
      Self::SelfService(_) => "self_service",
      Self::Operator(_) => "operator",
    }
  }
}

// ─── Read models ─────────────────────────────────────────────────────────────

/// One dashboard row: an environment and how many subjects are in it now.
#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentOccupancy {
  #[serde(flatten)]
  pub environment:       Environment,
  pub current_occupancy: usize,
}

/// An entry as shown in a subject's history, with the environment it was
/// recorded in.
#[derive(Debug, Clone, Serialize)]
pub struct HistoryEntry {
  #[serde(flatten)]
  pub entry:       Entry,
  pub state:       EntryState,
  /// `None` only if the environment row has gone missing.
  pub environment: Option<Environment>,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct PresenceService<S> {
  store: Arc<S>,
}

impl<S> Clone for PresenceService<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S> PresenceService<S>
where
  S: PresenceStore,
  Error: From<S::Error>,
{
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  /// The underlying store, for directory operations the service does not
  /// wrap.
  pub fn store(&self) -> &S { &self.store }

  // ── Writes ────────────────────────────────────────────────────────────

  /// Open a new entry for the actor's subject in `environment_id`.
  ///
  /// Fails with `SubjectNotFound` / `EnvironmentNotFound` if either is
  /// unknown, and with `AlreadyPresent` if the subject already has an open
  /// entry anywhere. Retrying after a success therefore yields
  /// `AlreadyPresent`.
  pub async fn checkin(
    &self,
    actor: Actor,
    environment_id: Uuid,
    now: DateTime<Utc>,
  ) -> Result<Entry> {
    let subject_id = actor.subject_id();

    self
      .store
      .get_subject(subject_id)
      .await?
      .ok_or(Error::SubjectNotFound(subject_id))?;
    self
      .store
      .get_environment(environment_id)
      .await?
      .ok_or(Error::EnvironmentNotFound(environment_id))?;

    if let Some(open) = self.store.find_open_entry(subject_id).await? {
      return Err(Error::AlreadyPresent {
        subject_id,
        environment_id: open.environment_id,
      });
    }

    let entry = self
      .store
      .create_entry(subject_id, environment_id, now)
      .await?;

    debug!(
      mode = actor.mode(),
      %subject_id,
      %environment_id,
      entry_id = %entry.entry_id,
      "checked in"
    );
    Ok(entry)
  }

  /// Close the actor's subject's open entry.
  ///
  /// Fails with `NoOpenEntry` if there is none, including when a concurrent
  /// checkout closed it first. If the store holds more than one open entry
  /// for the subject, the most recently opened one is closed and the anomaly
  /// is logged.
  pub async fn checkout(&self, actor: Actor, now: DateTime<Utc>) -> Result<Entry> {
    let subject_id = actor.subject_id();

    let open = self.store.open_entries_for_subject(subject_id).await?;
    let latest = open.first().ok_or(Error::NoOpenEntry(subject_id))?;

    if open.len() > 1 {
      warn!(
        %subject_id,
        open_entries = open.len(),
        closing = %latest.entry_id,
        "subject has more than one open entry; closing the most recent"
      );
    }

    let entry = match self.store.close_entry(latest.entry_id, now).await {
      Ok(entry) => entry,
      Err(e) => {
        return Err(match Error::from(e) {
          Error::AlreadyClosed(_) => Error::NoOpenEntry(subject_id),
          other => other,
        });
      }
    };

    debug!(
      mode = actor.mode(),
      %subject_id,
      environment_id = %entry.environment_id,
      entry_id = %entry.entry_id,
      "checked out"
    );
    Ok(entry)
  }

  // ── Reads ─────────────────────────────────────────────────────────────

  /// The subject's open entry, if it is currently present somewhere.
  pub async fn status(&self, subject_id: Uuid) -> Result<Option<Entry>> {
    Ok(self.store.find_open_entry(subject_id).await?)
  }

  /// Number of subjects currently in the environment.
  pub async fn occupancy(&self, environment_id: Uuid) -> Result<usize> {
    self.require_environment(environment_id).await?;
    Ok(self.store.count_open_by_environment(environment_id).await?)
  }

  /// Current occupancy of every environment, computed from one scan of the
  /// open entries rather than one query per environment.
  pub async fn occupancy_snapshot_all(&self) -> Result<Vec<EnvironmentOccupancy>> {
    let environments = self.store.list_environments().await?;
    let open = self.store.list_open_entries().await?;
    let mut counts = occupancy::snapshot(&environments, &open);

    Ok(
      environments
        .into_iter()
        .map(|environment| {
          let current_occupancy =
            counts.remove(&environment.environment_id).unwrap_or(0);
          EnvironmentOccupancy { environment, current_occupancy }
        })
        .collect(),
    )
  }

  /// How occupancy of the environment evolved over its whole history.
  pub async fn occupancy_series(
    &self,
    environment_id: Uuid,
  ) -> Result<Vec<OccupancyPoint>> {
    let entries = self.history_by_environment(environment_id).await?;
    let points = occupancy::series(&entries);

    if let Some(bad) = occupancy::first_negative(&points) {
      warn!(
        %environment_id,
        at = %bad.at,
        level = bad.level,
        "occupancy series went negative; ledger is inconsistent"
      );
    }

    Ok(points)
  }

  /// The subject's entries, most recent check-in first.
  pub async fn history(&self, subject_id: Uuid) -> Result<Vec<Entry>> {
    self
      .store
      .get_subject(subject_id)
      .await?
      .ok_or(Error::SubjectNotFound(subject_id))?;
    Ok(self.store.list_by_subject(subject_id).await?)
  }

  /// [`Self::history`] with each entry's state and environment attached.
  pub async fn history_detailed(&self, subject_id: Uuid) -> Result<Vec<HistoryEntry>> {
    let entries = self.history(subject_id).await?;
    let environments: HashMap<Uuid, Environment> = self
      .store
      .list_environments()
      .await?
      .into_iter()
      .map(|env| (env.environment_id, env))
      .collect();

    Ok(
      entries
        .into_iter()
        .map(|entry| HistoryEntry {
          state:       entry.state(),
          environment: environments.get(&entry.environment_id).cloned(),
          entry,
        })
        .collect(),
    )
  }

  /// Every entry recorded against the environment.
  pub async fn history_by_environment(&self, environment_id: Uuid) -> Result<Vec<Entry>> {
    self.require_environment(environment_id).await?;
    Ok(self.store.list_by_environment(environment_id).await?)
  }

  async fn require_environment(&self, environment_id: Uuid) -> Result<Environment> {
    self
      .store
      .get_environment(environment_id)
      .await?
      .ok_or(Error::EnvironmentNotFound(environment_id))
  }
}
