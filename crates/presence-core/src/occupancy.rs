//! Occupancy derivation: pure functions over ledger entries.
//!
//! Nothing here performs I/O. Callers fetch entries from a
//! [`PresenceStore`](crate::store::PresenceStore) and pass them in.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{directory::Environment, entry::Entry};

// ─── Instantaneous ───────────────────────────────────────────────────────────

/// Number of open entries in `entries`.
///
/// Pre-filter to one environment for a per-environment count.
pub fn instantaneous<'a>(entries: impl IntoIterator<Item = &'a Entry>) -> usize {
  entries.into_iter().filter(|e| e.is_open()).count()
}

/// Count open entries per environment in a single pass.
///
/// Every environment in `environments` appears in the result, at zero if it
/// has no open entries. Open entries pointing at environments not listed are
/// ignored.
pub fn snapshot<'a>(
  environments: &[Environment],
  entries: impl IntoIterator<Item = &'a Entry>,
) -> BTreeMap<Uuid, usize> {
  let mut counts: BTreeMap<Uuid, usize> = environments
    .iter()
    .map(|env| (env.environment_id, 0))
    .collect();

  for entry in entries.into_iter().filter(|e| e.is_open()) {
    if let Some(n) = counts.get_mut(&entry.environment_id) {
      *n += 1;
    }
  }

  counts
}

// ─── Series ──────────────────────────────────────────────────────────────────

/// One step of an occupancy series: the level right after the change at `at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OccupancyPoint {
  pub at:    DateTime<Utc>,
  /// Signed so that corrupted input shows up as a negative level rather than
  /// wrapping.
  pub level: i64,
}

struct Event {
  at:    DateTime<Utc>,
  delta: i64,
}

/// Reconstruct how occupancy evolved for a single environment.
///
/// Each entry contributes a `+1` event at its check-in and, if closed, a `-1`
/// event at its check-out, emitted in that order per entry. Events are sorted
/// by time with a stable sort, so events sharing a timestamp apply in
/// emission order. The output has one point per event and is not
/// de-duplicated by timestamp.
pub fn series<'a>(
  entries: impl IntoIterator<Item = &'a Entry>,
) -> Vec<OccupancyPoint> {
  let mut events: Vec<Event> = Vec::new();
  for entry in entries {
    events.push(Event { at: entry.check_in_at, delta: 1 });
    if let Some(out) = entry.check_out_at {
      events.push(Event { at: out, delta: -1 });
    }
  }

  // `sort_by_key` is stable; ties keep emission order.
  events.sort_by_key(|ev| ev.at);

  let mut level = 0i64;
  events
    .into_iter()
    .map(|ev| {
      level += ev.delta;
      OccupancyPoint { at: ev.at, level }
    })
    .collect()
}

/// The first point whose level dropped below zero. Only possible when the
/// underlying entries are inconsistent.
pub fn first_negative(points: &[OccupancyPoint]) -> Option<&OccupancyPoint> {
  points.iter().find(|p| p.level < 0)
}

/// Drop points before `since`. Levels are untouched, so the series must have
/// been computed over the full history first.
pub fn since(points: Vec<OccupancyPoint>, since: DateTime<Utc>) -> Vec<OccupancyPoint> {
  points.into_iter().filter(|p| p.at >= since).collect()
}
