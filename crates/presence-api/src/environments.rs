//! Handlers for `/environments` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/environments` | Creation order |
//! | `POST` | `/environments` | Body: `{"name":..,"kind":..,"capacity":..}` |
//! | `GET`  | `/environments/{id}` | 404 if not found |
//! | `GET`  | `/environments/{id}/occupancy` | Current occupancy |
//! | `GET`  | `/environments/{id}/series` | Optional `?since=<rfc3339>` |
//! | `GET`  | `/environments/{id}/entries` | Every entry recorded against it |

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use chrono::{DateTime, Utc};
use presence_core::{
  directory::{Environment, NewEnvironment},
  entry::Entry,
  occupancy::{self, OccupancyPoint},
  presence::PresenceService,
  store::PresenceStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, store_err};

// ─── List / create / get ──────────────────────────────────────────────────────

/// `GET /environments`
pub async fn list<S>(
  State(service): State<PresenceService<S>>,
) -> Result<Json<Vec<Environment>>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let environments = service.store().list_environments().await.map_err(store_err)?;
  Ok(Json(environments))
}

/// `POST /environments`
pub async fn create<S>(
  State(service): State<PresenceService<S>>,
  Json(body): Json<NewEnvironment>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  if body.name.trim().is_empty() || body.kind.trim().is_empty() {
    return Err(ApiError::BadRequest("name and kind are required".into()));
  }
  let env = service.store().add_environment(body).await.map_err(store_err)?;
  Ok((StatusCode::CREATED, Json(env)))
}

/// `GET /environments/{id}`
pub async fn get_one<S>(
  State(service): State<PresenceService<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Environment>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let env = service
    .store()
    .get_environment(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("environment {id} not found")))?;
  Ok(Json(env))
}

// ─── Occupancy ────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct OccupancyBody {
  pub environment_id: Uuid,
  pub occupancy:      usize,
}

/// `GET /environments/{id}/occupancy`
pub async fn occupancy<S>(
  State(service): State<PresenceService<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<OccupancyBody>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let occupancy = service.occupancy(id).await?;
  Ok(Json(OccupancyBody { environment_id: id, occupancy }))
}

#[derive(Debug, Deserialize)]
pub struct SeriesParams {
  /// Drop points before this instant. Levels still reflect the full history.
  pub since: Option<DateTime<Utc>>,
}

/// `GET /environments/{id}/series[?since=<rfc3339>]`
pub async fn series<S>(
  State(service): State<PresenceService<S>>,
  Path(id): Path<Uuid>,
  Query(params): Query<SeriesParams>,
) -> Result<Json<Vec<OccupancyPoint>>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let points = service.occupancy_series(id).await?;
  let points = match params.since {
    Some(since) => occupancy::since(points, since),
    None => points,
  };
  Ok(Json(points))
}

/// `GET /environments/{id}/entries`
pub async fn entries<S>(
  State(service): State<PresenceService<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<Entry>>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  Ok(Json(service.history_by_environment(id).await?))
}
