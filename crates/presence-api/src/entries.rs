//! Operator handlers for `/entries` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/entries/checkin` | Body: `{"subject_id":..,"environment_id":..}`; 201 + entry |
//! | `POST` | `/entries/checkout` | Body: `{"subject_id":..}`; closed entry |
//! | `GET`  | `/entries/occupancy` | One row per environment with its current occupancy |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use presence_core::{
  entry::Entry,
  presence::{Actor, EnvironmentOccupancy, PresenceService},
  store::PresenceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::ApiError;

// ─── Check-in ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CheckinBody {
  pub subject_id:     Uuid,
  pub environment_id: Uuid,
}

/// `POST /entries/checkin`
pub async fn checkin<S>(
  State(service): State<PresenceService<S>>,
  Json(body): Json<CheckinBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let entry = service
    .checkin(Actor::Operator(body.subject_id), body.environment_id, Utc::now())
    .await?;
  Ok((StatusCode::CREATED, Json(entry)))
}

// ─── Check-out ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CheckoutBody {
  pub subject_id: Uuid,
}

/// `POST /entries/checkout`
pub async fn checkout<S>(
  State(service): State<PresenceService<S>>,
  Json(body): Json<CheckoutBody>,
) -> Result<Json<Entry>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let entry = service
    .checkout(Actor::Operator(body.subject_id), Utc::now())
    .await?;
  Ok(Json(entry))
}

// ─── Occupancy ────────────────────────────────────────────────────────────────

/// `GET /entries/occupancy`
pub async fn occupancy<S>(
  State(service): State<PresenceService<S>>,
) -> Result<Json<Vec<EnvironmentOccupancy>>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  Ok(Json(service.occupancy_snapshot_all().await?))
}
