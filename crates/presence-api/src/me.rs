//! Self-service handlers. The subject is always the caller's own
//! [`SubjectIdentity`].
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/checkin` | Body: `{"environment_id":..}`; 201 + entry |
//! | `POST` | `/checkout` | Closes the caller's open entry |
//! | `GET`  | `/status` | `{"in_environment_id": <uuid or null>}` |
//! | `GET`  | `/history` | The caller's entries with state and environment, most recent first |

use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use presence_core::{
  entry::Entry,
  presence::{Actor, HistoryEntry, PresenceService},
  store::PresenceStore,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{error::ApiError, identity::SubjectIdentity};

#[derive(Debug, Deserialize)]
pub struct CheckinBody {
  pub environment_id: Uuid,
}

/// `POST /checkin`
pub async fn checkin<S>(
  State(service): State<PresenceService<S>>,
  SubjectIdentity(subject_id): SubjectIdentity,
  Json(body): Json<CheckinBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let entry = service
    .checkin(Actor::SelfService(subject_id), body.environment_id, Utc::now())
    .await?;
  Ok((StatusCode::CREATED, Json(entry)))
}

/// `POST /checkout`
pub async fn checkout<S>(
  State(service): State<PresenceService<S>>,
  SubjectIdentity(subject_id): SubjectIdentity,
) -> Result<Json<Entry>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let entry = service
    .checkout(Actor::SelfService(subject_id), Utc::now())
    .await?;
  Ok(Json(entry))
}

#[derive(Debug, Serialize)]
pub struct StatusBody {
  pub in_environment_id: Option<Uuid>,
}

/// `GET /status`
pub async fn status<S>(
  State(service): State<PresenceService<S>>,
  SubjectIdentity(subject_id): SubjectIdentity,
) -> Result<Json<StatusBody>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let open = service.status(subject_id).await?;
  Ok(Json(StatusBody { in_environment_id: open.map(|e| e.environment_id) }))
}

/// `GET /history`
pub async fn history<S>(
  State(service): State<PresenceService<S>>,
  SubjectIdentity(subject_id): SubjectIdentity,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  Ok(Json(service.history_detailed(subject_id).await?))
}
