//! Handlers for `/subjects` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/subjects` | Newest first |
//! | `POST` | `/subjects` | Body: `{"name":..,"registration":..,"email":..,"password":..}` |
//! | `GET`  | `/subjects/{id}` | 404 if not found |
//! | `PUT`  | `/subjects/{id}` | Fields present in the body are overwritten; 409 on a taken registration/email |
//! | `GET`  | `/subjects/{id}/history` | Entries with state and environment, most recent check-in first |
//!
//! A subject given a `password` can log in to the self-service routes with
//! its email. The password is stored only as an argon2 hash.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use presence_core::{
  directory::{NewSubject, Subject, SubjectUpdate},
  presence::{HistoryEntry, PresenceService},
  store::PresenceStore,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
  error::{ApiError, store_err},
  password,
};

/// Hash a password supplied in a request body, rejecting an empty one.
fn hash_supplied(supplied: Option<String>) -> Result<Option<String>, ApiError> {
  match supplied {
    None => Ok(None),
    Some(p) if p.is_empty() => {
      Err(ApiError::BadRequest("password must not be empty".into()))
    }
    Some(p) => password::hash_password(&p)
      .map(Some)
      .map_err(|e| ApiError::Store(e.to_string().into())),
  }
}

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /subjects`
pub async fn list<S>(
  State(service): State<PresenceService<S>>,
) -> Result<Json<Vec<Subject>>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let subjects = service.store().list_subjects().await.map_err(store_err)?;
  Ok(Json(subjects))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateSubjectBody {
  pub name:         String,
  #[serde(default)]
  pub registration: Option<String>,
  #[serde(default)]
  pub email:        Option<String>,
  #[serde(default)]
  pub password:     Option<String>,
}

/// `POST /subjects`
pub async fn create<S>(
  State(service): State<PresenceService<S>>,
  Json(body): Json<CreateSubjectBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  if body.name.trim().is_empty() {
    return Err(ApiError::BadRequest("name is required".into()));
  }
  let input = NewSubject {
    name:          body.name,
    registration:  body.registration,
    email:         body.email,
    password_hash: hash_supplied(body.password)?,
  };
  let subject = service.store().add_subject(input).await.map_err(store_err)?;
  Ok((StatusCode::CREATED, Json(subject)))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /subjects/{id}`
pub async fn get_one<S>(
  State(service): State<PresenceService<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Subject>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let subject = service
    .store()
    .get_subject(id)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError::NotFound(format!("subject {id} not found")))?;
  Ok(Json(subject))
}

// ─── Update ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpdateSubjectBody {
  #[serde(default)]
  pub name:         Option<String>,
  #[serde(default)]
  pub registration: Option<String>,
  #[serde(default)]
  pub email:        Option<String>,
  #[serde(default)]
  pub password:     Option<String>,
}

/// `PUT /subjects/{id}`
pub async fn update<S>(
  State(service): State<PresenceService<S>>,
  Path(id): Path<Uuid>,
  Json(body): Json<UpdateSubjectBody>,
) -> Result<Json<Subject>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  if body.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
    return Err(ApiError::BadRequest("name must not be blank".into()));
  }
  let update = SubjectUpdate {
    name:          body.name,
    registration:  body.registration,
    email:         body.email,
    password_hash: hash_supplied(body.password)?,
  };
  let subject = service
    .store()
    .update_subject(id, update)
    .await
    .map_err(store_err)?;
  Ok(Json(subject))
}

// ─── History ──────────────────────────────────────────────────────────────────

/// `GET /subjects/{id}/history`
pub async fn history<S>(
  State(service): State<PresenceService<S>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  Ok(Json(service.history_detailed(id).await?))
}
