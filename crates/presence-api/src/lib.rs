//! JSON REST API for the presence ledger.
//!
//! Exposes two axum [`Router`]s backed by any
//! [`presence_core::store::PresenceStore`]:
//!
//! - [`operator_router`]: check-in/check-out on behalf of a named subject,
//!   the directory, occupancy and history views.
//! - [`self_service_router`]: a subject acting for itself, identified by
//!   [`identity::SubjectIdentity`].
//!
//! Auth, TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", presence_api::operator_router(service.clone()))
//! .nest("/api/me", presence_api::self_service_router(service))
//! ```

pub mod entries;
pub mod environments;
pub mod error;
pub mod identity;
pub mod me;
pub mod password;
pub mod subjects;

use axum::{
  Json, Router,
  routing::{get, post},
};
use presence_core::{presence::PresenceService, store::PresenceStore};
use serde_json::{Value, json};

pub use error::ApiError;

/// Build the operator router for `service`.
pub fn operator_router<S>(service: PresenceService<S>) -> Router<()>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  Router::new()
    // Entries
    .route("/entries/checkin", post(entries::checkin::<S>))
    .route("/entries/checkout", post(entries::checkout::<S>))
    .route("/entries/occupancy", get(entries::occupancy::<S>))
    // Subjects
    .route("/subjects", get(subjects::list::<S>).post(subjects::create::<S>))
    .route(
      "/subjects/{id}",
      get(subjects::get_one::<S>).put(subjects::update::<S>),
    )
    .route("/subjects/{id}/history", get(subjects::history::<S>))
    // Environments
    .route(
      "/environments",
      get(environments::list::<S>).post(environments::create::<S>),
    )
    .route("/environments/{id}", get(environments::get_one::<S>))
    .route("/environments/{id}/occupancy", get(environments::occupancy::<S>))
    .route("/environments/{id}/series", get(environments::series::<S>))
    .route("/environments/{id}/entries", get(environments::entries::<S>))
    .with_state(service)
}

/// Build the self-service router for `service`.
pub fn self_service_router<S>(service: PresenceService<S>) -> Router<()>
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  Router::new()
    .route("/checkin", post(me::checkin::<S>))
    .route("/checkout", post(me::checkout::<S>))
    .route("/status", get(me::status::<S>))
    .route("/history", get(me::history::<S>))
    .with_state(service)
}

/// `GET /health`
pub async fn health() -> Json<Value> { Json(json!({ "status": "ok" })) }

// ─── Integration tests ────────────────────────────────────────────────────────
