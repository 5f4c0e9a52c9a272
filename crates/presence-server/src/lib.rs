//! HTTP server wiring for the presence ledger.
//!
//! Mounts the operator API behind operator Basic auth at `/api`, the
//! self-service API behind subject Basic auth at `/api/me`, and an
//! unauthenticated `/health` check.

pub mod auth;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware, routing::get};
use presence_core::{presence::PresenceService, store::PresenceStore};
use serde::Deserialize;
use tower_http::trace::TraceLayer;

use auth::{AuthConfig, require_operator, require_subject};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `PRESENCE_*` environment variables.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                   String,
  pub port:                   u16,
  pub store_path:             PathBuf,
  pub operator_username:      String,
  pub operator_password_hash: String,
}

impl ServerConfig {
  pub fn auth(&self) -> AuthConfig {
    AuthConfig {
      username:      self.operator_username.clone(),
      password_hash: self.operator_password_hash.clone(),
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn app<S>(service: PresenceService<S>, auth: Arc<AuthConfig>) -> Router
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let operator = presence_api::operator_router(service.clone())
    .route_layer(middleware::from_fn_with_state(auth, require_operator));
  let self_service = presence_api::self_service_router(service.clone())
    .route_layer(middleware::from_fn_with_state(service, require_subject::<S>));

  Router::new()
    .route("/health", get(presence_api::health))
    .nest("/api", operator)
    .nest("/api/me", self_service)
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use presence_api::password::hash_password;
  use presence_core::directory::{NewEnvironment, NewSubject};
  use presence_store_sqlite::SqliteStore;
  use serde_json::{Value, json};
  use tower::ServiceExt as _;
  use uuid::Uuid;

  use super::*;

  struct Fixture {
    app:     Router,
    subject: Uuid,
    room:    Uuid,
  }

  /// An app whose operator is `admin`/`secret` and with one subject,
  /// `ana@example.com`/`ana-pass`, plus a subject with no password.
  async fn fixture() -> Fixture {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let subject = store
      .add_subject(NewSubject {
        name:          "Ana".into(),
        email:         Some("ana@example.com".into()),
        password_hash: Some(hash_password("ana-pass").unwrap()),
        ..Default::default()
      })
      .await
      .unwrap();
    store
      .add_subject(NewSubject {
        name:  "Bruno".into(),
        email: Some("bruno@example.com".into()),
        ..Default::default()
      })
      .await
      .unwrap();
    let room = store
      .add_environment(NewEnvironment {
        name:     "Room 101".into(),
        kind:     "classroom".into(),
        capacity: None,
      })
      .await
      .unwrap();

    let auth = AuthConfig {
      username:      "admin".into(),
      password_hash: hash_password("secret").unwrap(),
    };
    Fixture {
      app:     app(PresenceService::new(Arc::new(store)), Arc::new(auth)),
      subject: subject.subject_id,
      room:    room.environment_id,
    }
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  fn checkin() -> axum::http::request::Builder {
    Request::post("/api/me/checkin").header(header::CONTENT_TYPE, "application/json")
  }

  fn checkin_body(room: Uuid) -> Body { Body::from(json!({ "environment_id": room }).to_string()) }

  #[tokio::test]
  async fn health_needs_no_auth() {
    let f = fixture().await;
    let req = Request::get("/health").body(Body::empty()).unwrap();
    let resp = f.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn operator_routes_require_basic_auth() {
    let f = fixture().await;

    let req = Request::get("/api/environments").body(Body::empty()).unwrap();
    let resp = f.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));

    let req = Request::get("/api/environments")
      .header(header::AUTHORIZATION, basic("admin", "secret"))
      .body(Body::empty())
      .unwrap();
    let resp = f.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn self_service_checkin_without_credentials_is_401() {
    let f = fixture().await;
    let req = checkin().body(checkin_body(f.room)).unwrap();
    let resp = f.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn self_service_ignores_subject_id_header() {
    let f = fixture().await;
    let req = checkin()
      .header("x-subject-id", f.subject.to_string())
      .body(checkin_body(f.room))
      .unwrap();
    let resp = f.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }

  #[tokio::test]
  async fn self_service_rejects_bad_or_missing_passwords() {
    let f = fixture().await;
    for (user, pass) in [
      ("ana@example.com", "wrong"),
      ("bruno@example.com", ""),
      ("nobody@example.com", "ana-pass"),
      ("admin", "secret"),
    ] {
      let req = checkin()
        .header(header::AUTHORIZATION, basic(user, pass))
        .body(checkin_body(f.room))
        .unwrap();
      let resp = f.app.clone().oneshot(req).await.unwrap();
      assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{user}");
    }
  }

  #[tokio::test]
  async fn self_service_acts_as_the_authenticated_subject() {
    let f = fixture().await;
    let req = checkin()
      .header(header::AUTHORIZATION, basic("ana@example.com", "ana-pass"))
      .body(checkin_body(f.room))
      .unwrap();
    let resp = f.app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let entry: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(entry["subject_id"], f.subject.to_string());

    let req = Request::get("/api/me/status")
      .header(header::AUTHORIZATION, basic("ana@example.com", "ana-pass"))
      .body(Body::empty())
      .unwrap();
    let resp = f.app.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let status: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status["in_environment_id"], f.room.to_string());
  }
}
