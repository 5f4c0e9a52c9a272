//! HTTP Basic-auth guards.
//!
//! Operators log in with the single account from the server configuration.
//! Subjects log in to the self-service routes with their email and the
//! password set through the operator API; the verified subject becomes the
//! request's [`SubjectIdentity`].

use std::sync::Arc;

use axum::{
  extract::{Request, State},
  http::{HeaderMap, HeaderValue, StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;
use presence_api::{ApiError, identity::SubjectIdentity, password::verify_password};
use presence_core::{presence::PresenceService, store::PresenceStore};

/// Operator credentials accepted by this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Rejection for a missing or wrong `Authorization` header.
#[derive(Debug)]
pub struct Unauthorized;

impl IntoResponse for Unauthorized {
  fn into_response(self) -> Response {
    let mut res = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    res.headers_mut().insert(
      header::WWW_AUTHENTICATE,
      HeaderValue::from_static("Basic realm=\"presence\""),
    );
    res
  }
}

/// Decode the `user:password` pair of a Basic `Authorization` header.
fn basic_credentials(headers: &HeaderMap) -> Result<(String, String), Unauthorized> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Unauthorized)?;

  let encoded = header_val.strip_prefix("Basic ").ok_or(Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Unauthorized)?;
  Ok((username.to_string(), password.to_string()))
}

/// Verify operator credentials from request headers.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Unauthorized> {
  let (username, password) = basic_credentials(headers)?;

  if username != config.username {
    return Err(Unauthorized);
  }
  if !verify_password(&password, &config.password_hash) {
    return Err(Unauthorized);
  }
  Ok(())
}

/// Middleware for `axum::middleware::from_fn_with_state`.
pub async fn require_operator(
  State(auth): State<Arc<AuthConfig>>,
  req: Request,
  next: Next,
) -> Response {
  match verify_auth(req.headers(), &auth) {
    Ok(()) => next.run(req).await,
    Err(rejection) => {
      tracing::debug!(path = %req.uri().path(), "rejected operator request");
      rejection.into_response()
    }
  }
}

/// Middleware for the self-service routes: resolve the subject whose email
/// and password match the Basic credentials and attach it as the request's
/// [`SubjectIdentity`].
pub async fn require_subject<S>(
  State(service): State<PresenceService<S>>,
  mut req: Request,
  next: Next,
) -> Response
where
  S: PresenceStore + 'static,
  presence_core::Error: From<S::Error>,
{
  let (email, password) = match basic_credentials(req.headers()) {
    Ok(creds) => creds,
    Err(rejection) => return rejection.into_response(),
  };

  let subject = match service.store().find_subject_by_email(email).await {
    Ok(subject) => subject,
    Err(e) => return ApiError::from(presence_core::Error::from(e)).into_response(),
  };

  let verified = subject.filter(|s| {
    s.password_hash
      .as_deref()
      .is_some_and(|hash| verify_password(&password, hash))
  });
  let Some(subject) = verified else {
    tracing::debug!(path = %req.uri().path(), "rejected self-service request");
    return Unauthorized.into_response();
  };

  req.extensions_mut().insert(SubjectIdentity(subject.subject_id));
  next.run(req).await
}
