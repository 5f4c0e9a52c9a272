//! Self-service caller identity.
//!
//! The self-service router authenticates nobody itself. The layer in front of
//! it verifies the caller's credentials, resolves the subject, and inserts a
//! [`SubjectIdentity`] into the request extensions. Handlers take the subject
//! from there and never from anything the caller sends.

use axum::{extract::FromRequestParts, http::request::Parts};
use uuid::Uuid;

use crate::error::ApiError;

/// The subject on whose behalf a self-service request acts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectIdentity(pub Uuid);

impl<St> FromRequestParts<St> for SubjectIdentity
where
  St: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    _state: &St,
  ) -> Result<Self, Self::Rejection> {
    parts
      .extensions
      .get::<SubjectIdentity>()
      .copied()
      .ok_or(ApiError::Unauthenticated)
  }
}
