//! Caller extraction.
//!
//! The raw `Authorization` header is handed to the configured
//! [`IdentityProvider`]; whatever it resolves is trusted as given.

use answerdesk_core::identity::Caller;
use axum::{
  extract::FromRequestParts,
  http::{header, request::Parts},
};

use crate::{AppState, error::ApiError};

/// An authenticated caller. Present in a handler means the credential
/// resolved; role checks happen in the services.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Caller);

impl<S> FromRequestParts<AppState<S>> for Authenticated
where
  S: Send + Sync + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    let credential = parts
      .headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .ok_or(ApiError::Unauthorized)?;

    let caller = state.identity.resolve(credential).ok_or_else(|| {
      tracing::debug!("credential not recognised");
      ApiError::Unauthorized
    })?;
    Ok(Authenticated(caller))
  }
}
