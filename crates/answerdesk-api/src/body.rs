//! JSON request bodies.
//!
//! [`JsonBody`] wraps [`axum::Json`] so a malformed or mistyped body is
//! answered with the usual `{"kind": "validation", ..}` error instead of
//! axum's plain-text rejection.

use axum::{
  Json,
  extract::{FromRequest, OptionalFromRequest, Request},
};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonBody<T>(pub T);

impl<T, S> FromRequest<S> for JsonBody<T>
where
  T: DeserializeOwned,
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
    let Json(value) = <Json<T> as FromRequest<S>>::from_request(req, state).await?;
    Ok(Self(value))
  }
}

/// An absent body (no JSON content type) is `None`; a present but invalid
/// one is still rejected.
impl<T, S> OptionalFromRequest<S> for JsonBody<T>
where
  T: DeserializeOwned,
  S: Send + Sync,
{
  type Rejection = ApiError;

  async fn from_request(req: Request, state: &S) -> Result<Option<Self>, Self::Rejection> {
    let body = <Json<T> as OptionalFromRequest<S>>::from_request(req, state).await?;
    Ok(body.map(|Json(value)| Self(value)))
  }
}
