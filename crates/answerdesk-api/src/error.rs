//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body has the shape `{"kind": .., "code": .., "message": ..}`
//! where `kind` and `code` come from [`Classify`].

use answerdesk_core::{Classify, ErrorKind};
use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  /// No credential, or one the identity provider did not recognise.
  #[error("authentication required")]
  Unauthorized,

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error(transparent)]
  Service(#[from] answerdesk_engine::Error),
}

impl From<answerdesk_core::Error> for ApiError {
  fn from(e: answerdesk_core::Error) -> Self { ApiError::Service(e.into()) }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { ApiError::BadRequest(rejection.body_text()) }
}

impl Classify for ApiError {
  fn kind(&self) -> ErrorKind {
    match self {
      ApiError::Unauthorized => ErrorKind::Authorization,
      ApiError::BadRequest(_) => ErrorKind::Validation,
      ApiError::Service(e) => e.kind(),
    }
  }

  fn code(&self) -> &'static str {
    match self {
      ApiError::Unauthorized => "unauthorized",
      ApiError::BadRequest(_) => "validation",
      ApiError::Service(e) => e.code(),
    }
  }
}

impl ApiError {
  pub fn status(&self) -> StatusCode {
    match (self, self.kind()) {
      (ApiError::Unauthorized, _) => StatusCode::UNAUTHORIZED,
      (_, ErrorKind::Validation) => StatusCode::BAD_REQUEST,
      (_, ErrorKind::Authorization) => StatusCode::FORBIDDEN,
      (_, ErrorKind::NotFound) => StatusCode::NOT_FOUND,
      (_, ErrorKind::BusinessRule) => StatusCode::CONFLICT,
      (_, ErrorKind::Infrastructure) => StatusCode::SERVICE_UNAVAILABLE,
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      tracing::error!(code = self.code(), error = %self, "request failed");
    }
    let body = json!({
      "kind": self.kind(),
      "code": self.code(),
      "message": self.to_string(),
    });
    (status, Json(body)).into_response()
  }
}
