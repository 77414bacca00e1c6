//! Operator handlers for direct corpus administration.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `POST`   | `/tenants/:id/entries` | Body: `{"question":"..","answer":".."}`; counts against the question quota |
//! | `PUT`    | `/entries/:id` | Same body; replaces question and answer |
//! | `DELETE` | `/entries/:id` | Stats history is kept, unbound |
//!
//! None of these consume modification quota.

use answerdesk_core::{
  entry::{EntryContent, QaEntry},
  store::QnaStore,
};
use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, body::JsonBody, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct EntryBody {
  #[serde(default)]
  pub question: String,
  #[serde(default)]
  pub answer:   String,
}

impl EntryBody {
  fn into_content(self) -> Result<EntryContent, ApiError> {
    Ok(EntryContent::new(self.question, self.answer)?)
  }
}

/// `POST /tenants/:id/entries`
pub async fn create<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(tenant_id): Path<Uuid>,
  JsonBody(body): JsonBody<EntryBody>,
) -> Result<impl IntoResponse, ApiError> {
  let content = body.into_content()?;
  let entry = state.services.workflow.add_entry(&caller, tenant_id, content).await?;
  Ok((StatusCode::CREATED, Json(entry)))
}

/// `PUT /entries/:id`
pub async fn update<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
  JsonBody(body): JsonBody<EntryBody>,
) -> Result<Json<QaEntry>, ApiError> {
  let content = body.into_content()?;
  Ok(Json(state.services.workflow.update_entry(&caller, id, content).await?))
}

/// `DELETE /entries/:id`
pub async fn remove<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<QaEntry>, ApiError> {
  Ok(Json(state.services.workflow.delete_entry(&caller, id).await?))
}
