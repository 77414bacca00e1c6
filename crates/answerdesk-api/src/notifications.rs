//! Handlers for the caller's notification inbox.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/notifications` | Newest 50 |
//! | `GET`  | `/notifications/unread-count` | `{"unread": n}` |
//! | `PUT`  | `/notifications/:id/read` | Idempotent; `{"changed": bool}` |

use answerdesk_core::{notify::Notification, store::QnaStore};
use axum::{
  Json,
  extract::{Path, State},
};
use serde_json::{Value, json};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

/// `GET /notifications`
pub async fn list<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<Vec<Notification>>, ApiError> {
  Ok(Json(state.services.reports.notifications(&caller).await?))
}

/// `GET /notifications/unread-count`
pub async fn unread_count<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<Value>, ApiError> {
  let unread = state.services.reports.unread_count(&caller).await?;
  Ok(Json(json!({ "unread": unread })))
}

/// `PUT /notifications/:id/read`
pub async fn mark_read<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Value>, ApiError> {
  let changed = state.services.reports.mark_read(&caller, id).await?;
  Ok(Json(json!({ "changed": changed })))
}
