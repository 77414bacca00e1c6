//! Handlers for modification requests.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/requests` | Tenant/staff; body is a [`Proposal`] |
//! | `GET`  | `/requests` | Tenant/staff; own tenant's requests, newest first |
//! | `GET`  | `/admin/requests` | Operator; `?status=all\|pending\|approved\|rejected` (default `pending`), optional `&tenant_id=` |
//! | `PUT`  | `/requests/:id/decision` | Operator; body: `{"decision":"approve","admin_notes":".."}` |
//! | `PUT`  | `/requests/:id/revert` | Operator; body: `{"fallback_status":"rejected"}` (optional) |

use std::str::FromStr as _;

use answerdesk_core::{
  request::{Decision, ModificationRequest, RequestStatus},
  store::{QnaStore, QueuedRequest},
};
use answerdesk_engine::workflow::Proposal;
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, body::JsonBody, error::ApiError};

// ─── Tenant side ─────────────────────────────────────────────────────────────

/// `POST /requests`
pub async fn submit<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  JsonBody(proposal): JsonBody<Proposal>,
) -> Result<impl IntoResponse, ApiError> {
  let request = state.services.workflow.submit(&caller, proposal).await?;
  Ok((StatusCode::CREATED, Json(request)))
}

/// `GET /requests`
pub async fn own<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<Vec<QueuedRequest>>, ApiError> {
  Ok(Json(state.services.workflow.tenant_requests(&caller).await?))
}

// ─── Operator queue ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QueueParams {
  pub status:    Option<String>,
  pub tenant_id: Option<Uuid>,
}

/// `all` lifts the filter; nothing given means the pending queue.
fn status_filter(raw: Option<&str>) -> Result<Option<RequestStatus>, ApiError> {
  match raw.map(str::trim) {
    None | Some("") => Ok(Some(RequestStatus::Pending)),
    Some(s) if s.eq_ignore_ascii_case("all") => Ok(None),
    Some(s) => RequestStatus::from_str(&s.to_lowercase())
      .map(Some)
      .map_err(|_| ApiError::BadRequest(format!("unknown status {s:?}"))),
  }
}

/// `GET /admin/requests[?status=<status>][&tenant_id=<uuid>]`
pub async fn queue<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Query(params): Query<QueueParams>,
) -> Result<Json<Vec<QueuedRequest>>, ApiError> {
  let status = status_filter(params.status.as_deref())?;
  Ok(Json(state.services.workflow.queue(&caller, params.tenant_id, status).await?))
}

// ─── Decide ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DecisionBody {
  pub decision:    Decision,
  pub admin_notes: Option<String>,
}

/// `PUT /requests/:id/decision`
pub async fn decide<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
  JsonBody(body): JsonBody<DecisionBody>,
) -> Result<Json<ModificationRequest>, ApiError> {
  let request = state
    .services
    .workflow
    .decide(&caller, id, body.decision, body.admin_notes)
    .await?;
  Ok(Json(request))
}

// ─── Revert ──────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct RevertBody {
  #[serde(default)]
  pub fallback_status: Option<RequestStatus>,
  #[serde(default)]
  pub admin_notes:     Option<String>,
}

/// `PUT /requests/:id/revert`
pub async fn revert<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
  body: Option<JsonBody<RevertBody>>,
) -> Result<Json<ModificationRequest>, ApiError> {
  let body = body.map(|JsonBody(b)| b).unwrap_or_default();
  let request = state
    .services
    .workflow
    .revert(
      &caller,
      id,
      body.fallback_status.unwrap_or(RequestStatus::Rejected),
      body.admin_notes,
    )
    .await?;
  Ok(Json(request))
}
