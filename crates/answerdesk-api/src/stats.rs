//! Read models: tenant self-service and operator reports.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/me/subscription` | Plan, window, usage, days remaining |
//! | `GET`  | `/me/entries` | Corpus with `asked_count`, most-asked first |
//! | `GET`  | `/me/stats/summary` | Counts for the dashboard |
//! | `GET`  | `/me/stats/requested` | Unmatched questions, most-asked first |
//! | `GET`  | `/admin/stats` | Operator; optional `?tenant_id=` |
//! | `GET`  | `/admin/logs` | Operator; `?limit=` (default 100) |

use answerdesk_core::{
  notify::AuditRecord,
  stats::{QuestionStats, RankedEntry, StatsSummary},
  store::QnaStore,
};
use answerdesk_engine::reports::SubscriptionStatus;
use axum::{
  Json,
  extract::{Query, State},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, error::ApiError};

pub const DEFAULT_LOG_LIMIT: usize = 100;

// ─── Tenant self-service ─────────────────────────────────────────────────────

/// `GET /me/subscription`
pub async fn subscription<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<SubscriptionStatus>, ApiError> {
  Ok(Json(state.services.reports.subscription(&caller).await?))
}

/// `GET /me/entries`
pub async fn entries<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<Vec<RankedEntry>>, ApiError> {
  Ok(Json(state.services.reports.entries(&caller).await?))
}

/// `GET /me/stats/summary`
pub async fn summary<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<StatsSummary>, ApiError> {
  Ok(Json(state.services.reports.summary(&caller).await?))
}

/// `GET /me/stats/requested`
pub async fn requested<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<Vec<QuestionStats>>, ApiError> {
  Ok(Json(state.services.reports.requested_questions(&caller).await?))
}

// ─── Operator ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatsParams {
  pub tenant_id: Option<Uuid>,
}

/// `GET /admin/stats[?tenant_id=<uuid>]`
pub async fn all<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Query(params): Query<StatsParams>,
) -> Result<Json<Vec<QuestionStats>>, ApiError> {
  Ok(Json(state.services.reports.all_stats(&caller, params.tenant_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct LogParams {
  pub limit: Option<usize>,
}

/// `GET /admin/logs[?limit=<n>]`
pub async fn logs<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Query(params): Query<LogParams>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
  let limit = params.limit.unwrap_or(DEFAULT_LOG_LIMIT);
  Ok(Json(state.services.reports.audit_log(&caller, limit).await?))
}
