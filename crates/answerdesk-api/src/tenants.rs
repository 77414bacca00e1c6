//! Operator handlers for tenant accounts and the usage ledger.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/tenants` | Every tenant; `?search=` matches name, email or key (max 50) |
//! | `POST` | `/tenants` | Body: `{"name":"..","email":"..","website_key":".."}` |
//! | `GET`  | `/tenants/:id` | Detail; `?page=&per_page=` pages the corpus |
//! | `DELETE` | `/tenants/:id` | Removes the tenant with its entries, stats and requests |
//! | `PUT`  | `/tenants/:id/plan` | Body: `{"plan":"monthly","is_new_cycle":true}` |
//! | `PUT`  | `/tenants/:id/active` | Body: `{"is_active":false}` |
//! | `POST` | `/tenants/:id/usage` | Body: `{"questions_delta":-1,"modifications_delta":0}` |
//! | `POST` | `/admin/sync-allowances` | Recompute allowances from plan tags |

use answerdesk_core::{
  plan::PlanTier,
  store::QnaStore,
  tenant::{NewTenant, PlanChange, Tenant, Usage},
};
use answerdesk_engine::reports::TenantDetail;
use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AppState, auth::Authenticated, body::JsonBody, error::ApiError};

pub const DEFAULT_PER_PAGE: usize = 20;

// ─── List / create ───────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub search: Option<String>,
}

/// `GET /tenants[?search=<term>]`
pub async fn list<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Tenant>>, ApiError> {
  let tenants = state
    .services
    .ledger
    .list_tenants(&caller, params.search.as_deref())
    .await?;
  Ok(Json(tenants))
}

/// `POST /tenants`
pub async fn create<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  JsonBody(body): JsonBody<NewTenant>,
) -> Result<impl IntoResponse, ApiError> {
  let tenant = state.services.ledger.register_tenant(&caller, body).await?;
  Ok((StatusCode::CREATED, Json(tenant)))
}

// ─── Detail ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DetailParams {
  pub page:     Option<usize>,
  pub per_page: Option<usize>,
}

/// `GET /tenants/:id[?page=<n>&per_page=<n>]`
pub async fn detail<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
  Query(params): Query<DetailParams>,
) -> Result<Json<TenantDetail>, ApiError> {
  let detail = state
    .services
    .reports
    .tenant_detail(
      &caller,
      id,
      params.page.unwrap_or(1),
      params.per_page.unwrap_or(DEFAULT_PER_PAGE),
    )
    .await?;
  Ok(Json(detail))
}

/// `DELETE /tenants/:id`
pub async fn remove<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
) -> Result<Json<Tenant>, ApiError> {
  Ok(Json(state.services.delete_tenant(&caller, id).await?))
}

// ─── Plan and flags ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PlanBody {
  /// Unknown tags resolve to the trial plan.
  pub plan:         String,
  #[serde(default)]
  pub is_new_cycle: bool,
}

#[derive(Debug, Serialize)]
pub struct PlanApplied {
  pub tenant: Tenant,
  pub change: PlanChange,
}

/// `PUT /tenants/:id/plan`
pub async fn apply_plan<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
  JsonBody(body): JsonBody<PlanBody>,
) -> Result<Json<PlanApplied>, ApiError> {
  let (tenant, change) = state
    .services
    .ledger
    .apply_plan(&caller, id, PlanTier::from_tag(&body.plan), body.is_new_cycle)
    .await?;
  Ok(Json(PlanApplied { tenant, change }))
}

#[derive(Debug, Deserialize)]
pub struct ActiveBody {
  pub is_active: bool,
}

/// `PUT /tenants/:id/active`
pub async fn set_active<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
  JsonBody(body): JsonBody<ActiveBody>,
) -> Result<Json<Tenant>, ApiError> {
  Ok(Json(state.services.ledger.set_active(&caller, id, body.is_active).await?))
}

// ─── Usage ───────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct UsageBody {
  #[serde(default)]
  pub questions_delta:     i64,
  #[serde(default)]
  pub modifications_delta: i64,
}

/// `POST /tenants/:id/usage`
///
/// Manual correction of the question and modification counters. Each
/// counter is adjusted in its own transaction; a delta of zero leaves that
/// counter alone.
pub async fn adjust_usage<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
  Path(id): Path<Uuid>,
  JsonBody(body): JsonBody<UsageBody>,
) -> Result<Json<Usage>, ApiError> {
  caller.require_operator()?;
  let ledger = &state.services.ledger;
  let mut usage = None;
  if body.questions_delta != 0 {
    usage = Some(ledger.adjust_questions_used(&caller, id, body.questions_delta).await?);
  }
  if body.modifications_delta != 0 {
    usage = Some(
      ledger
        .adjust_modifications_used(&caller, id, body.modifications_delta)
        .await?,
    );
  }
  match usage {
    Some(usage) => Ok(Json(usage)),
    None => Err(ApiError::BadRequest("no counter delta given".into())),
  }
}

// ─── Sync ────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct SyncReport {
  pub corrected: Vec<Uuid>,
}

/// `POST /admin/sync-allowances`
pub async fn sync<S: QnaStore + 'static>(
  State(state): State<AppState<S>>,
  Authenticated(caller): Authenticated,
) -> Result<Json<SyncReport>, ApiError> {
  caller.require_operator()?;
  let corrected = state.services.ledger.sync_allowances(&caller.user_id).await?;
  Ok(Json(SyncReport { corrected }))
}
