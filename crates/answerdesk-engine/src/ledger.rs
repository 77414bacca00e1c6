//! Tenant accounts and their usage counters.

use std::{sync::Arc, time::Duration};

use answerdesk_core::{
  identity::Caller,
  notify::{AuditLog, NewAuditRecord},
  plan::PlanTier,
  store::{QnaStore, TenantQuery},
  tenant::{NewTenant, PlanChange, Tenant, Usage},
};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{Error, Result};

pub struct UsageLedger<S> {
  store: Arc<S>,
  audit: Arc<dyn AuditLog>,
}

impl<S: QnaStore + 'static> UsageLedger<S> {
  pub fn new(store: Arc<S>, audit: Arc<dyn AuditLog>) -> Self { Self { store, audit } }

  // ── Accounts ──────────────────────────────────────────────────────────────

  pub async fn register_tenant(&self, caller: &Caller, input: NewTenant) -> Result<Tenant> {
    caller.require_operator()?;
    let tenant = self.store.create_tenant(input).await.map_err(Error::store)?;
    self.audit.append(NewAuditRecord::new(
      &caller.user_id,
      "tenant.create",
      Some(tenant.tenant_id),
      serde_json::json!({ "website_key": tenant.website_key, "plan": tenant.plan }),
    ));
    Ok(tenant)
  }

  /// Every tenant, or those whose name, email or website key contains
  /// `search` (at most [`answerdesk_core::store::TENANT_SEARCH_LIMIT`]).
  pub async fn list_tenants(&self, caller: &Caller, search: Option<&str>) -> Result<Vec<Tenant>> {
    caller.require_operator()?;
    let query = search.map(TenantQuery::search).unwrap_or_default();
    self.store.list_tenants(query).await.map_err(Error::store)
  }

  /// Remove a tenant with its corpus, stats, requests and notifications.
  pub async fn delete_tenant(&self, caller: &Caller, tenant_id: Uuid) -> Result<Tenant> {
    caller.require_operator()?;
    let tenant = self.store.delete_tenant(tenant_id).await.map_err(Error::store)?;
    self.audit.append(NewAuditRecord::new(
      &caller.user_id,
      "tenant.delete",
      Some(tenant_id),
      serde_json::json!({ "website_key": tenant.website_key, "plan": tenant.plan }),
    ));
    Ok(tenant)
  }

  pub async fn set_active(&self, caller: &Caller, tenant_id: Uuid, is_active: bool) -> Result<Tenant> {
    caller.require_operator()?;
    let tenant = self
      .store
      .set_tenant_active(tenant_id, is_active)
      .await
      .map_err(Error::store)?;
    info!(%tenant_id, is_active, "tenant activity changed");
    self.audit.append(NewAuditRecord::new(
      &caller.user_id,
      "tenant.set_active",
      Some(tenant_id),
      serde_json::json!({ "is_active": is_active }),
    ));
    Ok(tenant)
  }

  // ── Counters ──────────────────────────────────────────────────────────────

  pub async fn adjust_questions_used(
    &self,
    caller: &Caller,
    tenant_id: Uuid,
    delta: i64,
  ) -> Result<Usage> {
    caller.require_operator()?;
    let usage = self
      .store
      .adjust_questions_used(tenant_id, delta)
      .await
      .map_err(Error::store)?;
    self.audit.append(NewAuditRecord::new(
      &caller.user_id,
      "usage.adjust_questions",
      Some(tenant_id),
      serde_json::json!({ "delta": delta, "questions_used": usage.questions_used }),
    ));
    Ok(usage)
  }

  pub async fn adjust_modifications_used(
    &self,
    caller: &Caller,
    tenant_id: Uuid,
    delta: i64,
  ) -> Result<Usage> {
    caller.require_operator()?;
    let usage = self
      .store
      .adjust_modifications_used(tenant_id, delta)
      .await
      .map_err(Error::store)?;
    self.audit.append(NewAuditRecord::new(
      &caller.user_id,
      "usage.adjust_modifications",
      Some(tenant_id),
      serde_json::json!({ "delta": delta, "modifications_used": usage.modifications_used }),
    ));
    Ok(usage)
  }

  // ── Plans ─────────────────────────────────────────────────────────────────

  pub async fn apply_plan(
    &self,
    caller: &Caller,
    tenant_id: Uuid,
    plan: PlanTier,
    is_new_cycle: bool,
  ) -> Result<(Tenant, PlanChange)> {
    caller.require_operator()?;
    let (tenant, change) = self
      .store
      .apply_plan(tenant_id, plan, is_new_cycle)
      .await
      .map_err(Error::store)?;
    self.audit.append(NewAuditRecord::new(
      &caller.user_id,
      "plan.apply",
      Some(tenant_id),
      serde_json::json!({
        "from": change.previous,
        "to": change.plan,
        "is_new_cycle": is_new_cycle,
        "reset_usage": change.reset_usage,
        "subscription_end": change.window.end,
      }),
    ));
    Ok((tenant, change))
  }

  /// Recompute every tenant's allowances from its plan tag.
  pub async fn sync_allowances(&self, actor: &str) -> Result<Vec<Uuid>> {
    let corrected = self.store.sync_allowances().await.map_err(Error::store)?;
    if !corrected.is_empty() {
      info!(count = corrected.len(), "allowances corrected");
      self.audit.append(NewAuditRecord::new(
        actor,
        "plan.sync_allowances",
        None,
        serde_json::json!({ "tenants": corrected }),
      ));
    }
    Ok(corrected)
  }

  /// Run [`Self::sync_allowances`] now and then every `every`.
  ///
  /// The returned handle is aborted on shutdown.
  pub fn spawn_sync_sweep(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
      let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
      ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
      loop {
        ticker.tick().await;
        if let Err(e) = self.sync_allowances("system").await {
          warn!(error = %e, "allowance sweep failed");
        }
      }
    })
  }
}
