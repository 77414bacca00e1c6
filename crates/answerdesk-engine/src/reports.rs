//! Read-only projections for dashboards and the operator console.
//!
//! Nothing here mutates counters or the corpus; marking a notification read
//! is the only write.

use std::{cmp::Reverse, collections::HashMap, sync::Arc};

use answerdesk_core::{
  Error as CoreError,
  identity::Caller,
  notify::{AuditRecord, Notification},
  plan::{PlanLimits, PlanTier},
  stats::{QuestionStats, RankedEntry, StatsSummary},
  store::{QnaStore, QueuedRequest, RequestQuery, StatsQuery},
  tenant::{SubscriptionWindow, Tenant, Usage},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{Error, Result};

/// Notifications listed per inbox.
pub const INBOX_LIMIT: usize = 50;
/// Requests shown in a tenant detail view.
pub const RECENT_REQUESTS: usize = 10;

#[derive(Debug, Clone, Serialize)]
pub struct SubscriptionStatus {
  pub tenant_id:      Uuid,
  pub name:           String,
  pub website_key:    String,
  pub plan:           PlanTier,
  pub limits:         PlanLimits,
  pub window:         SubscriptionWindow,
  pub usage:          Usage,
  pub days_remaining: i64,
  pub is_expired:     bool,
  pub is_active:      bool,
}

impl SubscriptionStatus {
  pub fn of(tenant: &Tenant, now: DateTime<Utc>) -> Self {
    Self {
      tenant_id:      tenant.tenant_id,
      name:           tenant.name.clone(),
      website_key:    tenant.website_key.clone(),
      plan:           tenant.plan,
      limits:         tenant.plan.limits(),
      window:         tenant.window,
      usage:          tenant.usage,
      days_remaining: tenant.window.days_remaining(now),
      is_expired:     tenant.window.has_elapsed(now),
      is_active:      tenant.is_active,
    }
  }
}

/// One page of a longer list. Pages are numbered from 1.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
  pub items:    Vec<T>,
  pub page:     usize,
  pub per_page: usize,
  pub total:    usize,
}

impl<T> Page<T> {
  pub fn slice(all: Vec<T>, page: usize, per_page: usize) -> Self {
    let page = page.max(1);
    let per_page = per_page.clamp(1, 100);
    let total = all.len();
    let items = all.into_iter().skip((page - 1) * per_page).take(per_page).collect();
    Self { items, page, per_page, total }
  }
}

#[derive(Debug, Clone, Serialize)]
pub struct TenantDetail {
  pub subscription:    SubscriptionStatus,
  pub summary:         StatsSummary,
  pub entries:         Page<RankedEntry>,
  pub recent_requests: Vec<QueuedRequest>,
}

pub struct Reports<S> {
  store: Arc<S>,
}

impl<S: QnaStore + 'static> Reports<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }

  async fn tenant(&self, tenant_id: Uuid) -> Result<Tenant> {
    self
      .store
      .get_tenant(tenant_id)
      .await
      .map_err(Error::store)?
      .ok_or_else(|| CoreError::TenantNotFound(tenant_id).into())
  }

  /// Every entry with its match count, most-asked first; ties keep corpus
  /// order.
  async fn entries_with_counts(&self, tenant_id: Uuid) -> Result<Vec<RankedEntry>> {
    let entries = self.store.list_entries(tenant_id).await.map_err(Error::store)?;
    let counts: HashMap<Uuid, u64> = self
      .store
      .ranked_entries(tenant_id)
      .await
      .map_err(Error::store)?
      .into_iter()
      .map(|r| (r.entry.entry_id, r.asked_count))
      .collect();

    let mut ranked: Vec<RankedEntry> = entries
      .into_iter()
      .map(|entry| {
        let asked_count = counts.get(&entry.entry_id).copied().unwrap_or(0);
        RankedEntry { entry, asked_count }
      })
      .collect();
    ranked.sort_by_key(|r| Reverse(r.asked_count));
    Ok(ranked)
  }

  // ── Tenant self-service ───────────────────────────────────────────────────

  pub async fn subscription(&self, caller: &Caller) -> Result<SubscriptionStatus> {
    let tenant = self.tenant(caller.tenant_scope()?).await?;
    Ok(SubscriptionStatus::of(&tenant, Utc::now()))
  }

  pub async fn summary(&self, caller: &Caller) -> Result<StatsSummary> {
    self
      .store
      .stats_summary(caller.tenant_scope()?)
      .await
      .map_err(Error::store)
  }

  pub async fn entries(&self, caller: &Caller) -> Result<Vec<RankedEntry>> {
    self.entries_with_counts(caller.tenant_scope()?).await
  }

  /// Questions visitors asked that nothing answered, most-asked first.
  pub async fn requested_questions(&self, caller: &Caller) -> Result<Vec<QuestionStats>> {
    let tenant_id = caller.tenant_scope()?;
    self
      .store
      .list_stats(StatsQuery { tenant_id: Some(tenant_id), bound: Some(false) })
      .await
      .map_err(Error::store)
  }

  // ── Operator console ──────────────────────────────────────────────────────

  pub async fn all_stats(
    &self,
    caller: &Caller,
    tenant_id: Option<Uuid>,
  ) -> Result<Vec<QuestionStats>> {
    caller.require_operator()?;
    self
      .store
      .list_stats(StatsQuery { tenant_id, bound: None })
      .await
      .map_err(Error::store)
  }

  pub async fn tenant_detail(
    &self,
    caller: &Caller,
    tenant_id: Uuid,
    page: usize,
    per_page: usize,
  ) -> Result<TenantDetail> {
    caller.require_operator()?;
    let tenant = self.tenant(tenant_id).await?;
    let summary = self.store.stats_summary(tenant_id).await.map_err(Error::store)?;
    let entries = self.entries_with_counts(tenant_id).await?;
    let mut recent_requests = self
      .store
      .list_requests(RequestQuery { tenant_id: Some(tenant_id), status: None })
      .await
      .map_err(Error::store)?;
    recent_requests.truncate(RECENT_REQUESTS);

    Ok(TenantDetail {
      subscription: SubscriptionStatus::of(&tenant, Utc::now()),
      summary,
      entries: Page::slice(entries, page, per_page),
      recent_requests,
    })
  }

  pub async fn audit_log(&self, caller: &Caller, limit: usize) -> Result<Vec<AuditRecord>> {
    caller.require_operator()?;
    self.store.list_audit(limit).await.map_err(Error::store)
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  pub async fn notifications(&self, caller: &Caller) -> Result<Vec<Notification>> {
    self
      .store
      .list_notifications(caller.inbox(), INBOX_LIMIT)
      .await
      .map_err(Error::store)
  }

  pub async fn unread_count(&self, caller: &Caller) -> Result<u64> {
    self
      .store
      .unread_notifications(caller.inbox())
      .await
      .map_err(Error::store)
  }

  /// Idempotent: `false` when it was already read.
  pub async fn mark_read(&self, caller: &Caller, notification_id: Uuid) -> Result<bool> {
    self
      .store
      .mark_notification_read(notification_id, caller.inbox())
      .await
      .map_err(Error::store)
  }
}
