//! The `QnaStore` trait and supporting query types.
//!
//! The trait is implemented by storage backends (e.g.
//! `answerdesk-store-sqlite`). Every method that gates on a counter and then
//! mutates must do both atomically: either all of its effects are committed
//! or none are. Counters are re-read inside that unit of work, never taken
//! from a caller-supplied copy.

use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

use crate::{
  Classify,
  entry::{EntryContent, QaEntry},
  notify::{AuditRecord, NewAuditRecord, NewNotification, Notification},
  plan::PlanTier,
  request::{Decision, ModificationRequest, NewRequest, RequestStatus},
  stats::{QuestionStats, RankedEntry, StatsSummary},
  tenant::{NewTenant, PlanChange, Tenant, Usage},
};

// ─── Query and result types ──────────────────────────────────────────────────

/// Result of [`QnaStore::record_hit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitReceipt {
  /// One hit consumed and the entry's bound stats row incremented.
  Consumed,
  /// The tenant was already at its hit allowance; nothing changed.
  LimitReached,
  /// The matched entry was removed before the hit could be recorded;
  /// nothing changed.
  EntryRemoved,
}

/// Most tenants a search returns.
pub const TENANT_SEARCH_LIMIT: usize = 50;

/// Filter for [`QnaStore::list_tenants`].
#[derive(Debug, Clone, Default)]
pub struct TenantQuery {
  /// Case-insensitive substring of name, email or website key.
  pub search: Option<String>,
  pub limit:  Option<usize>,
}

impl TenantQuery {
  /// A search capped at [`TENANT_SEARCH_LIMIT`]. A blank term lists every
  /// tenant.
  pub fn search(term: &str) -> Self {
    let term = term.trim();
    if term.is_empty() {
      return Self::default();
    }
    Self { search: Some(term.to_owned()), limit: Some(TENANT_SEARCH_LIMIT) }
  }
}

/// Filter for [`QnaStore::list_requests`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestQuery {
  pub tenant_id: Option<Uuid>,
  /// `None` lists every status.
  pub status:    Option<RequestStatus>,
}

/// A request together with how often its proposed text has been asked.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedRequest {
  #[serde(flatten)]
  pub request:     ModificationRequest,
  pub asked_count: u64,
}

/// Filter for [`QnaStore::list_stats`].
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsQuery {
  pub tenant_id: Option<Uuid>,
  /// `Some(true)` for matched rows only, `Some(false)` for unmatched only.
  pub bound:     Option<bool>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over an answerdesk store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait QnaStore: Send + Sync {
  type Error: std::error::Error + Classify + Send + Sync + 'static;

  // ── Tenants ───────────────────────────────────────────────────────────

  /// Register a tenant on the trial plan with a fresh window.
  fn create_tenant(
    &self,
    input: NewTenant,
  ) -> impl Future<Output = Result<Tenant, Self::Error>> + Send + '_;

  fn get_tenant(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Tenant>, Self::Error>> + Send + '_;

  /// Look a tenant up by its public website key.
  fn get_tenant_by_key<'a>(
    &'a self,
    website_key: &'a str,
  ) -> impl Future<Output = Result<Option<Tenant>, Self::Error>> + Send + 'a;

  /// Tenants oldest first, narrowed by `query`.
  fn list_tenants(
    &self,
    query: TenantQuery,
  ) -> impl Future<Output = Result<Vec<Tenant>, Self::Error>> + Send + '_;

  fn set_tenant_active(
    &self,
    id: Uuid,
    is_active: bool,
  ) -> impl Future<Output = Result<Tenant, Self::Error>> + Send + '_;

  /// Remove a tenant together with its entries, stats, requests and
  /// notifications in one unit of work. Returns the tenant as it was.
  fn delete_tenant(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Tenant, Self::Error>> + Send + '_;

  // ── Usage ledger ──────────────────────────────────────────────────────

  /// Atomic compare-and-increment of `hits_used`. Returns `false` without
  /// mutating if the tenant is already at its allowance.
  fn consume_hit(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Add `delta` to `questions_used`; refuses to go below zero.
  fn adjust_questions_used(
    &self,
    tenant_id: Uuid,
    delta: i64,
  ) -> impl Future<Output = Result<Usage, Self::Error>> + Send + '_;

  /// Add `delta` to `modifications_used`; refuses to go below zero.
  fn adjust_modifications_used(
    &self,
    tenant_id: Uuid,
    delta: i64,
  ) -> impl Future<Output = Result<Usage, Self::Error>> + Send + '_;

  /// Move a tenant onto `plan` per [`Tenant::plan_change`].
  fn apply_plan(
    &self,
    tenant_id: Uuid,
    plan: PlanTier,
    is_new_cycle: bool,
  ) -> impl Future<Output = Result<(Tenant, PlanChange), Self::Error>> + Send + '_;

  /// Recompute every tenant's allowances from its stored plan tag. Usage
  /// counters and windows are untouched. Returns the ids of corrected
  /// tenants.
  fn sync_allowances(
    &self,
  ) -> impl Future<Output = Result<Vec<Uuid>, Self::Error>> + Send + '_;

  // ── Corpus ────────────────────────────────────────────────────────────

  /// A tenant's entries in corpus (insertion) order.
  fn list_entries(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<QaEntry>, Self::Error>> + Send + '_;

  fn get_entry(
    &self,
    entry_id: Uuid,
  ) -> impl Future<Output = Result<Option<QaEntry>, Self::Error>> + Send + '_;

  /// Operator add. Gated on the subscription window, duplicates, and the
  /// question quota; binds any unmatched stats row with identical text.
  fn add_entry(
    &self,
    tenant_id: Uuid,
    content: EntryContent,
  ) -> impl Future<Output = Result<QaEntry, Self::Error>> + Send + '_;

  /// Operator edit. Gated on the subscription window.
  fn update_entry(
    &self,
    entry_id: Uuid,
    content: EntryContent,
  ) -> impl Future<Output = Result<QaEntry, Self::Error>> + Send + '_;

  /// Operator delete. Gated on the subscription window; the entry's stats
  /// history is unbound rather than dropped.
  fn delete_entry(
    &self,
    entry_id: Uuid,
  ) -> impl Future<Output = Result<QaEntry, Self::Error>> + Send + '_;

  // ── Query telemetry ───────────────────────────────────────────────────

  /// Consume one hit and increment the bound stats row for `entry_id`, as a
  /// single unit.
  fn record_hit(
    &self,
    tenant_id: Uuid,
    entry_id: Uuid,
  ) -> impl Future<Output = Result<HitReceipt, Self::Error>> + Send + '_;

  /// Upsert the unbound stats row for `(tenant, question_text)`.
  fn record_unmatched(
    &self,
    tenant_id: Uuid,
    question_text: String,
  ) -> impl Future<Output = Result<QuestionStats, Self::Error>> + Send + '_;

  /// Stats rows, most-asked first.
  fn list_stats(
    &self,
    query: StatsQuery,
  ) -> impl Future<Output = Result<Vec<QuestionStats>, Self::Error>> + Send + '_;

  /// A tenant's entries that have been matched at least once, most-asked
  /// first.
  fn ranked_entries(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<Vec<RankedEntry>, Self::Error>> + Send + '_;

  fn stats_summary(
    &self,
    tenant_id: Uuid,
  ) -> impl Future<Output = Result<StatsSummary, Self::Error>> + Send + '_;

  // ── Modification requests ─────────────────────────────────────────────

  /// Queue a request as `pending`. No quota is checked here.
  fn submit_request(
    &self,
    input: NewRequest,
  ) -> impl Future<Output = Result<ModificationRequest, Self::Error>> + Send + '_;

  fn get_request(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<ModificationRequest>, Self::Error>> + Send + '_;

  /// Requests matching `query`, newest first.
  fn list_requests(
    &self,
    query: RequestQuery,
  ) -> impl Future<Output = Result<Vec<QueuedRequest>, Self::Error>> + Send + '_;

  /// Approve or reject a pending request. A refused approval leaves the
  /// request pending and commits nothing.
  fn decide_request(
    &self,
    id: Uuid,
    decision: Decision,
    admin_notes: Option<String>,
    actor: String,
  ) -> impl Future<Output = Result<ModificationRequest, Self::Error>> + Send + '_;

  /// Compensate an approved request and move it to `fallback`.
  fn revert_request(
    &self,
    id: Uuid,
    fallback: RequestStatus,
    admin_notes: Option<String>,
    actor: String,
  ) -> impl Future<Output = Result<ModificationRequest, Self::Error>> + Send + '_;

  // ── Notifications ─────────────────────────────────────────────────────

  fn record_notification(
    &self,
    input: NewNotification,
  ) -> impl Future<Output = Result<Notification, Self::Error>> + Send + '_;

  /// Newest first, at most `limit`.
  fn list_notifications(
    &self,
    inbox: String,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<Notification>, Self::Error>> + Send + '_;

  fn unread_notifications(
    &self,
    inbox: String,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  /// Returns `false` if the notification was already read.
  fn mark_notification_read(
    &self,
    id: Uuid,
    inbox: String,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  // ── Audit log ─────────────────────────────────────────────────────────

  fn append_audit(
    &self,
    input: NewAuditRecord,
  ) -> impl Future<Output = Result<AuditRecord, Self::Error>> + Send + '_;

  /// Newest first, at most `limit`.
  fn list_audit(
    &self,
    limit: usize,
  ) -> impl Future<Output = Result<Vec<AuditRecord>, Self::Error>> + Send + '_;
}
