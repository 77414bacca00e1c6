//! [`SqliteStore`], the SQLite implementation of [`QnaStore`].

use std::path::Path;

use chrono::{DateTime, SubsecRound as _, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use tracing::{debug, info};
use uuid::Uuid;

use answerdesk_core::{
  Error as CoreError,
  entry::{EntryContent, Provenance, QaEntry},
  notify::{AuditRecord, NewAuditRecord, NewNotification, Notification},
  plan::PlanTier,
  request::{
    Approval, Compensation, Decision, ModificationRequest, NewRequest, RequestAction,
    RequestStatus, plan_approval, plan_revert,
  },
  stats::{QuestionStats, RankedEntry, StatsSummary},
  store::{HitReceipt, QnaStore, QueuedRequest, RequestQuery, StatsQuery, TenantQuery},
  tenant::{NewTenant, PlanChange, SubscriptionWindow, Tenant, Usage},
};

use crate::{
  Error, Result,
  encode::{
    AUDIT_COLUMNS, NOTIFICATION_COLUMNS, RawAudit, RawEntry, RawNotification, RawRequest,
    RawStats, RawTenant, REQUEST_COLUMNS, STATS_COLUMNS, TENANT_COLUMNS, encode_dt,
    encode_uuid,
  },
  ops,
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// An answerdesk store backed by a single SQLite file.
///
/// Cloning is cheap: the inner connection handle is reference-counted, and
/// every clone talks to the same connection thread. That thread runs one
/// closure at a time, so each transaction below is serialised against every
/// other write.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Run `f` on the connection thread, flattening its domain result.
  async fn run<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
  {
    self.conn.call(move |conn| Ok(f(conn))).await?
  }

  /// Execute raw SQL; lets tests age windows and plant drifted rows.
  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str, id: Uuid) -> Result<usize> {
    self
      .run(move |conn| Ok(conn.execute(sql, params![encode_uuid(id)])?))
      .await
  }
}

/// The current time at the precision timestamps are stored with, so values
/// handed back to callers compare equal to what a later read returns.
fn timestamp() -> DateTime<Utc> { Utc::now().trunc_subsecs(6) }

// ─── Transactions ────────────────────────────────────────────────────────────

fn approve_in(
  conn: &Connection,
  request: &ModificationRequest,
  approval: &Approval,
  now: DateTime<Utc>,
) -> Result<()> {
  match approval {
    Approval::Add { entry_id, content } => {
      let entry = QaEntry {
        entry_id:   *entry_id,
        tenant_id:  request.tenant_id,
        question:   content.question.clone(),
        answer:     content.answer.clone(),
        provenance: Provenance::Request { request_id: request.request_id },
        created_at: now,
        updated_at: now,
      };
      ops::insert_entry(conn, &entry)?;
      ops::bump_questions(conn, request.tenant_id, 1)?;
      ops::bind_stats(conn, &entry, now)?;
    }
    Approval::Modify { entry, content } => {
      ops::overwrite_entry(conn, entry.entry_id, content, now)?;
      ops::bump_modifications(conn, request.tenant_id, 1)?;
    }
    Approval::Delete { entry } => {
      ops::unbind_stats(conn, entry.tenant_id, entry.entry_id, now)?;
      ops::remove_entry(conn, entry.entry_id)?;
      ops::bump_questions(conn, request.tenant_id, -1)?;
      ops::bump_modifications(conn, request.tenant_id, 1)?;
    }
  }
  Ok(())
}

fn compensate_in(
  conn: &Connection,
  request: &ModificationRequest,
  compensation: Compensation,
  now: DateTime<Utc>,
) -> Result<()> {
  let tenant_id = request.tenant_id;
  let owned_entry = |entry_id: Uuid| -> Result<QaEntry> {
    ops::find_entry(conn, entry_id)?
      .filter(|e| e.tenant_id == tenant_id)
      .ok_or_else(|| CoreError::EntryNotFound(entry_id).into())
  };

  match compensation {
    Compensation::RemoveAdded { entry_id } => {
      owned_entry(entry_id)?;
      ops::unbind_stats(conn, tenant_id, entry_id, now)?;
      ops::remove_entry(conn, entry_id)?;
      ops::bump_questions(conn, tenant_id, -1)?;
    }
    Compensation::RestoreContent { entry_id, prior } => {
      owned_entry(entry_id)?;
      if ops::has_duplicate(conn, tenant_id, &prior.question, Some(entry_id))? {
        return Err(CoreError::DuplicateQuestion(prior.question).into());
      }
      ops::overwrite_entry(conn, entry_id, &prior, now)?;
      ops::bump_modifications(conn, tenant_id, -1)?;
    }
    Compensation::Reinsert { entry, new_entry_id } => {
      if ops::has_duplicate(conn, tenant_id, &entry.question, None)? {
        return Err(CoreError::DuplicateQuestion(entry.question).into());
      }
      let restored = QaEntry {
        entry_id: new_entry_id,
        provenance: Provenance::Restored { request_id: request.request_id },
        updated_at: now,
        ..entry
      };
      ops::insert_entry(conn, &restored)?;
      ops::bind_stats(conn, &restored, now)?;
      ops::bump_questions(conn, tenant_id, 1)?;
      ops::bump_modifications(conn, tenant_id, -1)?;
    }
  }
  Ok(())
}

fn decide_in(
  conn: &mut Connection,
  id: Uuid,
  decision: Decision,
  admin_notes: Option<String>,
  actor: String,
  now: DateTime<Utc>,
) -> Result<ModificationRequest> {
  let tx = conn.transaction()?;
  let mut request = ops::load_request(&tx, id)?;

  match decision {
    Decision::Reject => {
      request.ensure_pending()?;
      request.status = RequestStatus::Rejected;
    }
    Decision::Approve => {
      // Counters are read inside the transaction that mutates them.
      let usage = ops::load_usage(&tx, request.tenant_id)?;
      let target = match request.action.target() {
        Some(entry_id) => ops::find_entry(&tx, entry_id)?,
        None => None,
      };
      let duplicate = match &request.action {
        RequestAction::Add { content } => {
          ops::has_duplicate(&tx, request.tenant_id, &content.question, None)?
        }
        RequestAction::Modify { entry_id, content } => {
          ops::has_duplicate(&tx, request.tenant_id, &content.question, Some(*entry_id))?
        }
        RequestAction::Delete { .. } => false,
      };

      let approval = plan_approval(&request, &usage, target.as_ref(), duplicate)?;
      approve_in(&tx, &request, &approval, now)?;
      request.snapshot = Some(approval.snapshot());
      request.status = RequestStatus::Approved;
    }
  }

  if admin_notes.is_some() {
    request.admin_notes = admin_notes;
  }
  request.decided_by = Some(actor);
  request.updated_at = now;
  ops::write_request_outcome(&tx, &request)?;
  tx.commit()?;
  Ok(request)
}

fn revert_in(
  conn: &mut Connection,
  id: Uuid,
  fallback: RequestStatus,
  admin_notes: Option<String>,
  actor: String,
  now: DateTime<Utc>,
) -> Result<ModificationRequest> {
  let tx = conn.transaction()?;
  let mut request = ops::load_request(&tx, id)?;
  let compensation = plan_revert(&request, fallback)?;
  compensate_in(&tx, &request, compensation, now)?;

  request.status = fallback;
  request.was_reverted = true;
  request.reverted_at = Some(now);
  if admin_notes.is_some() {
    request.admin_notes = admin_notes;
  }
  request.decided_by = Some(actor);
  request.updated_at = now;
  ops::write_request_outcome(&tx, &request)?;
  tx.commit()?;
  Ok(request)
}

/// Apply `delta` to one usage column, refusing to go negative.
fn adjust_in(
  conn: &mut Connection,
  tenant_id: Uuid,
  delta: i64,
  questions: bool,
) -> Result<Usage> {
  let tx = conn.transaction()?;
  let mut usage = ops::load_usage(&tx, tenant_id)?;
  let field = if questions {
    &mut usage.questions_used
  } else {
    &mut usage.modifications_used
  };
  let next = i64::from(*field) + delta;
  *field = u32::try_from(next).map_err(|_| CoreError::CounterUnderflow)?;

  let sql = if questions {
    "UPDATE tenants SET questions_used = ?2 WHERE tenant_id = ?1"
  } else {
    "UPDATE tenants SET modifications_used = ?2 WHERE tenant_id = ?1"
  };
  tx.execute(sql, params![encode_uuid(tenant_id), next])?;
  tx.commit()?;
  Ok(usage)
}

// ─── QnaStore impl ───────────────────────────────────────────────────────────

impl QnaStore for SqliteStore {
  type Error = Error;

  // ── Tenants ───────────────────────────────────────────────────────────────

  async fn create_tenant(&self, input: NewTenant) -> Result<Tenant> {
    input.validate()?;
    let now = timestamp();
    let plan = PlanTier::Trial;
    let limits = plan.limits();
    let tenant = Tenant {
      tenant_id:   Uuid::new_v4(),
      name:        input.name.trim().to_owned(),
      email:       input.email.trim().to_owned(),
      website_key: input.website_key.trim().to_owned(),
      plan,
      window:      SubscriptionWindow::starting(now, &limits),
      usage:       Usage::with_limits(&limits),
      is_active:   true,
      created_at:  now,
    };

    let row = tenant.clone();
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        if ops::find_tenant_by_key(&tx, &row.website_key)?.is_some() {
          return Err(CoreError::DuplicateTenantKey(row.website_key).into());
        }
        tx.execute(
          "INSERT INTO tenants (tenant_id, name, email, website_key, plan,
             subscription_start, subscription_end,
             questions_used, questions_allowed, hits_used, hits_allowed,
             modifications_used, modifications_allowed, is_active, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8, 0, ?9, 0, ?10, 1, ?11)",
          params![
            encode_uuid(row.tenant_id),
            row.name,
            row.email,
            row.website_key,
            row.plan.as_ref(),
            encode_dt(row.window.start),
            encode_dt(row.window.end),
            row.usage.questions_allowed,
            row.usage.hits_allowed,
            row.usage.modifications_allowed,
            encode_dt(row.created_at),
          ],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await?;

    info!(tenant_id = %tenant.tenant_id, website_key = %tenant.website_key, "tenant created");
    Ok(tenant)
  }

  async fn get_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
    self.run(move |conn| ops::find_tenant(conn, id)).await
  }

  async fn get_tenant_by_key<'a>(&'a self, website_key: &'a str) -> Result<Option<Tenant>> {
    let key = website_key.trim().to_owned();
    self.run(move |conn| ops::find_tenant_by_key(conn, &key)).await
  }

  async fn list_tenants(&self, query: TenantQuery) -> Result<Vec<Tenant>> {
    let search = query.search.map(|term| term.to_lowercase());
    // SQLite reads a negative LIMIT as unbounded.
    let limit = query.limit.map_or(-1, |n| n as i64);
    self
      .run(move |conn| {
        let sql = format!(
          "SELECT {TENANT_COLUMNS} FROM tenants
           WHERE ?1 IS NULL
              OR instr(lower(name), ?1) > 0
              OR instr(lower(email), ?1) > 0
              OR instr(lower(website_key), ?1) > 0
           ORDER BY created_at, rowid
           LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
          .query_map(params![search, limit], RawTenant::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawTenant::into_tenant).collect()
      })
      .await
  }

  async fn set_tenant_active(&self, id: Uuid, is_active: bool) -> Result<Tenant> {
    self
      .run(move |conn| {
        let changed = conn.execute(
          "UPDATE tenants SET is_active = ?2 WHERE tenant_id = ?1",
          params![encode_uuid(id), is_active],
        )?;
        if changed == 0 {
          return Err(CoreError::TenantNotFound(id).into());
        }
        ops::load_tenant(conn, id)
      })
      .await
  }

  async fn delete_tenant(&self, id: Uuid) -> Result<Tenant> {
    let tenant = self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let tenant = ops::load_tenant(&tx, id)?;
        let key = encode_uuid(id);
        let stats = tx.execute("DELETE FROM question_stats WHERE tenant_id = ?1", params![key])?;
        let requests =
          tx.execute("DELETE FROM modification_requests WHERE tenant_id = ?1", params![key])?;
        let entries = tx.execute("DELETE FROM entries WHERE tenant_id = ?1", params![key])?;
        tx.execute("DELETE FROM notifications WHERE recipient_id = ?1", params![key])?;
        tx.execute("DELETE FROM tenants WHERE tenant_id = ?1", params![key])?;
        tx.commit()?;
        debug!(tenant_id = %id, entries, stats, requests, "tenant rows removed");
        Ok(tenant)
      })
      .await?;

    info!(tenant_id = %id, website_key = %tenant.website_key, "tenant deleted");
    Ok(tenant)
  }

  // ── Usage ledger ──────────────────────────────────────────────────────────

  async fn consume_hit(&self, tenant_id: Uuid) -> Result<bool> {
    self
      .run(move |conn| {
        let changed = conn.execute(
          "UPDATE tenants SET hits_used = hits_used + 1
           WHERE tenant_id = ?1 AND hits_used < hits_allowed",
          params![encode_uuid(tenant_id)],
        )?;
        if changed == 0 {
          ops::load_tenant(conn, tenant_id)?;
          return Ok(false);
        }
        Ok(true)
      })
      .await
  }

  async fn adjust_questions_used(&self, tenant_id: Uuid, delta: i64) -> Result<Usage> {
    self.run(move |conn| adjust_in(conn, tenant_id, delta, true)).await
  }

  async fn adjust_modifications_used(&self, tenant_id: Uuid, delta: i64) -> Result<Usage> {
    self.run(move |conn| adjust_in(conn, tenant_id, delta, false)).await
  }

  async fn apply_plan(
    &self,
    tenant_id: Uuid,
    plan: PlanTier,
    is_new_cycle: bool,
  ) -> Result<(Tenant, PlanChange)> {
    let now = timestamp();
    let (tenant, change) = self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let mut tenant = ops::load_tenant(&tx, tenant_id)?;
        let change = tenant.plan_change(plan, is_new_cycle, now);
        tenant.apply(&change);
        ops::write_tenant_plan(&tx, &tenant)?;
        tx.commit()?;
        Ok((tenant, change))
      })
      .await?;

    info!(
      %tenant_id,
      from = %change.previous,
      to = %change.plan,
      reset_usage = change.reset_usage,
      end = %change.window.end,
      "plan applied"
    );
    Ok((tenant, change))
  }

  async fn sync_allowances(&self) -> Result<Vec<Uuid>> {
    let corrected = self
      .run(|conn| {
        let tx = conn.transaction()?;
        let tenants = {
          let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants");
          let mut stmt = tx.prepare(&sql)?;
          let raws = stmt
            .query_map([], RawTenant::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
          raws
            .into_iter()
            .map(RawTenant::into_tenant)
            .collect::<Result<Vec<_>>>()?
        };

        let mut corrected = Vec::new();
        for tenant in tenants {
          let limits = tenant.plan.limits();
          if tenant.usage.allowances_match(&limits) {
            continue;
          }
          tx.execute(
            "UPDATE tenants
             SET questions_allowed = ?2, hits_allowed = ?3, modifications_allowed = ?4
             WHERE tenant_id = ?1",
            params![
              encode_uuid(tenant.tenant_id),
              limits.questions_allowed,
              limits.hits_allowed,
              limits.modifications_allowed,
            ],
          )?;
          corrected.push(tenant.tenant_id);
        }
        tx.commit()?;
        Ok(corrected)
      })
      .await?;

    debug!(corrected = corrected.len(), "allowance sweep finished");
    Ok(corrected)
  }

  // ── Corpus ────────────────────────────────────────────────────────────────

  async fn list_entries(&self, tenant_id: Uuid) -> Result<Vec<QaEntry>> {
    self.run(move |conn| ops::list_entries(conn, tenant_id)).await
  }

  async fn get_entry(&self, entry_id: Uuid) -> Result<Option<QaEntry>> {
    self.run(move |conn| ops::find_entry(conn, entry_id)).await
  }

  async fn add_entry(&self, tenant_id: Uuid, content: EntryContent) -> Result<QaEntry> {
    content.validate()?;
    let now = timestamp();
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let tenant = ops::load_tenant(&tx, tenant_id)?;
        ops::ensure_window_open(&tenant, now)?;
        if ops::has_duplicate(&tx, tenant_id, &content.question, None)? {
          return Err(CoreError::DuplicateQuestion(content.question).into());
        }
        tenant.usage.check_question_room()?;

        let entry = QaEntry {
          entry_id: Uuid::new_v4(),
          tenant_id,
          question: content.question,
          answer: content.answer,
          provenance: Provenance::Admin,
          created_at: now,
          updated_at: now,
        };
        ops::insert_entry(&tx, &entry)?;
        ops::bump_questions(&tx, tenant_id, 1)?;
        ops::bind_stats(&tx, &entry, now)?;
        tx.commit()?;
        Ok(entry)
      })
      .await
  }

  async fn update_entry(&self, entry_id: Uuid, content: EntryContent) -> Result<QaEntry> {
    content.validate()?;
    let now = timestamp();
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let entry = ops::load_entry(&tx, entry_id)?;
        let tenant = ops::load_tenant(&tx, entry.tenant_id)?;
        ops::ensure_window_open(&tenant, now)?;
        if ops::has_duplicate(&tx, entry.tenant_id, &content.question, Some(entry_id))? {
          return Err(CoreError::DuplicateQuestion(content.question).into());
        }
        ops::overwrite_entry(&tx, entry_id, &content, now)?;
        let updated = ops::load_entry(&tx, entry_id)?;
        tx.commit()?;
        Ok(updated)
      })
      .await
  }

  async fn delete_entry(&self, entry_id: Uuid) -> Result<QaEntry> {
    let now = timestamp();
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let entry = ops::load_entry(&tx, entry_id)?;
        let tenant = ops::load_tenant(&tx, entry.tenant_id)?;
        ops::ensure_window_open(&tenant, now)?;
        ops::unbind_stats(&tx, entry.tenant_id, entry_id, now)?;
        ops::remove_entry(&tx, entry_id)?;
        ops::bump_questions(&tx, entry.tenant_id, -1)?;
        tx.commit()?;
        Ok(entry)
      })
      .await
  }

  // ── Query telemetry ───────────────────────────────────────────────────────

  async fn record_hit(&self, tenant_id: Uuid, entry_id: Uuid) -> Result<HitReceipt> {
    let now = timestamp();
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let Some(entry) = ops::find_entry(&tx, entry_id)?.filter(|e| e.tenant_id == tenant_id)
        else {
          return Ok(HitReceipt::EntryRemoved);
        };
        let consumed = tx.execute(
          "UPDATE tenants SET hits_used = hits_used + 1
           WHERE tenant_id = ?1 AND hits_used < hits_allowed",
          params![encode_uuid(tenant_id)],
        )?;
        if consumed == 0 {
          return Ok(HitReceipt::LimitReached);
        }
        ops::bump_bound(&tx, &entry, now)?;
        tx.commit()?;
        Ok(HitReceipt::Consumed)
      })
      .await
  }

  async fn record_unmatched(
    &self,
    tenant_id: Uuid,
    question_text: String,
  ) -> Result<QuestionStats> {
    let now = timestamp();
    self
      .run(move |conn| {
        let tx = conn.transaction()?;
        let stats = ops::upsert_unmatched(&tx, tenant_id, &question_text, now)?;
        tx.commit()?;
        Ok(stats)
      })
      .await
  }

  async fn list_stats(&self, query: StatsQuery) -> Result<Vec<QuestionStats>> {
    let tenant = query.tenant_id.map(encode_uuid);
    let bound = query.bound;
    self
      .run(move |conn| {
        let sql = format!(
          "SELECT {STATS_COLUMNS} FROM question_stats
           WHERE (?1 IS NULL OR tenant_id = ?1)
             AND (?2 IS NULL OR (question_id IS NOT NULL) = ?2)
           ORDER BY count DESC, updated_at DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
          .query_map(params![tenant, bound], RawStats::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawStats::into_stats).collect()
      })
      .await
  }

  async fn ranked_entries(&self, tenant_id: Uuid) -> Result<Vec<RankedEntry>> {
    self
      .run(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT e.entry_id, e.tenant_id, e.question, e.answer, e.provenance,
                  e.created_at, e.updated_at, s.count
           FROM entries e
           JOIN question_stats s ON s.question_id = e.entry_id
           WHERE e.tenant_id = ?1 AND s.count > 0
           ORDER BY s.count DESC, e.seq",
        )?;
        let rows = stmt
          .query_map(params![encode_uuid(tenant_id)], |row| {
            Ok((RawEntry::from_row(row)?, row.get::<_, u64>(7)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
          .into_iter()
          .map(|(raw, asked_count)| Ok(RankedEntry { entry: raw.into_entry()?, asked_count }))
          .collect()
      })
      .await
  }

  async fn stats_summary(&self, tenant_id: Uuid) -> Result<StatsSummary> {
    self
      .run(move |conn| {
        let tenant = ops::load_tenant(conn, tenant_id)?;
        let id = encode_uuid(tenant_id);
        let count = |sql: &str| -> Result<u64> {
          Ok(conn.query_row(sql, params![id], |r| r.get(0))?)
        };
        Ok(StatsSummary {
          valid_questions_count:     count("SELECT COUNT(*) FROM entries WHERE tenant_id = ?1")?,
          requested_questions_count: count(
            "SELECT COUNT(*) FROM question_stats WHERE tenant_id = ?1 AND question_id IS NULL",
          )?,
          pending_requests_count:    count(
            "SELECT COUNT(*) FROM modification_requests
             WHERE tenant_id = ?1 AND status = 'pending'",
          )?,
          hits_used:                 tenant.usage.hits_used,
        })
      })
      .await
  }

  // ── Modification requests ─────────────────────────────────────────────────

  async fn submit_request(&self, input: NewRequest) -> Result<ModificationRequest> {
    let now = timestamp();
    let request = ModificationRequest {
      request_id: Uuid::new_v4(),
      tenant_id: input.tenant_id,
      action: input.action,
      status: RequestStatus::Pending,
      admin_notes: None,
      snapshot: None,
      was_reverted: false,
      reverted_at: None,
      submitted_by: input.submitted_by,
      submitted_role: input.submitted_role,
      decided_by: None,
      created_at: now,
      updated_at: now,
    };

    let row = request.clone();
    self
      .run(move |conn| {
        ops::load_tenant(conn, row.tenant_id)?;
        let proposed = row.action.proposed();
        conn.execute(
          "INSERT INTO modification_requests
             (request_id, tenant_id, request_type, target_entry_id, proposed_question,
              proposed_answer, status, submitted_by, submitted_role, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
          params![
            encode_uuid(row.request_id),
            encode_uuid(row.tenant_id),
            row.action.request_type().as_ref(),
            row.action.target().map(encode_uuid),
            proposed.map(|c| c.question.as_str()),
            proposed.map(|c| c.answer.as_str()),
            row.status.as_ref(),
            row.submitted_by,
            row.submitted_role.as_ref(),
            encode_dt(row.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(request)
  }

  async fn get_request(&self, id: Uuid) -> Result<Option<ModificationRequest>> {
    self.run(move |conn| ops::find_request(conn, id)).await
  }

  async fn list_requests(&self, query: RequestQuery) -> Result<Vec<QueuedRequest>> {
    let tenant = query.tenant_id.map(encode_uuid);
    let status = query.status.map(|s| s.as_ref().to_owned());
    self
      .run(move |conn| {
        let sql = format!(
          "SELECT {REQUEST_COLUMNS},
             (SELECT COALESCE(SUM(s.count), 0) FROM question_stats s
              WHERE s.tenant_id = r.tenant_id
                AND (s.question_text = r.proposed_question OR s.question_id = r.target_entry_id))
           FROM modification_requests r
           WHERE (?1 IS NULL OR r.tenant_id = ?1) AND (?2 IS NULL OR r.status = ?2)
           ORDER BY r.created_at DESC, r.rowid DESC"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(params![tenant, status], |row| {
            Ok((RawRequest::from_row(row)?, row.get::<_, u64>(16)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        rows
          .into_iter()
          .map(|(raw, asked_count)| {
            Ok(QueuedRequest { request: raw.into_request()?, asked_count })
          })
          .collect()
      })
      .await
  }

  async fn decide_request(
    &self,
    id: Uuid,
    decision: Decision,
    admin_notes: Option<String>,
    actor: String,
  ) -> Result<ModificationRequest> {
    let now = timestamp();
    let request = self
      .run(move |conn| decide_in(conn, id, decision, admin_notes, actor, now))
      .await?;
    info!(
      request_id = %id,
      tenant_id = %request.tenant_id,
      status = %request.status,
      "request decided"
    );
    Ok(request)
  }

  async fn revert_request(
    &self,
    id: Uuid,
    fallback: RequestStatus,
    admin_notes: Option<String>,
    actor: String,
  ) -> Result<ModificationRequest> {
    let now = timestamp();
    let request = self
      .run(move |conn| revert_in(conn, id, fallback, admin_notes, actor, now))
      .await?;
    info!(request_id = %id, tenant_id = %request.tenant_id, "request reverted");
    Ok(request)
  }

  // ── Notifications ─────────────────────────────────────────────────────────

  async fn record_notification(&self, input: NewNotification) -> Result<Notification> {
    let notification = Notification {
      notification_id: Uuid::new_v4(),
      body:            input,
      is_read:         false,
      created_at:      timestamp(),
    };

    let row = notification.clone();
    self
      .run(move |conn| {
        conn.execute(
          "INSERT INTO notifications
             (notification_id, recipient_id, role, title, message, kind, payload, is_read, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)",
          params![
            encode_uuid(row.notification_id),
            row.body.recipient_id,
            row.body.role.as_ref(),
            row.body.title,
            row.body.message,
            row.body.kind,
            row.body.payload.to_string(),
            encode_dt(row.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(notification)
  }

  async fn list_notifications(&self, inbox: String, limit: usize) -> Result<Vec<Notification>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    self
      .run(move |conn| {
        let sql = format!(
          "SELECT {NOTIFICATION_COLUMNS} FROM notifications
           WHERE recipient_id = ?1 ORDER BY created_at DESC, rowid DESC LIMIT ?2"
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
          .query_map(params![inbox, limit], RawNotification::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawNotification::into_notification).collect()
      })
      .await
  }

  async fn unread_notifications(&self, inbox: String) -> Result<u64> {
    self
      .run(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*) FROM notifications WHERE recipient_id = ?1 AND is_read = 0",
          params![inbox],
          |r| r.get(0),
        )?)
      })
      .await
  }

  async fn mark_notification_read(&self, id: Uuid, inbox: String) -> Result<bool> {
    self
      .run(move |conn| {
        let id_str = encode_uuid(id);
        let changed = conn.execute(
          "UPDATE notifications SET is_read = 1
           WHERE notification_id = ?1 AND recipient_id = ?2 AND is_read = 0",
          params![id_str, inbox],
        )?;
        if changed > 0 {
          return Ok(true);
        }
        let exists = conn
          .query_row(
            "SELECT 1 FROM notifications WHERE notification_id = ?1 AND recipient_id = ?2",
            params![id_str, inbox],
            |_| Ok(()),
          )
          .optional()?;
        match exists {
          Some(()) => Ok(false),
          None => Err(CoreError::NotificationNotFound(id).into()),
        }
      })
      .await
  }

  // ── Audit log ─────────────────────────────────────────────────────────────

  async fn append_audit(&self, input: NewAuditRecord) -> Result<AuditRecord> {
    let record = AuditRecord { audit_id: Uuid::new_v4(), record: input };
    let details = record.record.details.to_string();

    let row = record.clone();
    self
      .run(move |conn| {
        conn.execute(
          "INSERT INTO audit_log (audit_id, actor, action, tenant_id, details, recorded_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          params![
            encode_uuid(row.audit_id),
            row.record.actor,
            row.record.action,
            row.record.tenant_id.map(encode_uuid),
            details,
            encode_dt(row.record.recorded_at),
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(record)
  }

  async fn list_audit(&self, limit: usize) -> Result<Vec<AuditRecord>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    self
      .run(move |conn| {
        let sql = format!(
          "SELECT {AUDIT_COLUMNS} FROM audit_log ORDER BY recorded_at DESC, rowid DESC LIMIT ?1"
        );
        let mut stmt = conn.prepare(&sql)?;
        let raws = stmt
          .query_map(params![limit], RawAudit::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        raws.into_iter().map(RawAudit::into_record).collect()
      })
      .await
  }
}
