//! Synchronous building blocks run on the connection thread.
//!
//! Every function takes a plain `&Connection` so it can be called on either
//! a bare connection or an open [`rusqlite::Transaction`] (which derefs to
//! one). Callers that gate and mutate must hold a transaction across both.

use answerdesk_core::{
  Error as CoreError,
  entry::{EntryContent, QaEntry, question_key},
  request::ModificationRequest,
  stats::QuestionStats,
  tenant::{Tenant, Usage},
};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _, params};
use uuid::Uuid;

use crate::{
  Result,
  encode::{
    ENTRY_COLUMNS, RawEntry, RawRequest, RawStats, RawTenant, REQUEST_COLUMNS,
    STATS_COLUMNS, TENANT_COLUMNS, encode_dt, encode_uuid,
  },
};

// ─── Tenants ─────────────────────────────────────────────────────────────────

pub fn find_tenant(conn: &Connection, tenant_id: Uuid) -> Result<Option<Tenant>> {
  let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE tenant_id = ?1");
  conn
    .query_row(&sql, params![encode_uuid(tenant_id)], RawTenant::from_row)
    .optional()?
    .map(RawTenant::into_tenant)
    .transpose()
}

pub fn find_tenant_by_key(conn: &Connection, website_key: &str) -> Result<Option<Tenant>> {
  let sql = format!("SELECT {TENANT_COLUMNS} FROM tenants WHERE website_key = ?1");
  conn
    .query_row(&sql, params![website_key], RawTenant::from_row)
    .optional()?
    .map(RawTenant::into_tenant)
    .transpose()
}

pub fn load_tenant(conn: &Connection, tenant_id: Uuid) -> Result<Tenant> {
  find_tenant(conn, tenant_id)?.ok_or_else(|| CoreError::TenantNotFound(tenant_id).into())
}

/// Refuse corpus changes once the subscription window has lapsed.
pub fn ensure_window_open(tenant: &Tenant, now: DateTime<Utc>) -> Result<()> {
  if tenant.window.has_elapsed(now) {
    return Err(CoreError::SubscriptionExpired(tenant.tenant_id).into());
  }
  Ok(())
}

/// Persist the plan, window, and every usage field of `tenant`.
pub fn write_tenant_plan(conn: &Connection, tenant: &Tenant) -> Result<()> {
  let u = &tenant.usage;
  conn.execute(
    "UPDATE tenants SET plan = ?2, subscription_start = ?3, subscription_end = ?4,
       questions_used = ?5, questions_allowed = ?6, hits_used = ?7, hits_allowed = ?8,
       modifications_used = ?9, modifications_allowed = ?10
     WHERE tenant_id = ?1",
    params![
      encode_uuid(tenant.tenant_id),
      tenant.plan.as_ref(),
      encode_dt(tenant.window.start),
      encode_dt(tenant.window.end),
      u.questions_used,
      u.questions_allowed,
      u.hits_used,
      u.hits_allowed,
      u.modifications_used,
      u.modifications_allowed,
    ],
  )?;
  Ok(())
}

pub fn load_usage(conn: &Connection, tenant_id: Uuid) -> Result<Usage> {
  Ok(load_tenant(conn, tenant_id)?.usage)
}

/// Saturating adjustment of `questions_used`.
///
/// Live entries can outnumber `questions_used` after a trial-to-paid reset,
/// so a decrement floors at zero instead of failing.
pub fn bump_questions(conn: &Connection, tenant_id: Uuid, delta: i64) -> Result<()> {
  conn.execute(
    "UPDATE tenants SET questions_used = MAX(questions_used + ?2, 0) WHERE tenant_id = ?1",
    params![encode_uuid(tenant_id), delta],
  )?;
  Ok(())
}

/// Saturating adjustment of `modifications_used`.
pub fn bump_modifications(conn: &Connection, tenant_id: Uuid, delta: i64) -> Result<()> {
  conn.execute(
    "UPDATE tenants
     SET modifications_used = MAX(modifications_used + ?2, 0)
     WHERE tenant_id = ?1",
    params![encode_uuid(tenant_id), delta],
  )?;
  Ok(())
}

// ─── Entries ─────────────────────────────────────────────────────────────────

pub fn find_entry(conn: &Connection, entry_id: Uuid) -> Result<Option<QaEntry>> {
  let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE entry_id = ?1");
  conn
    .query_row(&sql, params![encode_uuid(entry_id)], RawEntry::from_row)
    .optional()?
    .map(RawEntry::into_entry)
    .transpose()
}

pub fn load_entry(conn: &Connection, entry_id: Uuid) -> Result<QaEntry> {
  find_entry(conn, entry_id)?.ok_or_else(|| CoreError::EntryNotFound(entry_id).into())
}

pub fn list_entries(conn: &Connection, tenant_id: Uuid) -> Result<Vec<QaEntry>> {
  let sql = format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE tenant_id = ?1 ORDER BY seq");
  let mut stmt = conn.prepare(&sql)?;
  let raws = stmt
    .query_map(params![encode_uuid(tenant_id)], RawEntry::from_row)?
    .collect::<rusqlite::Result<Vec<_>>>()?;
  raws.into_iter().map(RawEntry::into_entry).collect()
}

/// Whether the tenant already has an entry whose question matches
/// `question` after trimming and case folding, optionally ignoring one entry.
pub fn has_duplicate(
  conn: &Connection,
  tenant_id: Uuid,
  question: &str,
  exclude: Option<Uuid>,
) -> Result<bool> {
  let found = conn
    .query_row(
      "SELECT 1 FROM entries
       WHERE tenant_id = ?1 AND question_key = ?2 AND (?3 IS NULL OR entry_id <> ?3)
       LIMIT 1",
      params![encode_uuid(tenant_id), question_key(question), exclude.map(encode_uuid)],
      |_| Ok(()),
    )
    .optional()?;
  Ok(found.is_some())
}

pub fn insert_entry(conn: &Connection, entry: &QaEntry) -> Result<()> {
  conn.execute(
    "INSERT INTO entries
       (entry_id, tenant_id, question, question_key, answer, provenance, created_at, updated_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
    params![
      encode_uuid(entry.entry_id),
      encode_uuid(entry.tenant_id),
      entry.question,
      question_key(&entry.question),
      entry.answer,
      serde_json::to_string(&entry.provenance)?,
      encode_dt(entry.created_at),
      encode_dt(entry.updated_at),
    ],
  )?;
  Ok(())
}

/// Overwrite an entry's question and answer in place.
pub fn overwrite_entry(
  conn: &Connection,
  entry_id: Uuid,
  content: &EntryContent,
  now: DateTime<Utc>,
) -> Result<()> {
  let changed = conn.execute(
    "UPDATE entries SET question = ?2, question_key = ?3, answer = ?4, updated_at = ?5
     WHERE entry_id = ?1",
    params![
      encode_uuid(entry_id),
      content.question,
      question_key(&content.question),
      content.answer,
      encode_dt(now),
    ],
  )?;
  if changed == 0 {
    return Err(CoreError::EntryNotFound(entry_id).into());
  }
  // Bound stats rows carry the entry's current question text.
  conn.execute(
    "UPDATE question_stats SET question_text = ?2 WHERE question_id = ?1",
    params![encode_uuid(entry_id), content.question],
  )?;
  Ok(())
}

pub fn remove_entry(conn: &Connection, entry_id: Uuid) -> Result<()> {
  let changed = conn.execute(
    "DELETE FROM entries WHERE entry_id = ?1",
    params![encode_uuid(entry_id)],
  )?;
  if changed == 0 {
    return Err(CoreError::EntryNotFound(entry_id).into());
  }
  Ok(())
}

// ─── Stats ───────────────────────────────────────────────────────────────────

fn find_unbound(conn: &Connection, tenant_id: Uuid, text: &str) -> Result<Option<QuestionStats>> {
  let sql = format!(
    "SELECT {STATS_COLUMNS} FROM question_stats
     WHERE tenant_id = ?1 AND question_id IS NULL AND question_text = ?2"
  );
  conn
    .query_row(&sql, params![encode_uuid(tenant_id), text], RawStats::from_row)
    .optional()?
    .map(RawStats::into_stats)
    .transpose()
}

/// Increment (or create) the unbound row for `text`.
pub fn upsert_unmatched(
  conn: &Connection,
  tenant_id: Uuid,
  text: &str,
  now: DateTime<Utc>,
) -> Result<QuestionStats> {
  let updated = conn.execute(
    "UPDATE question_stats SET count = count + 1, updated_at = ?3
     WHERE tenant_id = ?1 AND question_id IS NULL AND question_text = ?2",
    params![encode_uuid(tenant_id), text, encode_dt(now)],
  )?;
  if updated == 0 {
    conn.execute(
      "INSERT INTO question_stats
         (stats_id, tenant_id, question_id, question_text, count, created_at, updated_at)
       VALUES (?1, ?2, NULL, ?3, 1, ?4, ?4)",
      params![encode_uuid(Uuid::new_v4()), encode_uuid(tenant_id), text, encode_dt(now)],
    )?;
  }
  find_unbound(conn, tenant_id, text)?
    .ok_or_else(|| crate::Error::Decode(format!("stats row for {text:?} vanished")))
}

/// Increment (or create) the bound row for `entry`.
pub fn bump_bound(conn: &Connection, entry: &QaEntry, now: DateTime<Utc>) -> Result<()> {
  let updated = conn.execute(
    "UPDATE question_stats SET count = count + 1, question_text = ?3, updated_at = ?4
     WHERE tenant_id = ?1 AND question_id = ?2",
    params![
      encode_uuid(entry.tenant_id),
      encode_uuid(entry.entry_id),
      entry.question,
      encode_dt(now),
    ],
  )?;
  if updated == 0 {
    conn.execute(
      "INSERT INTO question_stats
         (stats_id, tenant_id, question_id, question_text, count, created_at, updated_at)
       VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
      params![
        encode_uuid(Uuid::new_v4()),
        encode_uuid(entry.tenant_id),
        encode_uuid(entry.entry_id),
        entry.question,
        encode_dt(now),
      ],
    )?;
  }
  Ok(())
}

/// Attach the unbound row whose text is exactly `entry.question` to `entry`.
pub fn bind_stats(conn: &Connection, entry: &QaEntry, now: DateTime<Utc>) -> Result<bool> {
  let bound = conn.execute(
    "UPDATE question_stats SET question_id = ?3, updated_at = ?4
     WHERE tenant_id = ?1 AND question_id IS NULL AND question_text = ?2",
    params![
      encode_uuid(entry.tenant_id),
      entry.question,
      encode_uuid(entry.entry_id),
      encode_dt(now),
    ],
  )?;
  Ok(bound > 0)
}

/// Strip `entry_id` from its bound row, folding the count into an existing
/// unbound row with the same text when there is one.
pub fn unbind_stats(
  conn: &Connection,
  tenant_id: Uuid,
  entry_id: Uuid,
  now: DateTime<Utc>,
) -> Result<()> {
  let sql = format!(
    "SELECT {STATS_COLUMNS} FROM question_stats WHERE tenant_id = ?1 AND question_id = ?2"
  );
  let Some(bound) = conn
    .query_row(&sql, params![encode_uuid(tenant_id), encode_uuid(entry_id)], RawStats::from_row)
    .optional()?
    .map(RawStats::into_stats)
    .transpose()?
  else {
    return Ok(());
  };

  match find_unbound(conn, tenant_id, &bound.question_text)? {
    Some(unbound) => {
      conn.execute(
        "UPDATE question_stats SET count = count + ?2, updated_at = ?3 WHERE stats_id = ?1",
        params![encode_uuid(unbound.stats_id), bound.count, encode_dt(now)],
      )?;
      conn.execute(
        "DELETE FROM question_stats WHERE stats_id = ?1",
        params![encode_uuid(bound.stats_id)],
      )?;
    }
    None => {
      conn.execute(
        "UPDATE question_stats SET question_id = NULL, updated_at = ?2 WHERE stats_id = ?1",
        params![encode_uuid(bound.stats_id), encode_dt(now)],
      )?;
    }
  }
  Ok(())
}

// ─── Requests ────────────────────────────────────────────────────────────────

pub fn find_request(conn: &Connection, request_id: Uuid) -> Result<Option<ModificationRequest>> {
  let sql = format!("SELECT {REQUEST_COLUMNS} FROM modification_requests WHERE request_id = ?1");
  conn
    .query_row(&sql, params![encode_uuid(request_id)], RawRequest::from_row)
    .optional()?
    .map(RawRequest::into_request)
    .transpose()
}

pub fn load_request(conn: &Connection, request_id: Uuid) -> Result<ModificationRequest> {
  find_request(conn, request_id)?.ok_or_else(|| CoreError::RequestNotFound(request_id).into())
}

/// Persist the mutable decision fields of `request`.
pub fn write_request_outcome(conn: &Connection, request: &ModificationRequest) -> Result<()> {
  let snapshot = request.snapshot.as_ref().map(serde_json::to_string).transpose()?;
  conn.execute(
    "UPDATE modification_requests
     SET status = ?2, admin_notes = ?3, snapshot = ?4, was_reverted = ?5,
         reverted_at = ?6, decided_by = ?7, updated_at = ?8
     WHERE request_id = ?1",
    params![
      encode_uuid(request.request_id),
      request.status.as_ref(),
      request.admin_notes,
      snapshot,
      request.was_reverted,
      request.reverted_at.map(encode_dt),
      request.decided_by,
      encode_dt(request.updated_at),
    ],
  )?;
  Ok(())
}
