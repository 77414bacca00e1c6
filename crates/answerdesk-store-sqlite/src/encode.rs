//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microsecond
//! precision, `Z` suffix) so that lexical order is chronological. Structured
//! fields (provenance, snapshots, payloads) are stored as compact JSON. UUIDs
//! are stored as hyphenated lowercase strings.

use answerdesk_core::{
  entry::{Provenance, QaEntry},
  identity::Role,
  notify::{AuditRecord, NewAuditRecord, NewNotification, Notification},
  plan::PlanTier,
  request::{ModificationRequest, RequestAction, RequestStatus, RequestType, Snapshot},
  stats::QuestionStats,
  tenant::{SubscriptionWindow, Tenant, Usage},
};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_enum<T: std::str::FromStr>(what: &str, s: &str) -> Result<T> {
  s.parse()
    .map_err(|_| Error::Decode(format!("unknown {what}: {s:?}")))
}

// ─── Tenants ─────────────────────────────────────────────────────────────────

pub const TENANT_COLUMNS: &str = "tenant_id, name, email, website_key, plan,
  subscription_start, subscription_end,
  questions_used, questions_allowed, hits_used, hits_allowed,
  modifications_used, modifications_allowed, is_active, created_at";

/// Raw strings read directly from a `tenants` row.
pub struct RawTenant {
  pub tenant_id:   String,
  pub name:        String,
  pub email:       String,
  pub website_key: String,
  pub plan:        String,
  pub start:       String,
  pub end:         String,
  pub usage:       Usage,
  pub is_active:   bool,
  pub created_at:  String,
}

impl RawTenant {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      tenant_id:   row.get(0)?,
      name:        row.get(1)?,
      email:       row.get(2)?,
      website_key: row.get(3)?,
      plan:        row.get(4)?,
      start:       row.get(5)?,
      end:         row.get(6)?,
      usage:       Usage {
        questions_used:        row.get(7)?,
        questions_allowed:     row.get(8)?,
        hits_used:             row.get(9)?,
        hits_allowed:          row.get(10)?,
        modifications_used:    row.get(11)?,
        modifications_allowed: row.get(12)?,
      },
      is_active:   row.get(13)?,
      created_at:  row.get(14)?,
    })
  }

  pub fn into_tenant(self) -> Result<Tenant> {
    Ok(Tenant {
      tenant_id:   decode_uuid(&self.tenant_id)?,
      name:        self.name,
      email:       self.email,
      website_key: self.website_key,
      // Unknown tags degrade to trial, matching the plan catalog.
      plan:        PlanTier::from_tag(&self.plan),
      window:      SubscriptionWindow {
        start: decode_dt(&self.start)?,
        end:   decode_dt(&self.end)?,
      },
      usage:       self.usage,
      is_active:   self.is_active,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

// ─── Entries ─────────────────────────────────────────────────────────────────

pub const ENTRY_COLUMNS: &str =
  "entry_id, tenant_id, question, answer, provenance, created_at, updated_at";

pub struct RawEntry {
  pub entry_id:   String,
  pub tenant_id:  String,
  pub question:   String,
  pub answer:     String,
  pub provenance: String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawEntry {
  /// Reads the seven [`ENTRY_COLUMNS`] starting at column `at`.
  pub fn from_row_at(row: &Row<'_>, at: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      entry_id:   row.get(at)?,
      tenant_id:  row.get(at + 1)?,
      question:   row.get(at + 2)?,
      answer:     row.get(at + 3)?,
      provenance: row.get(at + 4)?,
      created_at: row.get(at + 5)?,
      updated_at: row.get(at + 6)?,
    })
  }

  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> { Self::from_row_at(row, 0) }

  pub fn into_entry(self) -> Result<QaEntry> {
    let provenance: Provenance = serde_json::from_str(&self.provenance)?;
    Ok(QaEntry {
      entry_id: decode_uuid(&self.entry_id)?,
      tenant_id: decode_uuid(&self.tenant_id)?,
      question: self.question,
      answer: self.answer,
      provenance,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Stats ───────────────────────────────────────────────────────────────────

pub const STATS_COLUMNS: &str =
  "stats_id, tenant_id, question_id, question_text, count, created_at, updated_at";

pub struct RawStats {
  pub stats_id:      String,
  pub tenant_id:     String,
  pub question_id:   Option<String>,
  pub question_text: String,
  pub count:         u64,
  pub created_at:    String,
  pub updated_at:    String,
}

impl RawStats {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      stats_id:      row.get(0)?,
      tenant_id:     row.get(1)?,
      question_id:   row.get(2)?,
      question_text: row.get(3)?,
      count:         row.get(4)?,
      created_at:    row.get(5)?,
      updated_at:    row.get(6)?,
    })
  }

  pub fn into_stats(self) -> Result<QuestionStats> {
    Ok(QuestionStats {
      stats_id:      decode_uuid(&self.stats_id)?,
      tenant_id:     decode_uuid(&self.tenant_id)?,
      question_id:   self.question_id.as_deref().map(decode_uuid).transpose()?,
      question_text: self.question_text,
      count:         self.count,
      created_at:    decode_dt(&self.created_at)?,
      updated_at:    decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Requests ────────────────────────────────────────────────────────────────

pub const REQUEST_COLUMNS: &str = "request_id, tenant_id, request_type, target_entry_id,
  proposed_question, proposed_answer, status, admin_notes, snapshot,
  was_reverted, reverted_at, submitted_by, submitted_role, decided_by,
  created_at, updated_at";

pub struct RawRequest {
  pub request_id:        String,
  pub tenant_id:         String,
  pub request_type:      String,
  pub target_entry_id:   Option<String>,
  pub proposed_question: Option<String>,
  pub proposed_answer:   Option<String>,
  pub status:            String,
  pub admin_notes:       Option<String>,
  pub snapshot:          Option<String>,
  pub was_reverted:      bool,
  pub reverted_at:       Option<String>,
  pub submitted_by:      String,
  pub submitted_role:    String,
  pub decided_by:        Option<String>,
  pub created_at:        String,
  pub updated_at:        String,
}

impl RawRequest {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      request_id:        row.get(0)?,
      tenant_id:         row.get(1)?,
      request_type:      row.get(2)?,
      target_entry_id:   row.get(3)?,
      proposed_question: row.get(4)?,
      proposed_answer:   row.get(5)?,
      status:            row.get(6)?,
      admin_notes:       row.get(7)?,
      snapshot:          row.get(8)?,
      was_reverted:      row.get(9)?,
      reverted_at:       row.get(10)?,
      submitted_by:      row.get(11)?,
      submitted_role:    row.get(12)?,
      decided_by:        row.get(13)?,
      created_at:        row.get(14)?,
      updated_at:        row.get(15)?,
    })
  }

  pub fn into_request(self) -> Result<ModificationRequest> {
    let request_type: RequestType = decode_enum("request type", &self.request_type)?;
    let target = self.target_entry_id.as_deref().map(decode_uuid).transpose()?;
    let action = RequestAction::from_parts(
      request_type,
      target,
      self.proposed_question,
      self.proposed_answer,
    )
    .map_err(|e| Error::Decode(e.to_string()))?;
    let snapshot: Option<Snapshot> = self
      .snapshot
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(ModificationRequest {
      request_id: decode_uuid(&self.request_id)?,
      tenant_id: decode_uuid(&self.tenant_id)?,
      action,
      status: decode_enum::<RequestStatus>("request status", &self.status)?,
      admin_notes: self.admin_notes,
      snapshot,
      was_reverted: self.was_reverted,
      reverted_at: self.reverted_at.as_deref().map(decode_dt).transpose()?,
      submitted_by: self.submitted_by,
      submitted_role: decode_enum::<Role>("role", &self.submitted_role)?,
      decided_by: self.decided_by,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

// ─── Notifications ───────────────────────────────────────────────────────────

pub const NOTIFICATION_COLUMNS: &str =
  "notification_id, recipient_id, role, title, message, kind, payload, is_read, created_at";

pub struct RawNotification {
  pub notification_id: String,
  pub recipient_id:    String,
  pub role:            String,
  pub title:           String,
  pub message:         String,
  pub kind:            String,
  pub payload:         String,
  pub is_read:         bool,
  pub created_at:      String,
}

impl RawNotification {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      notification_id: row.get(0)?,
      recipient_id:    row.get(1)?,
      role:            row.get(2)?,
      title:           row.get(3)?,
      message:         row.get(4)?,
      kind:            row.get(5)?,
      payload:         row.get(6)?,
      is_read:         row.get(7)?,
      created_at:      row.get(8)?,
    })
  }

  pub fn into_notification(self) -> Result<Notification> {
    Ok(Notification {
      notification_id: decode_uuid(&self.notification_id)?,
      body:            NewNotification {
        recipient_id: self.recipient_id,
        role:         decode_enum("role", &self.role)?,
        title:        self.title,
        message:      self.message,
        kind:         self.kind,
        payload:      serde_json::from_str(&self.payload)?,
      },
      is_read:         self.is_read,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

// ─── Audit ───────────────────────────────────────────────────────────────────

pub const AUDIT_COLUMNS: &str = "audit_id, actor, action, tenant_id, details, recorded_at";

pub struct RawAudit {
  pub audit_id:    String,
  pub actor:       String,
  pub action:      String,
  pub tenant_id:   Option<String>,
  pub details:     String,
  pub recorded_at: String,
}

impl RawAudit {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      audit_id:    row.get(0)?,
      actor:       row.get(1)?,
      action:      row.get(2)?,
      tenant_id:   row.get(3)?,
      details:     row.get(4)?,
      recorded_at: row.get(5)?,
    })
  }

  pub fn into_record(self) -> Result<AuditRecord> {
    Ok(AuditRecord {
      audit_id: decode_uuid(&self.audit_id)?,
      record:   NewAuditRecord {
        actor:       self.actor,
        action:      self.action,
        tenant_id:   self.tenant_id.as_deref().map(decode_uuid).transpose()?,
        details:     serde_json::from_str(&self.details)?,
        recorded_at: decode_dt(&self.recorded_at)?,
      },
    })
  }
}
