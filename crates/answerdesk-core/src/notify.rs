//! Outbound collaborators: notifications and the audit log.
//!
//! Both are fire-and-forget from the caller's point of view. A delivery
//! failure is logged by the sink and never rolls back the state change that
//! triggered it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::identity::Role;

/// Shared inbox all operators read from.
pub const OPERATORS_INBOX: &str = "operators";

// ─── Notifications ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
  pub recipient_id: String,
  pub role:         Role,
  pub title:        String,
  pub message:      String,
  /// Machine-readable category, e.g. `question_request`.
  pub kind:         String,
  pub payload:      serde_json::Value,
}

impl NewNotification {
  pub fn to_operators(
    title: impl Into<String>,
    message: impl Into<String>,
    kind: &str,
    payload: serde_json::Value,
  ) -> Self {
    Self {
      recipient_id: OPERATORS_INBOX.to_owned(),
      role: Role::Operator,
      title: title.into(),
      message: message.into(),
      kind: kind.to_owned(),
      payload,
    }
  }

  pub fn to_tenant(
    tenant_id: Uuid,
    title: impl Into<String>,
    message: impl Into<String>,
    kind: &str,
    payload: serde_json::Value,
  ) -> Self {
    Self {
      recipient_id: tenant_id.to_string(),
      role: Role::Tenant,
      title: title.into(),
      message: message.into(),
      kind: kind.to_owned(),
      payload,
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
  pub notification_id: Uuid,
  #[serde(flatten)]
  pub body:            NewNotification,
  pub is_read:         bool,
  pub created_at:      DateTime<Utc>,
}

pub trait NotificationSink: Send + Sync {
  fn notify(&self, notification: NewNotification);
}

// ─── Audit log ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAuditRecord {
  pub actor:       String,
  pub action:      String,
  pub tenant_id:   Option<Uuid>,
  pub details:     serde_json::Value,
  /// When the audited action happened, not when the record was persisted.
  pub recorded_at: DateTime<Utc>,
}

impl NewAuditRecord {
  pub fn new(
    actor: impl Into<String>,
    action: &str,
    tenant_id: Option<Uuid>,
    details: serde_json::Value,
  ) -> Self {
    Self {
      actor: actor.into(),
      action: action.to_owned(),
      tenant_id,
      details,
      recorded_at: Utc::now(),
    }
  }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditRecord {
  pub audit_id: Uuid,
  #[serde(flatten)]
  pub record:   NewAuditRecord,
}

/// Append-only audit trail. Used as evidence, never for control flow.
pub trait AuditLog: Send + Sync {
  fn append(&self, record: NewAuditRecord);
}
