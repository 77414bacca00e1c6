//! Error types for `answerdesk-core`.
//!
//! Every error carries an [`ErrorKind`] so that callers can tell a business
//! rejection apart from an infrastructure fault without string matching.

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::request::RequestStatus;

/// Coarse classification used by every layer to pick a response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
  /// Missing or malformed input; nothing was mutated.
  Validation,
  /// The caller's role does not permit the operation.
  Authorization,
  /// A referenced tenant, entry, or request does not exist.
  NotFound,
  /// A quota, duplicate, or state-machine rule refused the operation.
  BusinessRule,
  /// Store or oracle unavailable; the caller may retry.
  Infrastructure,
}

impl ErrorKind {
  pub fn is_retryable(self) -> bool { matches!(self, Self::Infrastructure) }
}

/// Implemented by every error type that crosses a crate boundary.
pub trait Classify {
  fn kind(&self) -> ErrorKind;
  /// Stable snake_case identifier, safe to expose to API clients.
  fn code(&self) -> &'static str;
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid input: {0}")]
  Validation(String),

  #[error("forbidden: {0}")]
  Forbidden(String),

  #[error("tenant not found: {0}")]
  TenantNotFound(Uuid),

  #[error("no tenant with website key {0:?}")]
  TenantKeyNotFound(String),

  #[error("website key {0:?} is already registered")]
  DuplicateTenantKey(String),

  #[error("entry not found: {0}")]
  EntryNotFound(Uuid),

  #[error("request not found: {0}")]
  RequestNotFound(Uuid),

  #[error("notification not found: {0}")]
  NotificationNotFound(Uuid),

  #[error("subscription for tenant {0} has expired")]
  SubscriptionExpired(Uuid),

  #[error("question limit reached: {used}/{allowed}")]
  QuestionQuotaExceeded { used: u32, allowed: u32 },

  #[error("modification limit reached: {used}/{allowed}")]
  ModificationQuotaExceeded { used: u32, allowed: u32 },

  #[error("question already exists for this tenant: {0:?}")]
  DuplicateQuestion(String),

  #[error("request {id} is {status}, not pending")]
  NotPending { id: Uuid, status: RequestStatus },

  #[error("request {id} is {status}; only approved requests can be reverted")]
  NotRevertible { id: Uuid, status: RequestStatus },

  #[error("request {0} has already been reverted")]
  AlreadyReverted(Uuid),

  #[error("approved request {0} carries no snapshot to revert from")]
  MissingSnapshot(Uuid),

  #[error("counter would drop below zero")]
  CounterUnderflow,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) => ErrorKind::Validation,
      Self::Forbidden(_) => ErrorKind::Authorization,
      Self::TenantNotFound(_)
      | Self::TenantKeyNotFound(_)
      | Self::EntryNotFound(_)
      | Self::RequestNotFound(_)
      | Self::NotificationNotFound(_) => ErrorKind::NotFound,
      Self::DuplicateTenantKey(_)
      | Self::SubscriptionExpired(_)
      | Self::QuestionQuotaExceeded { .. }
      | Self::ModificationQuotaExceeded { .. }
      | Self::DuplicateQuestion(_)
      | Self::NotPending { .. }
      | Self::NotRevertible { .. }
      | Self::AlreadyReverted(_)
      | Self::MissingSnapshot(_)
      | Self::CounterUnderflow => ErrorKind::BusinessRule,
      Self::Serialization(_) => ErrorKind::Infrastructure,
    }
  }

  fn code(&self) -> &'static str {
    match self {
      Self::Validation(_) => "validation",
      Self::Forbidden(_) => "forbidden",
      Self::TenantNotFound(_) | Self::TenantKeyNotFound(_) => "tenant_not_found",
      Self::DuplicateTenantKey(_) => "duplicate_tenant_key",
      Self::EntryNotFound(_) => "entry_not_found",
      Self::RequestNotFound(_) => "request_not_found",
      Self::NotificationNotFound(_) => "notification_not_found",
      Self::SubscriptionExpired(_) => "subscription_expired",
      Self::QuestionQuotaExceeded { .. } => "question_quota_exceeded",
      Self::ModificationQuotaExceeded { .. } => "modification_quota_exceeded",
      Self::DuplicateQuestion(_) => "duplicate_question",
      Self::NotPending { .. } => "request_not_pending",
      Self::NotRevertible { .. } => "request_not_revertible",
      Self::AlreadyReverted(_) => "request_already_reverted",
      Self::MissingSnapshot(_) => "missing_snapshot",
      Self::CounterUnderflow => "counter_underflow",
      Self::Serialization(_) => "serialization",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
