//! Modification requests and the rules of their state machine.
//!
//! ```text
//! pending ──approve──▶ approved ──revert──▶ rejected (was_reverted)
//!    └─────reject────▶ rejected
//! ```
//!
//! The functions here decide *what* an approval or revert does; the store
//! executes the resulting plan inside a single transaction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};
use uuid::Uuid;

use crate::{
  Error, Result,
  entry::{EntryContent, QaEntry},
  identity::Role,
  tenant::Usage,
};

// ─── Discriminants ───────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestType {
  Add,
  Modify,
  Delete,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, AsRefStr, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RequestStatus {
  Pending,
  Approved,
  Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
  Approve,
  Reject,
}

// ─── Proposed action ─────────────────────────────────────────────────────────

/// What a request proposes. Modify and delete always name their target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "request_type", rename_all = "lowercase")]
pub enum RequestAction {
  Add { content: EntryContent },
  Modify { entry_id: Uuid, content: EntryContent },
  Delete { entry_id: Uuid },
}

impl RequestAction {
  /// Assemble and validate an action from loosely-shaped parts.
  pub fn from_parts(
    request_type: RequestType,
    target: Option<Uuid>,
    question: Option<String>,
    answer: Option<String>,
  ) -> Result<Self> {
    let missing_target = || {
      Error::Validation(format!("{request_type} requests require target_entry_id"))
    };
    let content = || {
      EntryContent::new(question.clone().unwrap_or_default(), answer.clone().unwrap_or_default())
    };

    match request_type {
      RequestType::Add => Ok(Self::Add { content: content()? }),
      RequestType::Modify => Ok(Self::Modify {
        entry_id: target.ok_or_else(missing_target)?,
        content:  content()?,
      }),
      RequestType::Delete => Ok(Self::Delete {
        entry_id: target.ok_or_else(missing_target)?,
      }),
    }
  }

  pub fn request_type(&self) -> RequestType {
    match self {
      Self::Add { .. } => RequestType::Add,
      Self::Modify { .. } => RequestType::Modify,
      Self::Delete { .. } => RequestType::Delete,
    }
  }

  pub fn target(&self) -> Option<Uuid> {
    match self {
      Self::Add { .. } => None,
      Self::Modify { entry_id, .. } | Self::Delete { entry_id } => Some(*entry_id),
    }
  }

  pub fn proposed(&self) -> Option<&EntryContent> {
    match self {
      Self::Add { content } | Self::Modify { content, .. } => Some(content),
      Self::Delete { .. } => None,
    }
  }
}

// ─── Snapshot ────────────────────────────────────────────────────────────────

/// Prior state captured at approval time; required to revert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Snapshot {
  /// The entry created by an approved add.
  Added { entry_id: Uuid },
  /// The content an approved modify overwrote.
  Modified { entry_id: Uuid, prior: EntryContent },
  /// The full entry an approved delete removed.
  Deleted { entry: QaEntry },
}

// ─── Request ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModificationRequest {
  pub request_id:     Uuid,
  pub tenant_id:      Uuid,
  #[serde(flatten)]
  pub action:         RequestAction,
  pub status:         RequestStatus,
  pub admin_notes:    Option<String>,
  pub snapshot:       Option<Snapshot>,
  pub was_reverted:   bool,
  pub reverted_at:    Option<DateTime<Utc>>,
  pub submitted_by:   String,
  pub submitted_role: Role,
  pub decided_by:     Option<String>,
  pub created_at:     DateTime<Utc>,
  pub updated_at:     DateTime<Utc>,
}

/// Input to [`crate::store::QnaStore::submit_request`].
#[derive(Debug, Clone)]
pub struct NewRequest {
  pub tenant_id:      Uuid,
  pub action:         RequestAction,
  pub submitted_by:   String,
  pub submitted_role: Role,
}

impl ModificationRequest {
  pub fn ensure_pending(&self) -> Result<()> {
    if self.status != RequestStatus::Pending {
      return Err(Error::NotPending { id: self.request_id, status: self.status });
    }
    Ok(())
  }
}

// ─── Approval planning ───────────────────────────────────────────────────────

/// The corpus/ledger effect of approving a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Approval {
  /// Insert a new entry with a pre-assigned id; `questions_used += 1`.
  Add { entry_id: Uuid, content: EntryContent },
  /// Overwrite `entry` in place; `modifications_used += 1`.
  Modify { entry: QaEntry, content: EntryContent },
  /// Remove `entry`; `questions_used -= 1`, `modifications_used += 1`.
  Delete { entry: QaEntry },
}

impl Approval {
  pub fn snapshot(&self) -> Snapshot {
    match self {
      Self::Add { entry_id, .. } => Snapshot::Added { entry_id: *entry_id },
      Self::Modify { entry, .. } => Snapshot::Modified {
        entry_id: entry.entry_id,
        prior:    EntryContent {
          question: entry.question.clone(),
          answer:   entry.answer.clone(),
        },
      },
      Self::Delete { entry } => Snapshot::Deleted { entry: entry.clone() },
    }
  }
}

/// Decide whether `request` may be approved against the freshly-read `usage`.
///
/// `target` is the request's target entry as currently stored for the
/// request's tenant (`None` if absent); `duplicate` reports whether the
/// proposed question already exists in the tenant's corpus, ignoring the
/// target entry itself for a modify.
pub fn plan_approval(
  request: &ModificationRequest,
  usage: &Usage,
  target: Option<&QaEntry>,
  duplicate: bool,
) -> Result<Approval> {
  request.ensure_pending()?;

  match &request.action {
    RequestAction::Add { content } => {
      usage.check_question_room()?;
      if duplicate {
        return Err(Error::DuplicateQuestion(content.question.clone()));
      }
      Ok(Approval::Add { entry_id: Uuid::new_v4(), content: content.clone() })
    }
    RequestAction::Modify { entry_id, content } => {
      let entry = target
        .filter(|e| e.tenant_id == request.tenant_id)
        .ok_or(Error::EntryNotFound(*entry_id))?;
      usage.check_modification_room()?;
      if duplicate {
        return Err(Error::DuplicateQuestion(content.question.clone()));
      }
      Ok(Approval::Modify { entry: entry.clone(), content: content.clone() })
    }
    RequestAction::Delete { entry_id } => {
      let entry = target
        .filter(|e| e.tenant_id == request.tenant_id)
        .ok_or(Error::EntryNotFound(*entry_id))?;
      usage.check_modification_room()?;
      Ok(Approval::Delete { entry: entry.clone() })
    }
  }
}

// ─── Revert planning ─────────────────────────────────────────────────────────

/// The compensating effect of reverting an approved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compensation {
  /// Delete the entry an add created; `questions_used -= 1`; unbind stats.
  RemoveAdded { entry_id: Uuid },
  /// Put the modified entry's prior content back.
  RestoreContent { entry_id: Uuid, prior: EntryContent },
  /// Re-insert a deleted entry under a new id; `questions_used += 1`;
  /// re-bind stats by text.
  Reinsert { entry: QaEntry, new_entry_id: Uuid },
}

/// Decide whether `request` may be reverted, landing on `fallback`.
pub fn plan_revert(
  request: &ModificationRequest,
  fallback: RequestStatus,
) -> Result<Compensation> {
  if fallback != RequestStatus::Rejected {
    return Err(Error::Validation(format!(
      "a reverted request can only become rejected, not {fallback}"
    )));
  }
  if request.was_reverted {
    return Err(Error::AlreadyReverted(request.request_id));
  }
  if request.status != RequestStatus::Approved {
    return Err(Error::NotRevertible {
      id:     request.request_id,
      status: request.status,
    });
  }

  let snapshot = request
    .snapshot
    .as_ref()
    .ok_or(Error::MissingSnapshot(request.request_id))?;

  Ok(match snapshot {
    Snapshot::Added { entry_id } => Compensation::RemoveAdded { entry_id: *entry_id },
    Snapshot::Modified { entry_id, prior } => Compensation::RestoreContent {
      entry_id: *entry_id,
      prior:    prior.clone(),
    },
    Snapshot::Deleted { entry } => Compensation::Reinsert {
      entry:        entry.clone(),
      new_entry_id: Uuid::new_v4(),
    },
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::entry::Provenance;

  fn request(action: RequestAction) -> ModificationRequest {
    let now = Utc::now();
    ModificationRequest {
      request_id: Uuid::new_v4(),
      tenant_id: Uuid::new_v4(),
      action,
      status: RequestStatus::Pending,
      admin_notes: None,
      snapshot: None,
      was_reverted: false,
      reverted_at: None,
      submitted_by: "acme-owner".into(),
      submitted_role: Role::Tenant,
      decided_by: None,
      created_at: now,
      updated_at: now,
    }
  }

  fn entry_for(req: &ModificationRequest, id: Uuid) -> QaEntry {
    let now = Utc::now();
    QaEntry {
      entry_id:   id,
      tenant_id:  req.tenant_id,
      question:   "Old question?".into(),
      answer:     "Old answer.".into(),
      provenance: Provenance::Admin,
      created_at: now,
      updated_at: now,
    }
  }

  fn roomy() -> Usage {
    Usage {
      questions_allowed: 10,
      modifications_allowed: 10,
      hits_allowed: 10,
      ..Usage::default()
    }
  }

  fn add() -> RequestAction {
    RequestAction::Add { content: EntryContent::new("Hours?", "9 to 5.").unwrap() }
  }

  #[test]
  fn from_parts_requires_target_for_modify_and_delete() {
    let err = RequestAction::from_parts(RequestType::Delete, None, None, None);
    assert!(matches!(err, Err(Error::Validation(_))));

    let ok = RequestAction::from_parts(RequestType::Delete, Some(Uuid::nil()), None, None);
    assert_eq!(ok.unwrap(), RequestAction::Delete { entry_id: Uuid::nil() });
  }

  #[test]
  fn from_parts_requires_text_for_add() {
    let err = RequestAction::from_parts(RequestType::Add, None, Some("q".into()), None);
    assert!(matches!(err, Err(Error::Validation(_))));
  }

  #[test]
  fn add_at_quota_is_rejected_before_duplicate_check() {
    let req = request(add());
    let usage = Usage { questions_used: 5, questions_allowed: 5, ..roomy() };
    assert!(matches!(
      plan_approval(&req, &usage, None, true),
      Err(Error::QuestionQuotaExceeded { used: 5, allowed: 5 })
    ));
  }

  #[test]
  fn duplicate_add_is_rejected() {
    let req = request(add());
    assert!(matches!(
      plan_approval(&req, &roomy(), None, true),
      Err(Error::DuplicateQuestion(_))
    ));
  }

  #[test]
  fn modify_snapshots_prior_content() {
    let target = Uuid::new_v4();
    let req = request(RequestAction::Modify {
      entry_id: target,
      content:  EntryContent::new("New?", "New.").unwrap(),
    });
    let entry = entry_for(&req, target);
    let approval = plan_approval(&req, &roomy(), Some(&entry), false).unwrap();
    assert_eq!(approval.snapshot(), Snapshot::Modified {
      entry_id: target,
      prior:    EntryContent::new("Old question?", "Old answer.").unwrap(),
    });
  }

  #[test]
  fn modify_onto_an_existing_question_is_rejected() {
    let target = Uuid::new_v4();
    let req = request(RequestAction::Modify {
      entry_id: target,
      content:  EntryContent::new("Hours?", "Always.").unwrap(),
    });
    let entry = entry_for(&req, target);
    assert!(matches!(
      plan_approval(&req, &roomy(), Some(&entry), true),
      Err(Error::DuplicateQuestion(q)) if q == "Hours?"
    ));
  }

  #[test]
  fn modify_of_foreign_entry_is_not_found() {
    let target = Uuid::new_v4();
    let req = request(RequestAction::Delete { entry_id: target });
    let mut entry = entry_for(&req, target);
    entry.tenant_id = Uuid::new_v4();
    assert!(matches!(
      plan_approval(&req, &roomy(), Some(&entry), false),
      Err(Error::EntryNotFound(id)) if id == target
    ));
  }

  #[test]
  fn delete_without_modification_room_is_rejected() {
    let target = Uuid::new_v4();
    let req = request(RequestAction::Delete { entry_id: target });
    let entry = entry_for(&req, target);
    let usage = Usage { modifications_used: 0, modifications_allowed: 0, ..roomy() };
    assert!(matches!(
      plan_approval(&req, &usage, Some(&entry), false),
      Err(Error::ModificationQuotaExceeded { .. })
    ));
  }

  #[test]
  fn approving_twice_is_refused() {
    let mut req = request(add());
    req.status = RequestStatus::Approved;
    assert!(matches!(
      plan_approval(&req, &roomy(), None, false),
      Err(Error::NotPending { .. })
    ));
  }

  #[test]
  fn revert_requires_approved_status() {
    let req = request(add());
    assert!(matches!(
      plan_revert(&req, RequestStatus::Rejected),
      Err(Error::NotRevertible { status: RequestStatus::Pending, .. })
    ));
  }

  #[test]
  fn revert_is_single_shot() {
    let mut req = request(add());
    req.status = RequestStatus::Rejected;
    req.was_reverted = true;
    assert!(matches!(
      plan_revert(&req, RequestStatus::Rejected),
      Err(Error::AlreadyReverted(_))
    ));
  }

  #[test]
  fn revert_only_falls_back_to_rejected() {
    let mut req = request(add());
    req.status = RequestStatus::Approved;
    req.snapshot = Some(Snapshot::Added { entry_id: Uuid::nil() });
    assert!(matches!(
      plan_revert(&req, RequestStatus::Pending),
      Err(Error::Validation(_))
    ));
    assert_eq!(
      plan_revert(&req, RequestStatus::Rejected).unwrap(),
      Compensation::RemoveAdded { entry_id: Uuid::nil() }
    );
  }

  #[test]
  fn revert_of_delete_reinserts_under_new_id() {
    let mut req = request(RequestAction::Delete { entry_id: Uuid::new_v4() });
    let entry = entry_for(&req, Uuid::new_v4());
    req.status = RequestStatus::Approved;
    req.snapshot = Some(Snapshot::Deleted { entry: entry.clone() });

    match plan_revert(&req, RequestStatus::Rejected).unwrap() {
      Compensation::Reinsert { entry: restored, new_entry_id } => {
        assert_eq!(restored, entry);
        assert_ne!(new_entry_id, entry.entry_id);
      }
      other => panic!("unexpected compensation: {other:?}"),
    }
  }
}
