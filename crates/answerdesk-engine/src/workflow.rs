//! Modification requests and direct corpus administration.
//!
//! Tenants propose; operators decide. Every decision and revert runs as one
//! store transaction, so a refused approval leaves nothing behind. The
//! notifications and audit records that follow are sent after commit and
//! can fail without undoing it.

use std::sync::Arc;

use answerdesk_core::{
  entry::{EntryContent, QaEntry},
  identity::Caller,
  notify::{AuditLog, NewAuditRecord, NewNotification, NotificationSink},
  request::{Decision, ModificationRequest, NewRequest, RequestAction, RequestStatus, RequestType},
  store::{QnaStore, QueuedRequest, RequestQuery},
};
use serde::Deserialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{Error, Result};

/// A tenant's proposal as it arrives at the boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct Proposal {
  pub request_type:    RequestType,
  pub target_entry_id: Option<Uuid>,
  pub question:        Option<String>,
  pub answer:          Option<String>,
}

pub struct RequestWorkflow<S> {
  store:    Arc<S>,
  notifier: Arc<dyn NotificationSink>,
  audit:    Arc<dyn AuditLog>,
}

impl<S: QnaStore + 'static> RequestWorkflow<S> {
  pub fn new(
    store: Arc<S>,
    notifier: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditLog>,
  ) -> Self {
    Self { store, notifier, audit }
  }

  // ── Requests ──────────────────────────────────────────────────────────────

  /// Queue a proposal as pending. Quotas are checked at approval, not here.
  pub async fn submit(&self, caller: &Caller, proposal: Proposal) -> Result<ModificationRequest> {
    let tenant_id = caller.tenant_scope()?;
    let action = RequestAction::from_parts(
      proposal.request_type,
      proposal.target_entry_id,
      proposal.question,
      proposal.answer,
    )?;

    let request = self
      .store
      .submit_request(NewRequest {
        tenant_id,
        action,
        submitted_by: caller.user_id.clone(),
        submitted_role: caller.role,
      })
      .await
      .map_err(Error::store)?;

    let kind = request.action.request_type();
    info!(request_id = %request.request_id, %tenant_id, %kind, "request submitted");
    self.notifier.notify(NewNotification::to_operators(
      format!("New {kind} request"),
      match request.action.proposed() {
        Some(c) => format!("{} proposed: {}", caller.user_id, c.question),
        None => format!("{} asked to delete an entry", caller.user_id),
      },
      "question_request",
      serde_json::json!({
        "request_id": request.request_id,
        "tenant_id": tenant_id,
        "request_type": kind,
      }),
    ));
    self.audit.append(NewAuditRecord::new(
      &caller.user_id,
      "request.submit",
      Some(tenant_id),
      serde_json::json!({ "request_id": request.request_id, "request_type": kind }),
    ));
    Ok(request)
  }

  /// Approve or reject a pending request.
  pub async fn decide(
    &self,
    caller: &Caller,
    request_id: Uuid,
    decision: Decision,
    admin_notes: Option<String>,
  ) -> Result<ModificationRequest> {
    caller.require_operator()?;
    let request = self
      .store
      .decide_request(request_id, decision, admin_notes, caller.user_id.clone())
      .await
      .inspect_err(|e| debug!(%request_id, ?decision, error = %e, "decision refused"))
      .map_err(Error::store)?;

    let (title, action) = match decision {
      Decision::Approve => ("Request approved", "request.approve"),
      Decision::Reject => ("Request rejected", "request.reject"),
    };
    self.notify_tenant(&request, title, "request_decided");
    self.audit.append(NewAuditRecord::new(
      &caller.user_id,
      action,
      Some(request.tenant_id),
      serde_json::json!({
        "request_id": request.request_id,
        "request_type": request.action.request_type(),
        "snapshot": request.snapshot,
      }),
    ));
    Ok(request)
  }

  /// Undo an approved request. Single-shot: a second revert is refused.
  pub async fn revert(
    &self,
    caller: &Caller,
    request_id: Uuid,
    fallback: RequestStatus,
    admin_notes: Option<String>,
  ) -> Result<ModificationRequest> {
    caller.require_operator()?;
    let request = self
      .store
      .revert_request(request_id, fallback, admin_notes, caller.user_id.clone())
      .await
      .map_err(Error::store)?;

    self.notify_tenant(&request, "Request reverted", "request_reverted");
    self.audit.append(NewAuditRecord::new(
      &caller.user_id,
      "request.revert",
      Some(request.tenant_id),
      serde_json::json!({
        "request_id": request.request_id,
        "request_type": request.action.request_type(),
        "snapshot": request.snapshot,
        "status": request.status,
      }),
    ));
    Ok(request)
  }

  fn notify_tenant(&self, request: &ModificationRequest, title: &str, kind: &str) {
    let subject = request
      .action
      .proposed()
      .map_or_else(|| "entry deletion".to_owned(), |c| format!("{:?}", c.question));
    let mut message = format!(
      "Your {} request for {subject} is now {}.",
      request.action.request_type(),
      request.status
    );
    if let Some(notes) = &request.admin_notes {
      message.push_str(&format!(" Notes: {notes}"));
    }
    self.notifier.notify(NewNotification::to_tenant(
      request.tenant_id,
      title,
      message,
      kind,
      serde_json::json!({
        "request_id": request.request_id,
        "status": request.status,
        "was_reverted": request.was_reverted,
      }),
    ));
  }

  /// The caller's own tenant's requests, newest first.
  pub async fn tenant_requests(&self, caller: &Caller) -> Result<Vec<QueuedRequest>> {
    let tenant_id = caller.tenant_scope()?;
    self
      .store
      .list_requests(RequestQuery { tenant_id: Some(tenant_id), status: None })
      .await
      .map_err(Error::store)
  }

  /// The operator queue; `status: None` lists everything.
  pub async fn queue(
    &self,
    caller: &Caller,
    tenant_id: Option<Uuid>,
    status: Option<RequestStatus>,
  ) -> Result<Vec<QueuedRequest>> {
    caller.require_operator()?;
    self
      .store
      .list_requests(RequestQuery { tenant_id, status })
      .await
      .map_err(Error::store)
  }

  // ── Direct administration ─────────────────────────────────────────────────

  pub async fn add_entry(
    &self,
    caller: &Caller,
    tenant_id: Uuid,
    content: EntryContent,
  ) -> Result<QaEntry> {
    caller.require_operator()?;
    let entry = self
      .store
      .add_entry(tenant_id, content)
      .await
      .map_err(Error::store)?;
    self.audit_entry(caller, "entry.add", &entry);
    Ok(entry)
  }

  pub async fn update_entry(
    &self,
    caller: &Caller,
    entry_id: Uuid,
    content: EntryContent,
  ) -> Result<QaEntry> {
    caller.require_operator()?;
    let entry = self
      .store
      .update_entry(entry_id, content)
      .await
      .map_err(Error::store)?;
    self.audit_entry(caller, "entry.update", &entry);
    Ok(entry)
  }

  pub async fn delete_entry(&self, caller: &Caller, entry_id: Uuid) -> Result<QaEntry> {
    caller.require_operator()?;
    let entry = self.store.delete_entry(entry_id).await.map_err(Error::store)?;
    self.audit_entry(caller, "entry.delete", &entry);
    Ok(entry)
  }

  fn audit_entry(&self, caller: &Caller, action: &str, entry: &QaEntry) {
    info!(entry_id = %entry.entry_id, tenant_id = %entry.tenant_id, action, "corpus changed");
    self.audit.append(NewAuditRecord::new(
      &caller.user_id,
      action,
      Some(entry.tenant_id),
      serde_json::json!({ "entry_id": entry.entry_id, "question": entry.question }),
    ));
  }
}
