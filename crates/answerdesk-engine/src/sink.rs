//! Fire-and-forget delivery of notifications and audit records into the
//! store. Each send is a detached task; a failure is logged and dropped.

use std::sync::Arc;

use answerdesk_core::{
  notify::{AuditLog, NewAuditRecord, NewNotification, NotificationSink},
  store::QnaStore,
};
use tokio::runtime::Handle;
use tracing::warn;

pub struct StoreSink<S> {
  store: Arc<S>,
}

impl<S> StoreSink<S> {
  pub fn new(store: Arc<S>) -> Self { Self { store } }
}

impl<S> Clone for StoreSink<S> {
  fn clone(&self) -> Self { Self { store: Arc::clone(&self.store) } }
}

impl<S: QnaStore + 'static> NotificationSink for StoreSink<S> {
  fn notify(&self, notification: NewNotification) {
    let Ok(handle) = Handle::try_current() else {
      warn!(kind = %notification.kind, "no runtime; notification dropped");
      return;
    };
    let store = Arc::clone(&self.store);
    handle.spawn(async move {
      let recipient = notification.recipient_id.clone();
      if let Err(e) = store.record_notification(notification).await {
        warn!(%recipient, error = %e, "notification delivery failed");
      }
    });
  }
}

impl<S: QnaStore + 'static> AuditLog for StoreSink<S> {
  fn append(&self, record: NewAuditRecord) {
    let Ok(handle) = Handle::try_current() else {
      warn!(action = %record.action, "no runtime; audit record dropped");
      return;
    };
    let store = Arc::clone(&self.store);
    handle.spawn(async move {
      let action = record.action.clone();
      if let Err(e) = store.append_audit(record).await {
        warn!(%action, error = %e, "audit append failed");
      }
    });
  }
}
