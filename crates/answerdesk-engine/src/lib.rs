//! The answerdesk services.
//!
//! Each service is an explicitly constructed object over a shared
//! [`QnaStore`]: [`MatchEngine`] answers visitor questions,
//! [`RequestWorkflow`] moves modification requests through review,
//! [`UsageLedger`] owns tenant accounts and counters, and [`Reports`] builds
//! read models. [`Services`] wires them together.

pub mod cache;
pub mod embedding;
pub mod error;
pub mod ledger;
pub mod matching;
pub mod reports;
pub mod sink;
pub mod workflow;

use std::sync::Arc;

use answerdesk_core::{
  identity::Caller,
  notify::{AuditLog, NotificationSink},
  oracle::SimilarityOracle,
  store::QnaStore,
  tenant::Tenant,
};
use uuid::Uuid;

pub use error::{Error, Result};
pub use ledger::UsageLedger;
pub use matching::{MatchConfig, MatchEngine, QueryOutcome};
pub use reports::Reports;
pub use sink::StoreSink;
pub use workflow::RequestWorkflow;

/// Every service, sharing one store and one pair of outbound sinks.
pub struct Services<S> {
  pub matcher:  MatchEngine<S>,
  pub workflow: RequestWorkflow<S>,
  pub ledger:   Arc<UsageLedger<S>>,
  pub reports:  Reports<S>,
}

impl<S: QnaStore + 'static> Services<S> {
  /// Wire the services with notifications and audit records written back
  /// into `store`.
  pub fn new(store: Arc<S>, oracle: Arc<dyn SimilarityOracle>, config: MatchConfig) -> Self {
    let sink = Arc::new(StoreSink::new(Arc::clone(&store)));
    Self::with_sinks(store, oracle, config, sink.clone(), sink)
  }

  pub fn with_sinks(
    store: Arc<S>,
    oracle: Arc<dyn SimilarityOracle>,
    config: MatchConfig,
    notifier: Arc<dyn NotificationSink>,
    audit: Arc<dyn AuditLog>,
  ) -> Self {
    Self {
      matcher:  MatchEngine::new(Arc::clone(&store), oracle, Arc::clone(&audit), config),
      workflow: RequestWorkflow::new(Arc::clone(&store), notifier, Arc::clone(&audit)),
      ledger:   Arc::new(UsageLedger::new(Arc::clone(&store), audit)),
      reports:  Reports::new(store),
    }
  }

  /// Delete a tenant and drop its cached entry vectors.
  pub async fn delete_tenant(&self, caller: &Caller, tenant_id: Uuid) -> Result<Tenant> {
    let tenant = self.ledger.delete_tenant(caller, tenant_id).await?;
    self.matcher.cache().invalidate(tenant_id);
    Ok(tenant)
  }
}
