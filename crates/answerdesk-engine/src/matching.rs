//! The public query path.
//!
//! Gates run in a fixed order and each ends the query with its own answer:
//! unknown tenant, expired window, exhausted hits, inactive account. Past the
//! gates the question is embedded against the tenant's corpus. Only a score
//! strictly above the threshold consumes a hit, and the hit and the bound
//! stats increment are committed together. Everything else is recorded as an
//! unmatched question.

use std::{sync::Arc, time::Duration};

use answerdesk_core::{
  Error as CoreError,
  entry::QaEntry,
  notify::{AuditLog, NewAuditRecord},
  oracle::SimilarityOracle,
  store::{HitReceipt, QnaStore},
};
use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::{
  Error, Result,
  cache::{EmbeddingCache, Vector},
};

pub const NOT_FOUND_ANSWER: &str = "Client not found.";
pub const EXPIRED_ANSWER: &str =
  "Subscription expired. Please renew your subscription to continue using the service.";
pub const LIMIT_ANSWER: &str =
  "User hits limit reached. Please upgrade your plan to continue using the service.";
pub const INACTIVE_ANSWER: &str = "Account is inactive. Please contact support.";
pub const FALLBACK_ANSWER: &str =
  "I'm sorry, I don't have an answer for that question. Please ask something else.";

#[derive(Debug, Clone, Copy)]
pub struct MatchConfig {
  /// A best score must be strictly greater than this to count as a match.
  pub threshold:      f32,
  pub oracle_timeout: Duration,
}

impl Default for MatchConfig {
  fn default() -> Self { Self { threshold: 0.6, oracle_timeout: Duration::from_secs(10) } }
}

/// How a query ended. Every variant is a successful answer to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum QueryOutcome {
  Matched { entry_id: Uuid, score: f32, answer: String },
  NoMatch { best_score: Option<f32> },
  TenantNotFound,
  Expired,
  LimitReached,
  Inactive,
}

impl QueryOutcome {
  pub fn answer_text(&self) -> &str {
    match self {
      Self::Matched { answer, .. } => answer,
      Self::NoMatch { .. } => FALLBACK_ANSWER,
      Self::TenantNotFound => NOT_FOUND_ANSWER,
      Self::Expired => EXPIRED_ANSWER,
      Self::LimitReached => LIMIT_ANSWER,
      Self::Inactive => INACTIVE_ANSWER,
    }
  }
}

pub struct MatchEngine<S> {
  store:  Arc<S>,
  oracle: Arc<dyn SimilarityOracle>,
  audit:  Arc<dyn AuditLog>,
  cache:  EmbeddingCache,
  config: MatchConfig,
}

impl<S: QnaStore + 'static> MatchEngine<S> {
  pub fn new(
    store: Arc<S>,
    oracle: Arc<dyn SimilarityOracle>,
    audit: Arc<dyn AuditLog>,
    config: MatchConfig,
  ) -> Self {
    Self { store, oracle, audit, cache: EmbeddingCache::new(), config }
  }

  pub fn cache(&self) -> &EmbeddingCache { &self.cache }

  /// Answer `question` for the tenant behind `website_key`.
  ///
  /// Business outcomes come back as `Ok`; only malformed input and
  /// infrastructure faults are errors. An oracle failure or timeout returns
  /// before any counter is touched.
  pub async fn query(&self, website_key: &str, question: &str) -> Result<QueryOutcome> {
    let question = question.trim();
    if website_key.trim().is_empty() {
      return Err(CoreError::Validation("website key must not be empty".into()).into());
    }
    if question.is_empty() {
      return Err(CoreError::Validation("question must not be empty".into()).into());
    }

    let Some(tenant) = self
      .store
      .get_tenant_by_key(website_key)
      .await
      .map_err(Error::store)?
    else {
      return Ok(QueryOutcome::TenantNotFound);
    };
    if tenant.window.has_elapsed(Utc::now()) {
      return Ok(QueryOutcome::Expired);
    }
    if tenant.usage.hits_exhausted() {
      return Ok(QueryOutcome::LimitReached);
    }
    if !tenant.is_active {
      return Ok(QueryOutcome::Inactive);
    }

    let entries = self
      .store
      .list_entries(tenant.tenant_id)
      .await
      .map_err(Error::store)?;
    if entries.is_empty() {
      return self.unmatched(tenant.tenant_id, question, None).await;
    }

    let (query_vector, vectors) = self.embed(tenant.tenant_id, question, &entries).await?;
    let Some((best, score)) = best_match(self.oracle.as_ref(), &query_vector, &entries, &vectors)
    else {
      return self.unmatched(tenant.tenant_id, question, None).await;
    };
    debug!(tenant_id = %tenant.tenant_id, entry_id = %best.entry_id, score, "best match");

    if score <= self.config.threshold {
      return self.unmatched(tenant.tenant_id, question, Some(score)).await;
    }

    let receipt = self
      .store
      .record_hit(tenant.tenant_id, best.entry_id)
      .await
      .map_err(Error::store)?;
    match receipt {
      HitReceipt::Consumed => {
        info!(tenant_id = %tenant.tenant_id, entry_id = %best.entry_id, score, "query matched");
        self.audit.append(NewAuditRecord::new(
          "visitor",
          "query.matched",
          Some(tenant.tenant_id),
          serde_json::json!({ "entry_id": best.entry_id, "score": score }),
        ));
        Ok(QueryOutcome::Matched {
          entry_id: best.entry_id,
          score,
          answer: best.answer.clone(),
        })
      }
      HitReceipt::LimitReached => Ok(QueryOutcome::LimitReached),
      HitReceipt::EntryRemoved => self.unmatched(tenant.tenant_id, question, None).await,
    }
  }

  async fn unmatched(
    &self,
    tenant_id: Uuid,
    question: &str,
    best_score: Option<f32>,
  ) -> Result<QueryOutcome> {
    let stats = self
      .store
      .record_unmatched(tenant_id, question.to_owned())
      .await
      .map_err(Error::store)?;
    debug!(%tenant_id, count = stats.count, ?best_score, "query unmatched");
    self.audit.append(NewAuditRecord::new(
      "visitor",
      "query.unmatched",
      Some(tenant_id),
      serde_json::json!({ "question": question, "best_score": best_score }),
    ));
    Ok(QueryOutcome::NoMatch { best_score })
  }

  /// Embed the question and every uncached entry in one blocking call.
  async fn embed(
    &self,
    tenant_id: Uuid,
    question: &str,
    entries: &[QaEntry],
  ) -> Result<(Vec<f32>, Vec<Vector>)> {
    let cached = self.cache.lookup(tenant_id, entries);
    let mut texts = vec![question.to_owned()];
    texts.extend(
      entries
        .iter()
        .zip(&cached)
        .filter(|(_, hit)| hit.is_none())
        .map(|(e, _)| e.question.clone()),
    );

    let oracle = Arc::clone(&self.oracle);
    let timeout = self.config.oracle_timeout;
    let embedded = tokio::time::timeout(
      timeout,
      tokio::task::spawn_blocking(move || oracle.embed_batch(&texts)),
    )
    .await
    .map_err(|_| Error::OracleTimeout(timeout))???;

    let mut fresh = embedded.into_iter();
    let query_vector = fresh
      .next()
      .ok_or_else(|| answerdesk_core::oracle::OracleError("no vector for the query".into()))?;
    let mut vectors = Vec::with_capacity(entries.len());
    for hit in cached {
      match hit {
        Some(v) => vectors.push(v),
        None => {
          let v = fresh.next().ok_or_else(|| {
            answerdesk_core::oracle::OracleError("fewer vectors than entries".into())
          })?;
          vectors.push(Vector::from(v));
        }
      }
    }

    self.cache.refresh(tenant_id, entries, &vectors);
    Ok((query_vector, vectors))
  }
}

/// The highest-scoring entry; ties go to the earliest in corpus order.
fn best_match<'a>(
  oracle: &dyn SimilarityOracle,
  query: &[f32],
  entries: &'a [QaEntry],
  vectors: &[Vector],
) -> Option<(&'a QaEntry, f32)> {
  let mut best: Option<(&QaEntry, f32)> = None;
  for (entry, vector) in entries.iter().zip(vectors) {
    let score = oracle.similarity(query, vector);
    if best.is_none_or(|(_, top)| score > top) {
      best = Some((entry, score));
    }
  }
  best
}
