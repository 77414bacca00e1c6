//! Per-tenant cache of corpus embeddings.
//!
//! Vectors are keyed by `(entry_id, updated_at)`: an edited entry misses and
//! is re-embedded, and every refresh replaces the tenant's map with the live
//! corpus so removed entries drop out. Correctness never depends on a hit.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex, PoisonError},
};

use answerdesk_core::entry::QaEntry;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub type Vector = Arc<[f32]>;

#[derive(Debug, Default)]
pub struct EmbeddingCache {
  tenants: Mutex<HashMap<Uuid, HashMap<Uuid, (DateTime<Utc>, Vector)>>>,
}

impl EmbeddingCache {
  pub fn new() -> Self { Self::default() }

  /// Cached vectors for `entries`, position for position; `None` on a miss.
  pub fn lookup(&self, tenant_id: Uuid, entries: &[QaEntry]) -> Vec<Option<Vector>> {
    let tenants = self.tenants.lock().unwrap_or_else(PoisonError::into_inner);
    let cached = tenants.get(&tenant_id);
    entries
      .iter()
      .map(|e| {
        cached
          .and_then(|m| m.get(&e.entry_id))
          .filter(|(stamp, _)| *stamp == e.updated_at)
          .map(|(_, v)| v.clone())
      })
      .collect()
  }

  /// Replace the tenant's map with exactly `entries` and their `vectors`.
  pub fn refresh(&self, tenant_id: Uuid, entries: &[QaEntry], vectors: &[Vector]) {
    let fresh = entries
      .iter()
      .zip(vectors)
      .map(|(e, v)| (e.entry_id, (e.updated_at, v.clone())))
      .collect();
    self
      .tenants
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(tenant_id, fresh);
  }

  pub fn invalidate(&self, tenant_id: Uuid) {
    self
      .tenants
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .remove(&tenant_id);
  }

  /// Number of vectors held for a tenant.
  pub fn len(&self, tenant_id: Uuid) -> usize {
    self
      .tenants
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .get(&tenant_id)
      .map_or(0, HashMap::len)
  }
}
