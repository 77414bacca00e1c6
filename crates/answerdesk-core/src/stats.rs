//! Query telemetry.
//!
//! A stats row either tracks a known entry (`question_id` bound) or an
//! unmatched visitor question keyed by its raw text (`question_id` unbound).
//! Unbound rows become bound only when an add request for that exact text is
//! approved; bound rows fall back to unbound when their entry goes away.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionStats {
  pub stats_id:      Uuid,
  pub tenant_id:     Uuid,
  /// The matched entry; `None` for an unmatched ("requested") question.
  pub question_id:   Option<Uuid>,
  pub question_text: String,
  pub count:         u64,
  pub created_at:    DateTime<Utc>,
  pub updated_at:    DateTime<Utc>,
}

impl QuestionStats {
  pub fn is_bound(&self) -> bool { self.question_id.is_some() }
}

/// Headline numbers shown on a tenant's dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSummary {
  pub valid_questions_count:     u64,
  pub requested_questions_count: u64,
  pub pending_requests_count:    u64,
  pub hits_used:                 u32,
}

/// A corpus entry together with how often visitors matched it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedEntry {
  #[serde(flatten)]
  pub entry:       crate::entry::QaEntry,
  pub asked_count: u64,
}
