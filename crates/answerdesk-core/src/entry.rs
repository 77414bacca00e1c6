//! Corpus entries: the question/answer pairs a tenant serves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// How an entry came to exist in its current form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Provenance {
  /// Added directly by an operator.
  #[default]
  Admin,
  /// Created by approving an add request.
  Request { request_id: Uuid },
  /// Re-inserted by reverting an approved delete request.
  Restored { request_id: Uuid },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QaEntry {
  pub entry_id:   Uuid,
  pub tenant_id:  Uuid,
  pub question:   String,
  pub answer:     String,
  pub provenance: Provenance,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

/// Question and answer text, validated at the boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryContent {
  pub question: String,
  pub answer:   String,
}

impl EntryContent {
  pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Result<Self> {
    let content = Self { question: question.into(), answer: answer.into() };
    content.validate()?;
    Ok(content)
  }

  pub fn validate(&self) -> Result<()> {
    if self.question.trim().is_empty() {
      return Err(Error::Validation("question must not be empty".into()));
    }
    if self.answer.trim().is_empty() {
      return Err(Error::Validation("answer must not be empty".into()));
    }
    Ok(())
  }
}

/// Comparison key for duplicate detection: trimmed and case-folded.
pub fn question_key(question: &str) -> String { question.trim().to_lowercase() }
