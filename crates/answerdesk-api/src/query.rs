//! The public query surface.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/query` | Body: `{"website_key":"..","question":".."}`; always 200 unless malformed |
//! | `GET`  | `/plans` | The plan catalog |
//!
//! Expired, inactive, over-limit and unmatched outcomes are answered with an
//! explanatory message, not an error status.

use answerdesk_core::plan::{self, PlanListing};
use answerdesk_core::store::QnaStore;
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::{AppState, body::JsonBody, error::ApiError};

// ─── Ask ─────────────────────────────────────────────────────────────────────

/// Missing fields deserialize as empty so they surface as validation errors
/// rather than extractor rejections.
#[derive(Debug, Deserialize)]
pub struct QueryBody {
  #[serde(default)]
  pub website_key:   String,
  #[serde(default)]
  pub question:      String,
  /// Accepted for compatibility; matching is language-agnostic.
  #[serde(default)]
  pub language_hint: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AnswerBody {
  pub answer: String,
}

/// `POST /query`
pub async fn ask<S>(
  State(state): State<AppState<S>>,
  JsonBody(body): JsonBody<QueryBody>,
) -> Result<Json<AnswerBody>, ApiError>
where
  S: QnaStore + 'static,
{
  let outcome = state
    .services
    .matcher
    .query(&body.website_key, &body.question)
    .await?;
  tracing::debug!(language_hint = ?body.language_hint, ?outcome, "query answered");
  Ok(Json(AnswerBody { answer: outcome.answer_text().to_owned() }))
}

// ─── Plans ───────────────────────────────────────────────────────────────────

/// `GET /plans`
pub async fn plans() -> Json<Vec<PlanListing>> { Json(plan::catalog()) }
