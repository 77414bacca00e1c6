//! Embedding oracles.
//!
//! [`HashEmbedder`] is a deterministic bag-of-words embedder that needs no
//! model or network; it is the default. [`RemoteEmbedder`] calls an
//! OpenAI-compatible `/embeddings` endpoint and blocks on the response, so
//! callers must run it on the blocking pool.

use std::{
  collections::hash_map::DefaultHasher,
  hash::{Hash as _, Hasher as _},
};

use answerdesk_core::oracle::{OracleError, SimilarityOracle};
use reqwest::blocking::Client;
use serde::Deserialize;

// ─── Hash embedder ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct HashEmbedder {
  dimensions: usize,
  seed:       u64,
}

impl Default for HashEmbedder {
  fn default() -> Self { Self::new(256) }
}

impl HashEmbedder {
  pub fn new(dimensions: usize) -> Self { Self { dimensions: dimensions.max(1), seed: 1337 } }

  pub fn embed_text(&self, text: &str) -> Vec<f32> {
    let mut vector = vec![0f32; self.dimensions];
    for token in tokens(text) {
      vector[self.bucket_for(&token)] += 1.0;
    }
    normalize(&mut vector);
    vector
  }

  fn bucket_for(&self, token: &str) -> usize {
    let mut hasher = DefaultHasher::new();
    hasher.write_u64(self.seed);
    token.hash(&mut hasher);
    (hasher.finish() % self.dimensions as u64) as usize
  }
}

impl SimilarityOracle for HashEmbedder {
  fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError> { Ok(self.embed_text(text)) }
}

/// Lowercased alphanumeric runs; punctuation never distinguishes questions.
fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
  text
    .split(|c: char| !c.is_alphanumeric())
    .filter(|t| !t.is_empty())
    .map(str::to_lowercase)
}

fn normalize(vector: &mut [f32]) {
  let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
  if norm == 0.0 {
    return;
  }
  for value in vector.iter_mut() {
    *value /= norm;
  }
}

// ─── Remote embedder ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct RemoteEmbedder {
  http:    Client,
  url:     String,
  model:   String,
  api_key: String,
}

impl std::fmt::Debug for RemoteEmbedder {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("RemoteEmbedder")
      .field("url", &self.url)
      .field("model", &self.model)
      .finish_non_exhaustive()
  }
}

impl RemoteEmbedder {
  pub fn new(url: impl Into<String>, model: impl Into<String>, api_key: impl Into<String>) -> Self {
    Self {
      http:    Client::new(),
      url:     url.into(),
      model:   model.into(),
      api_key: api_key.into(),
    }
  }

  /// Build an embedder whose bearer key is read from `api_key_env`.
  pub fn from_env(
    url: impl Into<String>,
    model: impl Into<String>,
    api_key_env: &str,
  ) -> Result<Self, OracleError> {
    let api_key = std::env::var(api_key_env)
      .map_err(|_| OracleError(format!("{api_key_env} is required for remote embeddings")))?;
    Ok(Self::new(url, model, api_key))
  }
}

#[derive(Deserialize)]
struct EmbeddingResponse {
  data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
  #[serde(default)]
  index:     usize,
  embedding: Vec<f32>,
}

impl SimilarityOracle for RemoteEmbedder {
  fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError> {
    self
      .embed_batch(&[text.to_owned()])?
      .pop()
      .ok_or_else(|| OracleError("embedding endpoint returned no vectors".into()))
  }

  fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OracleError> {
    if texts.is_empty() {
      return Ok(Vec::new());
    }
    let payload = serde_json::json!({ "model": self.model, "input": texts });
    let response = self
      .http
      .post(&self.url)
      .bearer_auth(&self.api_key)
      .json(&payload)
      .send()
      .map_err(|e| OracleError(e.to_string()))?;
    if !response.status().is_success() {
      return Err(OracleError(format!(
        "embeddings request failed: {}",
        response.status()
      )));
    }

    let mut parsed: EmbeddingResponse =
      response.json().map_err(|e| OracleError(e.to_string()))?;
    if parsed.data.len() != texts.len() {
      return Err(OracleError(format!(
        "asked for {} embeddings, got {}",
        texts.len(),
        parsed.data.len()
      )));
    }
    parsed.data.sort_by_key(|d| d.index);
    Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
  }
}
