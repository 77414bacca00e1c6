//! The similarity oracle contract.
//!
//! Implementations may block (model inference, network I/O); callers are
//! expected to run them off the async executor.

use thiserror::Error;

#[derive(Debug, Error)]
#[error("embedding oracle failed: {0}")]
pub struct OracleError(pub String);

pub trait SimilarityOracle: Send + Sync {
  /// Map `text` to a fixed-size vector.
  fn embed(&self, text: &str) -> Result<Vec<f32>, OracleError>;

  /// Embed several texts. Backends with a batch endpoint should override.
  fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, OracleError> {
    texts.iter().map(|t| self.embed(t)).collect()
  }

  /// Similarity in `[-1, 1]`.
  fn similarity(&self, a: &[f32], b: &[f32]) -> f32 { cosine_similarity(a, b) }
}

/// Cosine similarity; zero when either vector has no magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
  let mut dot = 0.0f32;
  let mut a_norm = 0.0f32;
  let mut b_norm = 0.0f32;
  for (x, y) in a.iter().zip(b.iter()) {
    dot += x * y;
    a_norm += x * x;
    b_norm += y * y;
  }
  if a_norm == 0.0 || b_norm == 0.0 {
    return 0.0;
  }
  (dot / (a_norm.sqrt() * b_norm.sqrt())).clamp(-1.0, 1.0)
}
