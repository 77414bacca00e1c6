//! Error type for `answerdesk-engine`.

use std::time::Duration;

use answerdesk_core::{Classify, ErrorKind, oracle::OracleError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A rule checked by the engine itself (validation, authorization).
  #[error(transparent)]
  Core(#[from] answerdesk_core::Error),

  /// Any failure reported by the store, with its classification preserved.
  #[error("{source}")]
  Store {
    kind:   ErrorKind,
    code:   &'static str,
    #[source]
    source: Box<dyn std::error::Error + Send + Sync>,
  },

  #[error(transparent)]
  Oracle(#[from] OracleError),

  #[error("embedding oracle did not answer within {0:?}")]
  OracleTimeout(Duration),

  #[error("blocking task failed: {0}")]
  Join(#[from] tokio::task::JoinError),
}

impl Error {
  /// Wrap a store error, keeping its kind and code.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Classify + Send + Sync + 'static,
  {
    Error::Store { kind: e.kind(), code: e.code(), source: Box::new(e) }
  }
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      Error::Store { kind, .. } => *kind,
      Error::Oracle(_) | Error::OracleTimeout(_) | Error::Join(_) => ErrorKind::Infrastructure,
    }
  }

  fn code(&self) -> &'static str {
    match self {
      Error::Core(e) => e.code(),
      Error::Store { code, .. } => code,
      Error::Oracle(_) => "oracle_unavailable",
      Error::OracleTimeout(_) => "oracle_timeout",
      Error::Join(_) => "internal",
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
