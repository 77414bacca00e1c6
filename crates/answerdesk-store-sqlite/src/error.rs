//! Error type for `answerdesk-store-sqlite`.

use answerdesk_core::{Classify, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A business rejection or validation failure raised by a core rule.
  #[error(transparent)]
  Core(#[from] answerdesk_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("sqlite error: {0}")]
  Sqlite(#[from] rusqlite::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  /// A stored row could not be turned back into a domain value.
  #[error("corrupt row: {0}")]
  Decode(String),
}

impl Classify for Error {
  fn kind(&self) -> ErrorKind {
    match self {
      Error::Core(e) => e.kind(),
      _ => ErrorKind::Infrastructure,
    }
  }

  fn code(&self) -> &'static str {
    match self {
      Error::Core(e) => e.code(),
      Error::Database(_) | Error::Sqlite(_) => "database",
      Error::Json(_) | Error::Uuid(_) | Error::DateParse(_) | Error::Decode(_) => {
        "corrupt_row"
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
