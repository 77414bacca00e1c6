//! Startup errors for the answerdesk server.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("user {username:?}: {reason}")]
  InvalidUser { username: String, reason: String },

  #[error("oracle configuration: {0}")]
  Oracle(String),
}
