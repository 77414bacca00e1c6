//! Core types and trait definitions for answerdesk.
//!
//! This crate is deliberately free of HTTP and database dependencies. It
//! holds the domain model, the pure quota and state-machine rules, and the
//! contracts of every collaborator the engine talks to.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod entry;
pub mod error;
pub mod identity;
pub mod notify;
pub mod oracle;
pub mod plan;
pub mod request;
pub mod stats;
pub mod store;
pub mod tenant;

pub use error::{Classify, Error, ErrorKind, Result};
