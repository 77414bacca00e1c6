//! JSON REST API for answerdesk.
//!
//! Exposes an axum [`Router`] over a set of [`Services`]. Credentials are
//! resolved by whatever [`IdentityProvider`] the caller supplies; TLS and
//! transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", answerdesk_api::api_router(state))
//! ```

pub mod auth;
pub mod body;
pub mod entries;
pub mod error;
pub mod notifications;
pub mod query;
pub mod requests;
pub mod stats;
pub mod tenants;

use std::sync::Arc;

use answerdesk_core::{identity::IdentityProvider, store::QnaStore};
use answerdesk_engine::Services;
use axum::{
  Router,
  routing::{get, post, put},
};

pub use auth::Authenticated;
pub use error::ApiError;

/// Shared state handed to every handler.
pub struct AppState<S> {
  pub services: Arc<Services<S>>,
  pub identity: Arc<dyn IdentityProvider>,
}

impl<S> AppState<S> {
  pub fn new(services: Arc<Services<S>>, identity: Arc<dyn IdentityProvider>) -> Self {
    Self { services, identity }
  }
}

// Derived Clone would demand `S: Clone`.
impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self { services: Arc::clone(&self.services), identity: Arc::clone(&self.identity) }
  }
}

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S>(state: AppState<S>) -> Router<()>
where
  S: QnaStore + 'static,
{
  Router::new()
    // Public
    .route("/query", post(query::ask::<S>))
    .route("/plans", get(query::plans))
    // Tenant self-service
    .route("/me/subscription", get(stats::subscription::<S>))
    .route("/me/entries", get(stats::entries::<S>))
    .route("/me/stats/summary", get(stats::summary::<S>))
    .route("/me/stats/requested", get(stats::requested::<S>))
    // Modification requests
    .route("/requests", get(requests::own::<S>).post(requests::submit::<S>))
    .route("/requests/{id}/decision", put(requests::decide::<S>))
    .route("/requests/{id}/revert", put(requests::revert::<S>))
    .route("/admin/requests", get(requests::queue::<S>))
    // Tenants and usage
    .route("/tenants", get(tenants::list::<S>).post(tenants::create::<S>))
    .route("/tenants/{id}", get(tenants::detail::<S>).delete(tenants::remove::<S>))
    .route("/tenants/{id}/plan", put(tenants::apply_plan::<S>))
    .route("/tenants/{id}/active", put(tenants::set_active::<S>))
    .route("/tenants/{id}/usage", post(tenants::adjust_usage::<S>))
    .route("/admin/sync-allowances", post(tenants::sync::<S>))
    // Corpus administration
    .route("/tenants/{id}/entries", post(entries::create::<S>))
    .route("/entries/{id}", put(entries::update::<S>).delete(entries::remove::<S>))
    // Operator reports
    .route("/admin/stats", get(stats::all::<S>))
    .route("/admin/logs", get(stats::logs::<S>))
    // Notifications
    .route("/notifications", get(notifications::list::<S>))
    .route("/notifications/unread-count", get(notifications::unread_count::<S>))
    .route("/notifications/{id}/read", put(notifications::mark_read::<S>))
    .with_state(state)
}
