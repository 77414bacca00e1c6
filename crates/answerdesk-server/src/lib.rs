//! Wiring for the answerdesk server binary.
//!
//! Holds the deserialised configuration, the Basic-auth identity provider,
//! and the function that assembles the HTTP application.

pub mod auth;
pub mod error;

pub use error::Error;

use std::{path::PathBuf, sync::Arc, time::Duration};

use answerdesk_api::AppState;
use answerdesk_core::{identity::Role, oracle::SimilarityOracle, store::QnaStore};
use answerdesk_engine::{
  MatchConfig,
  embedding::{HashEmbedder, RemoteEmbedder},
};
use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `ANSWERDESK_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  #[serde(default)]
  pub matching:           MatchingConfig,
  #[serde(default)]
  pub oracle:             OracleConfig,
  /// Seconds between allowance sweeps.
  #[serde(default = "default_sync_interval")]
  pub sync_interval_secs: u64,
  #[serde(default)]
  pub users:              Vec<UserConfig>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/answerdesk/answerdesk.db") }
fn default_sync_interval() -> u64 { 3600 }

#[derive(Debug, Deserialize, Clone, Copy)]
pub struct MatchingConfig {
  #[serde(default = "default_threshold")]
  pub threshold:         f32,
  #[serde(default = "default_oracle_timeout_ms")]
  pub oracle_timeout_ms: u64,
}

fn default_threshold() -> f32 { 0.6 }
fn default_oracle_timeout_ms() -> u64 { 10_000 }

impl Default for MatchingConfig {
  fn default() -> Self {
    Self { threshold: default_threshold(), oracle_timeout_ms: default_oracle_timeout_ms() }
  }
}

impl From<MatchingConfig> for MatchConfig {
  fn from(c: MatchingConfig) -> Self {
    MatchConfig {
      threshold:      c.threshold,
      oracle_timeout: Duration::from_millis(c.oracle_timeout_ms),
    }
  }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OracleKind {
  #[default]
  Hash,
  Remote,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
  #[serde(default)]
  pub kind:        OracleKind,
  /// Vector width of the hash embedder.
  #[serde(default = "default_dimensions")]
  pub dimensions:  usize,
  /// OpenAI-compatible `/embeddings` endpoint.
  pub url:         Option<String>,
  #[serde(default = "default_model")]
  pub model:       String,
  /// Environment variable holding the bearer key.
  #[serde(default = "default_api_key_env")]
  pub api_key_env: String,
}

fn default_dimensions() -> usize { 256 }
fn default_model() -> String { "text-embedding-3-small".into() }
fn default_api_key_env() -> String { "ANSWERDESK_EMBEDDING_KEY".into() }

impl Default for OracleConfig {
  fn default() -> Self {
    Self {
      kind:        OracleKind::default(),
      dimensions:  default_dimensions(),
      url:         None,
      model:       default_model(),
      api_key_env: default_api_key_env(),
    }
  }
}

/// One login accepted by the Basic-auth identity provider.
#[derive(Debug, Deserialize, Clone)]
pub struct UserConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub role:          Role,
  /// Required for tenant and staff users.
  pub tenant_id:     Option<Uuid>,
}

// ─── Assembly ─────────────────────────────────────────────────────────────────

/// Build the configured similarity oracle.
///
/// The remote embedder owns a blocking HTTP client, so call this off the
/// async runtime (e.g. inside `spawn_blocking`).
pub fn build_oracle(config: &OracleConfig) -> Result<Arc<dyn SimilarityOracle>, Error> {
  match config.kind {
    OracleKind::Hash => Ok(Arc::new(HashEmbedder::new(config.dimensions))),
    OracleKind::Remote => {
      let url = config
        .url
        .as_deref()
        .ok_or_else(|| Error::Oracle("oracle.url is required for kind = \"remote\"".into()))?;
      let embedder = RemoteEmbedder::from_env(url, &config.model, &config.api_key_env)
        .map_err(|e| Error::Oracle(e.to_string()))?;
      Ok(Arc::new(embedder))
    }
  }
}

/// The full HTTP application: the API under `/api`, traced.
pub fn app<S>(state: AppState<S>) -> Router
where
  S: QnaStore + 'static,
{
  Router::new()
    .nest("/api", answerdesk_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_fill_missing_sections() {
    let config: ServerConfig = config::Config::builder()
      .set_override("port", 9000)
      .unwrap()
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap();
    assert_eq!(config.port, 9000);
    assert_eq!(config.host, "127.0.0.1");
    assert_eq!(config.oracle.kind, OracleKind::Hash);
    assert!((config.matching.threshold - 0.6).abs() < f32::EPSILON);
    assert!(config.users.is_empty());
  }

  #[test]
  fn remote_oracle_needs_a_url() {
    let config = OracleConfig { kind: OracleKind::Remote, ..OracleConfig::default() };
    assert!(matches!(build_oracle(&config), Err(Error::Oracle(_))));
  }

  #[tokio::test]
  async fn app_serves_the_api_behind_basic_auth() {
    use answerdesk_engine::Services;
    use answerdesk_store_sqlite::SqliteStore;
    use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
    use axum::{
      body::Body,
      http::{Request, StatusCode, header},
    };
    use base64::Engine as _;
    use rand_core::OsRng;
    use tower::ServiceExt as _;

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(b"secret", &salt).unwrap().to_string();
    let identity = auth::BasicAuthIdentity::new(vec![UserConfig {
      username:      "ops".into(),
      password_hash: hash,
      role:          Role::Operator,
      tenant_id:     None,
    }])
    .unwrap();

    let store = Arc::new(SqliteStore::open_in_memory().await.unwrap());
    let oracle = build_oracle(&OracleConfig::default()).unwrap();
    let services: Arc<Services<SqliteStore>> =
      Arc::new(Services::new(store, oracle, MatchConfig::default()));
    let router = app(AppState::new(services, Arc::new(identity)));

    let creds = base64::engine::general_purpose::STANDARD.encode("ops:secret");
    let req = Request::builder()
      .uri("/api/tenants")
      .header(header::AUTHORIZATION, format!("Basic {creds}"))
      .body(Body::empty())
      .unwrap();
    assert_eq!(router.clone().oneshot(req).await.unwrap().status(), StatusCode::OK);

    let req = Request::builder().uri("/api/tenants").body(Body::empty()).unwrap();
    assert_eq!(router.clone().oneshot(req).await.unwrap().status(), StatusCode::UNAUTHORIZED);

    let req = Request::builder().uri("/api/plans").body(Body::empty()).unwrap();
    assert_eq!(router.oneshot(req).await.unwrap().status(), StatusCode::OK);
  }

  #[test]
  fn matching_section_converts_to_engine_config() {
    let m: MatchConfig = MatchingConfig { threshold: 0.75, oracle_timeout_ms: 250 }.into();
    assert_eq!(m.oracle_timeout, Duration::from_millis(250));
    assert!((m.threshold - 0.75).abs() < f32::EPSILON);
  }
}
