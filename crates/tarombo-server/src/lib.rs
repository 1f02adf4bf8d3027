//! HTTP server layer for Tarombo.
//!
//! Wraps the [`tarombo_api`] router with Basic auth and request tracing,
//! and owns runtime configuration. Page rendering and the contributor UI
//! live elsewhere; this process serves the JSON API they consume.

pub mod auth;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, middleware, routing::get};
use serde::Deserialize;
use tarombo_core::store::LineageStore;
use tower_http::trace::TraceLayer;

use auth::AuthConfig;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` with
/// `TAROMBO_*` environment overrides.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:               String,
  pub port:               u16,
  pub store_path:         PathBuf,
  pub auth_username:      String,
  pub auth_password_hash: String,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the server.
#[derive(Clone)]
pub struct AppState<S: LineageStore> {
  pub store:  Arc<S>,
  pub config: Arc<ServerConfig>,
  pub auth:   Arc<AuthConfig>,
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the server [`Router`]: the API under `/api` behind Basic auth, an
/// unauthenticated health probe, and tracing over everything.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: LineageStore + 'static,
{
  Router::new()
    .nest("/api", tarombo_api::api_router(state.store.clone()))
    .layer(middleware::from_fn_with_state(
      state.auth.clone(),
      auth::require_basic,
    ))
    .route("/healthz", get(healthz))
    .layer(TraceLayer::new_for_http())
}

async fn healthz() -> &'static str { "ok" }

// ─── Integration tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use axum::{
    body::Body,
    http::{Request, StatusCode, header},
  };
  use base64::Engine as _;
  use base64::engine::general_purpose::STANDARD as B64;
  use rand_core::OsRng;
  use tarombo_store_sqlite::SqliteStore;
  use tower::ServiceExt as _;

  async fn make_state(password: &str) -> AppState<SqliteStore> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let salt  = SaltString::generate(&mut OsRng);
    let hash  = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();

    AppState {
      store:  Arc::new(store),
      config: Arc::new(ServerConfig {
        host:               "127.0.0.1".to_string(),
        port:               7311,
        store_path:         PathBuf::from(":memory:"),
        auth_username:      "admin".to_string(),
        auth_password_hash: hash.clone(),
      }),
      auth: Arc::new(AuthConfig {
        username:      "admin".to_string(),
        password_hash: hash,
      }),
    }
  }

  fn auth_header(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[tokio::test]
  async fn healthz_needs_no_auth() {
    let state = make_state("secret").await;
    let resp = router(state)
      .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn api_requires_auth() {
    let state = make_state("secret").await;
    let resp = router(state)
      .oneshot(
        Request::builder()
          .uri("/api/persons")
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(resp.headers().contains_key(header::WWW_AUTHENTICATE));
  }

  #[tokio::test]
  async fn api_accepts_valid_credentials() {
    let state = make_state("secret").await;
    let resp = router(state)
      .oneshot(
        Request::builder()
          .uri("/api/persons")
          .header(header::AUTHORIZATION, auth_header("admin", "secret"))
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn api_rejects_bad_password() {
    let state = make_state("secret").await;
    let resp = router(state)
      .oneshot(
        Request::builder()
          .uri("/api/persons")
          .header(header::AUTHORIZATION, auth_header("admin", "wrong"))
          .body(Body::empty())
          .unwrap(),
      )
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
  }
}
