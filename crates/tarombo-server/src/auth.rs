//! HTTP Basic-auth middleware and standalone verifier.
//!
//! The wider identity/role story (token login, social sign-in) lives in an
//! external collaborator; this server only needs to gate the API behind one
//! set of admin credentials, verified against an argon2 PHC hash.

use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::{Request, State},
  http::{HeaderMap, StatusCode, header},
  middleware::Next,
  response::{IntoResponse, Response},
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

/// Credentials accepted as valid for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// 401 with the challenge header; the only failure this module produces.
pub struct Unauthorized;

impl IntoResponse for Unauthorized {
  fn into_response(self) -> Response {
    (
      StatusCode::UNAUTHORIZED,
      [(header::WWW_AUTHENTICATE, "Basic realm=\"tarombo\"")],
      "authentication required",
    )
      .into_response()
  }
}

/// Verify credentials directly from headers.
pub fn verify_basic(headers: &HeaderMap, config: &AuthConfig) -> Result<(), Unauthorized> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Unauthorized)?;

  let encoded = header_val.strip_prefix("Basic ").ok_or(Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Unauthorized)?;

  if username != config.username {
    return Err(Unauthorized);
  }

  let parsed_hash =
    PasswordHash::new(&config.password_hash).map_err(|_| Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Unauthorized)?;

  Ok(())
}

/// axum middleware gating everything registered before it.
pub async fn require_basic(
  State(config): State<Arc<AuthConfig>>,
  request: Request,
  next: Next,
) -> Response {
  match verify_basic(request.headers(), &config) {
    Ok(()) => next.run(request).await,
    Err(unauthorized) => unauthorized.into_response(),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
  use rand_core::OsRng;

  fn config(password: &str) -> AuthConfig {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .unwrap()
      .to_string();
    AuthConfig { username: "admin".to_string(), password_hash: hash }
  }

  fn headers_with(value: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(header::AUTHORIZATION, value.parse().unwrap());
    headers
  }

  fn basic(user: &str, pass: &str) -> String {
    format!("Basic {}", B64.encode(format!("{user}:{pass}")))
  }

  #[test]
  fn correct_credentials() {
    let cfg = config("secret");
    let headers = headers_with(&basic("admin", "secret"));
    assert!(verify_basic(&headers, &cfg).is_ok());
  }

  #[test]
  fn wrong_password() {
    let cfg = config("secret");
    let headers = headers_with(&basic("admin", "wrong"));
    assert!(verify_basic(&headers, &cfg).is_err());
  }

  #[test]
  fn wrong_username() {
    let cfg = config("secret");
    let headers = headers_with(&basic("intruder", "secret"));
    assert!(verify_basic(&headers, &cfg).is_err());
  }

  #[test]
  fn missing_header() {
    let cfg = config("secret");
    assert!(verify_basic(&HeaderMap::new(), &cfg).is_err());
  }

  #[test]
  fn invalid_base64() {
    let cfg = config("secret");
    let headers = headers_with("Basic !!!not-base64!!!");
    assert!(verify_basic(&headers, &cfg).is_err());
  }
}
