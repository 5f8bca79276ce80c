//! # Authentication
//!
//! HTTP Basic auth over a single credential pair configured at startup.
//! Comparison is constant-time for both username and password, and failures
//! are a generic 401 with no field-level detail.

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use subtle::ConstantTimeEq;

use crate::api::errors::ApiError;

/// The configured credential pair.
#[derive(Clone)]
pub struct BasicCredentials {
    username: String,
    password: String,
}

impl BasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Constant-time comparison of both halves; evaluates both before
    /// combining so a username mismatch costs the same as a password one.
    ///
    /// An unconfigured pair (either half empty) never matches: a deployment
    /// without credentials must reject everything, not accept `Basic :`.
    fn verify(&self, username: &str, password: &str) -> bool {
        if self.username.is_empty() || self.password.is_empty() {
            return false;
        }
        let user_ok = self.username.as_bytes().ct_eq(username.as_bytes());
        let pass_ok = self.password.as_bytes().ct_eq(password.as_bytes());
        bool::from(user_ok & pass_ok)
    }
}

/// Axum middleware rejecting any request without valid Basic credentials.
pub async fn require_basic_auth(
    State(credentials): State<Arc<BasicCredentials>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(ApiError::Auth)?;

    let encoded = header.strip_prefix("Basic ").ok_or(ApiError::Auth)?;
    let decoded = BASE64.decode(encoded).map_err(|_| ApiError::Auth)?;
    let decoded = String::from_utf8(decoded).map_err(|_| ApiError::Auth)?;
    let (username, password) = decoded.split_once(':').ok_or(ApiError::Auth)?;

    if !credentials.verify(username, password) {
        return Err(ApiError::Auth);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_accepts_exact_match() {
        let creds = BasicCredentials::new("admin", "secret");
        assert!(creds.verify("admin", "secret"));
    }

    #[test]
    fn test_verify_rejects_partial_match() {
        let creds = BasicCredentials::new("admin", "secret");
        assert!(!creds.verify("admin", "wrong"));
        assert!(!creds.verify("wrong", "secret"));
        assert!(!creds.verify("", ""));
    }

    #[test]
    fn test_verify_rejects_length_mismatch() {
        let creds = BasicCredentials::new("admin", "secret");
        assert!(!creds.verify("admin", "secret-but-longer"));
    }

    #[test]
    fn test_unconfigured_credentials_never_match() {
        let creds = BasicCredentials::new("", "");
        assert!(!creds.verify("", ""));

        let creds = BasicCredentials::new("admin", "");
        assert!(!creds.verify("admin", ""));
    }
}
