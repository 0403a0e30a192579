//! HTTP handlers, one module per resource family.

pub mod auth;
pub mod chapter;
pub mod health;
pub mod images;
pub mod manga;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use axum_extra::extract::CookieJar;
use secrecy::Secret;

use mikareads_core::{Error, Result};

/// Cookie holding the upstream access token.
pub const TOKEN_COOKIE: &str = "mangadex_token";
/// Cookie holding the upstream refresh token.
pub const REFRESH_COOKIE: &str = "mangadex_refresh";

/// Reject identifiers that could escape their path segment upstream.
pub(crate) fn validate_id(id: &str) -> Result<&str> {
    let valid = !id.is_empty()
        && id.len() <= 64
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(id)
    } else {
        Err(Error::invalid_request(format!("Invalid identifier '{}'", id)))
    }
}

/// Access token from the session cookie, else from `Authorization: Bearer`.
pub(crate) fn bearer_token(jar: &CookieJar, headers: &HeaderMap) -> Result<Secret<String>> {
    if let Some(cookie) = jar.get(TOKEN_COOKIE) {
        if !cookie.value().is_empty() {
            return Ok(Secret::new(cookie.value().to_string()));
        }
    }

    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(|token| Secret::new(token.to_string()))
        .ok_or_else(|| Error::unauthorized("Not authenticated"))
}
