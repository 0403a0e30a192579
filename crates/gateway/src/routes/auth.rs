//! OAuth relay against the upstream identity realm.
//!
//! The browser never sees the upstream tokens directly: they are held in
//! HttpOnly cookies and attached as bearer credentials on authenticated calls.
//! Tokens are never validated locally; upstream is the authority.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::{header::LOCATION, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::CookieJar;
use cookie::{Cookie, SameSite};
use secrecy::ExposeSecret;
use serde::Deserialize;
use serde_json::{json, Value};
use time::Duration;
use url::Url;
use uuid::Uuid;

use mikareads_core::{
    config::AuthConfig,
    types::{UpstreamOutcome, UpstreamRequest},
    Error, Result,
};

use crate::{
    error::ApiError,
    routes::{bearer_token, REFRESH_COOKIE, TOKEN_COOKIE},
    state::AppState,
};

/// CSRF state for the authorization round trip.
pub const STATE_COOKIE: &str = "mangadex_oauth_state";
const STATE_COOKIE_PATH: &str = "/api/auth";
const STATE_MAX_AGE_MINUTES: i64 = 10;

/// Token endpoint response.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

/// Start the authorization-code flow.
pub async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> std::result::Result<(CookieJar, Response), ApiError> {
    let auth = &state.config.auth;
    let csrf = Uuid::new_v4().to_string();

    let mut url = Url::parse(&auth.authorize_url)
        .map_err(|e| Error::internal(format!("Invalid authorize URL: {}", e)))?;
    url.query_pairs_mut()
        .append_pair("client_id", &auth.client_id)
        .append_pair("redirect_uri", &auth.redirect_uri())
        .append_pair("response_type", "code")
        .append_pair("scope", "openid")
        .append_pair("state", &csrf);

    let cookie = Cookie::build((STATE_COOKIE, csrf))
        .http_only(true)
        .secure(auth.secure_cookies)
        .same_site(SameSite::Lax)
        .path(STATE_COOKIE_PATH)
        .max_age(Duration::minutes(STATE_MAX_AGE_MINUTES));

    Ok((jar.add(cookie), found(url.as_str())))
}

/// Finish the flow: exchange `code` and store the session cookies.
pub async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> (CookieJar, Response) {
    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let jar = jar.remove(Cookie::build(STATE_COOKIE).path(STATE_COOKIE_PATH));

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "Authorization denied upstream");
        return (jar, login_error(&error));
    }

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return (jar, login_error("no_code"));
    };

    if let Some(expected) = expected {
        if params.state.as_deref() != Some(expected.as_str()) {
            tracing::warn!("OAuth state mismatch");
            return (jar, login_error("state_mismatch"));
        }
    }

    let auth = &state.config.auth;
    let mut fields = vec![
        ("grant_type".to_string(), "authorization_code".to_string()),
        ("code".to_string(), code),
        ("redirect_uri".to_string(), auth.redirect_uri()),
    ];
    fields.extend(client_credentials(auth));

    match exchange(&state, fields).await {
        Ok(tokens) => {
            tracing::info!("Login completed");
            (set_session(jar, tokens, auth), found("/"))
        }
        Err(e) => {
            tracing::error!(error = %e, "Token exchange failed");
            (jar, login_error("auth_failed"))
        }
    }
}

/// Trade the refresh cookie for a fresh token pair.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> std::result::Result<(CookieJar, Json<Value>), ApiError> {
    let refresh_token = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::unauthorized("No refresh token"))?;

    let auth = &state.config.auth;
    let mut fields = vec![
        ("grant_type".to_string(), "refresh_token".to_string()),
        ("refresh_token".to_string(), refresh_token),
    ];
    fields.extend(client_credentials(auth));

    let tokens = exchange(&state, fields).await.map_err(|e| match e {
        Error::UpstreamRejected { status, .. } if status == 400 || status == 401 => {
            Error::unauthorized("Refresh token rejected")
        }
        other => other,
    })?;

    Ok((set_session(jar, tokens, auth), Json(json!({ "success": true }))))
}

/// Current user, as reported upstream.
pub async fn me(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
) -> std::result::Result<Json<Value>, ApiError> {
    let token = bearer_token(&jar, &headers)?;
    let base = state.config.upstream.api_base_url.trim_end_matches('/');

    let check = state
        .gateway
        .call(&UpstreamRequest::get(format!("{}/auth/check", base)).with_bearer(Some(token.clone())))
        .await;
    let check = match check {
        UpstreamOutcome::UpstreamError { status, .. } => {
            tracing::debug!(status, "Token check failed");
            return Err(Error::unauthorized("Invalid token").into());
        }
        other => other.into_result()?,
    };

    let user = state
        .gateway
        .call(&UpstreamRequest::get(format!("{}/user/me", base)).with_bearer(Some(token)))
        .await;
    let user = match user {
        UpstreamOutcome::UpstreamError { status, .. } => {
            return Err(Error::internal(format!("Failed to get user ({})", status)).into());
        }
        other => other.into_result()?,
    };

    let is_authenticated = check
        .payload
        .as_json()
        .and_then(|v| v.get("isAuthenticated"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let user = user
        .payload
        .as_json()
        .and_then(|v| v.get("data"))
        .cloned()
        .unwrap_or(Value::Null);

    Ok(Json(json!({ "isAuthenticated": is_authenticated, "user": user })))
}

pub async fn logout(jar: CookieJar) -> (CookieJar, Json<Value>) {
    let jar = jar
        .remove(Cookie::build(TOKEN_COOKIE).path("/"))
        .remove(Cookie::build(REFRESH_COOKIE).path("/"));
    (jar, Json(json!({ "success": true })))
}

async fn exchange(state: &AppState, fields: Vec<(String, String)>) -> Result<TokenResponse> {
    let request = UpstreamRequest::post(&state.config.auth.token_url).with_form(fields);
    let response = state.gateway.call(&request).await.into_result()?;
    let body = response
        .payload
        .as_json()
        .ok_or_else(|| Error::internal("Token endpoint returned a non-JSON body"))?;
    Ok(serde_json::from_value(body.clone())?)
}

fn client_credentials(auth: &AuthConfig) -> Vec<(String, String)> {
    let mut fields = vec![("client_id".to_string(), auth.client_id.clone())];
    if let Some(secret) = &auth.client_secret {
        fields.push(("client_secret".to_string(), secret.expose_secret().clone()));
    }
    fields
}

fn set_session(jar: CookieJar, tokens: TokenResponse, auth: &AuthConfig) -> CookieJar {
    let max_age = tokens
        .expires_in
        .filter(|secs| *secs > 0)
        .unwrap_or(auth.token_max_age_secs);
    let jar = jar.add(session_cookie(TOKEN_COOKIE, tokens.access_token, max_age, auth));

    match tokens.refresh_token {
        Some(refresh) => jar.add(session_cookie(
            REFRESH_COOKIE,
            refresh,
            auth.refresh_max_age_secs,
            auth,
        )),
        None => jar,
    }
}

fn session_cookie(
    name: &'static str,
    value: String,
    max_age_secs: i64,
    auth: &AuthConfig,
) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(auth.secure_cookies)
        .same_site(SameSite::Lax)
        .path("/")
        .max_age(Duration::seconds(max_age_secs))
        .build()
}

fn login_error(code: &str) -> Response {
    let encoded: String = url::form_urlencoded::byte_serialize(code.as_bytes()).collect();
    found(&format!("/login?error={}", encoded))
}

/// 302 to `location`.
fn found(location: &str) -> Response {
    match HeaderValue::from_str(location) {
        Ok(value) => (StatusCode::FOUND, [(LOCATION, value)]).into_response(),
        Err(_) => ApiError(Error::internal("Invalid redirect target")).into_response(),
    }
}
