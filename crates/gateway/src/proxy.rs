//! Cache-aware upstream fetch and response rendering.

use std::time::Duration;

use axum::{
    body::Body,
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        HeaderName, HeaderValue, StatusCode,
    },
    response::{IntoResponse, Response},
};

use mikareads_core::{
    types::{CacheKey, UpstreamRequest, UpstreamResponse},
    Result,
};
use mikareads_observability::track_cache_lookup;

use crate::{error::ApiError, state::AppState};

pub const X_CACHE: HeaderName = HeaderName::from_static("x-cache");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheStatus {
    Hit,
    Miss,
}

impl CacheStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hit => "HIT",
            Self::Miss => "MISS",
        }
    }
}

/// Serve `key` from the cache, or call upstream and store the result for `ttl`.
/// Failures are never cached.
pub async fn fetch_through_cache(
    state: &AppState,
    key: CacheKey,
    ttl: Duration,
    request: UpstreamRequest,
) -> Result<(UpstreamResponse, CacheStatus)> {
    if let Some(hit) = state.cache.lookup(&key) {
        track_cache_lookup(true);
        tracing::debug!(key = %key, "Cache HIT");
        return Ok((hit, CacheStatus::Hit));
    }

    track_cache_lookup(false);
    tracing::debug!(key = %key, "Cache MISS");

    let response = state.gateway.call(&request).await.into_result()?;
    state.cache.store(key, response.clone(), ttl);
    Ok((response, CacheStatus::Miss))
}

/// A relayed upstream response.
#[derive(Debug)]
pub struct Proxied {
    pub response: UpstreamResponse,
    pub cache: Option<CacheStatus>,
    pub cache_control: Option<&'static str>,
}

impl Proxied {
    /// Relay without cache annotations.
    pub fn direct(response: UpstreamResponse) -> Self {
        Self {
            response,
            cache: None,
            cache_control: None,
        }
    }

    pub fn cached(response: UpstreamResponse, status: CacheStatus) -> Self {
        Self {
            response,
            cache: Some(status),
            cache_control: None,
        }
    }

    pub fn with_cache_control(mut self, directive: &'static str) -> Self {
        self.cache_control = Some(directive);
        self
    }
}

impl IntoResponse for Proxied {
    fn into_response(self) -> Response {
        let body = match self.response.payload.to_bytes() {
            Ok(body) => body,
            Err(e) => return ApiError(e).into_response(),
        };

        let mut response = Response::new(Body::from(body));
        *response.status_mut() = StatusCode::OK;

        let headers = response.headers_mut();
        if let Ok(content_type) = HeaderValue::from_str(&self.response.content_type) {
            headers.insert(CONTENT_TYPE, content_type);
        }
        if let Some(status) = self.cache {
            headers.insert(X_CACHE, HeaderValue::from_static(status.as_str()));
        }
        if let Some(directive) = self.cache_control {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static(directive));
        }

        response
    }
}
