//! `/api/chapter/:id` and the read marker.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::HeaderMap,
};
use axum_extra::extract::CookieJar;

use mikareads_core::types::{CacheKey, UpstreamRequest};

use crate::{
    error::ApiError,
    proxy::{fetch_through_cache, Proxied},
    routes::{bearer_token, validate_id},
    state::AppState,
};

/// Page server lookup for the reader.
pub async fn get_chapter(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Proxied, ApiError> {
    let id = validate_id(&id)?;
    let url = format!(
        "{}/at-home/server/{}",
        state.config.upstream.api_base_url.trim_end_matches('/'),
        id
    );

    let (response, status) = fetch_through_cache(
        &state,
        CacheKey::for_resource("chapter", id, &[]),
        Duration::from_secs(state.config.cache.chapter_ttl_secs),
        UpstreamRequest::get(url),
    )
    .await?;
    Ok(Proxied::cached(response, status))
}

pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Proxied, ApiError> {
    let token = bearer_token(&jar, &headers)?;
    let url = format!(
        "{}/chapter/{}/read",
        state.config.upstream.api_base_url.trim_end_matches('/'),
        validate_id(&id)?
    );

    let response = state
        .gateway
        .call(&UpstreamRequest::post(url).with_bearer(Some(token)))
        .await
        .into_result()?;
    tracing::debug!(chapter_id = %id, "Marked chapter read");
    Ok(Proxied::direct(response))
}
