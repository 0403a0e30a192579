//! `/api/manga/:id` and follow actions.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
};
use axum_extra::extract::CookieJar;

use mikareads_core::types::{forwardable, wants_feed, CacheKey, UpstreamRequest};

use crate::{
    error::ApiError,
    proxy::{fetch_through_cache, Proxied},
    routes::{bearer_token, validate_id},
    state::AppState,
};

/// Manga details, or its chapter feed when `feed=true`.
pub async fn get_manga(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Proxied, ApiError> {
    let id = validate_id(&id)?;
    let base = state.config.upstream.api_base_url.trim_end_matches('/');
    let cache = &state.config.cache;

    let (resource, url, ttl) = if wants_feed(&params) {
        (
            "feed",
            format!("{}/manga/{}/feed", base, id),
            cache.feed_ttl_secs,
        )
    } else {
        ("manga", format!("{}/manga/{}", base, id), cache.manga_ttl_secs)
    };

    let key = CacheKey::for_resource(resource, id, &params);
    let request = UpstreamRequest::get(url).with_query(forwardable(&params));

    let (response, status) =
        fetch_through_cache(&state, key, Duration::from_secs(ttl), request).await?;
    Ok(Proxied::cached(response, status))
}

pub async fn follow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Proxied, ApiError> {
    let token = bearer_token(&jar, &headers)?;
    let url = follow_url(&state, validate_id(&id)?);

    let response = state
        .gateway
        .call(&UpstreamRequest::post(url).with_bearer(Some(token)))
        .await
        .into_result()?;
    tracing::info!(manga_id = %id, "Followed manga");
    Ok(Proxied::direct(response))
}

/// Exposed as POST; upstream expects DELETE on the follow resource.
pub async fn unfollow(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<Proxied, ApiError> {
    let token = bearer_token(&jar, &headers)?;
    let url = follow_url(&state, validate_id(&id)?);

    let response = state
        .gateway
        .call(&UpstreamRequest::delete(url).with_bearer(Some(token)))
        .await
        .into_result()?;
    tracing::info!(manga_id = %id, "Unfollowed manga");
    Ok(Proxied::direct(response))
}

fn follow_url(state: &AppState, id: &str) -> String {
    format!(
        "{}/manga/{}/follow",
        state.config.upstream.api_base_url.trim_end_matches('/'),
        id
    )
}
