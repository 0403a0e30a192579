//! Cover and generic image proxies.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Query, State};
use serde::Deserialize;
use url::Url;

use mikareads_core::{
    types::{CacheKey, UpstreamRequest, UpstreamResponse},
    Error,
};

use crate::{
    error::ApiError,
    proxy::{fetch_through_cache, Proxied},
    routes::validate_id,
    state::AppState,
    transport::DEFAULT_CONTENT_TYPE,
};

/// Images are content-addressed upstream and never change.
pub const IMAGE_CACHE_CONTROL: &str = "public, max-age=31536000, immutable";

const FALLBACK_IMAGE_TYPE: &str = "image/jpeg";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoverParams {
    pub manga_id: Option<String>,
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProxyImageParams {
    pub url: Option<String>,
}

pub async fn cover(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CoverParams>,
) -> Result<Proxied, ApiError> {
    let (Some(manga_id), Some(file_name)) = (params.manga_id, params.file_name) else {
        return Err(Error::invalid_request("Missing mangaId or fileName").into());
    };
    let manga_id = validate_id(&manga_id)?;
    if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
        return Err(Error::invalid_request("Invalid cover path").into());
    }

    let url = cover_url(&state.config.upstream.uploads_base_url, manga_id, &file_name)?;
    fetch_image(&state, url.to_string()).await
}

/// `{uploads}/covers/{manga_id}/{file_name}` with each segment percent-encoded,
/// so a file name cannot add a query or fragment.
fn cover_url(uploads_base: &str, manga_id: &str, file_name: &str) -> Result<Url, Error> {
    let mut url = Url::parse(uploads_base)
        .map_err(|e| Error::internal(format!("Invalid uploads base URL: {}", e)))?;
    url.path_segments_mut()
        .map_err(|_| Error::internal("Uploads base URL cannot carry a path"))?
        .pop_if_empty()
        .extend(["covers", manga_id, file_name]);
    Ok(url)
}

pub async fn proxy_image(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ProxyImageParams>,
) -> Result<Proxied, ApiError> {
    let raw = params
        .url
        .filter(|url| !url.is_empty())
        .ok_or_else(|| Error::invalid_request("Missing url parameter"))?;
    let url = state.image_hosts.check(&raw)?;
    fetch_image(&state, url.to_string()).await
}

async fn fetch_image(state: &AppState, url: String) -> Result<Proxied, ApiError> {
    let key = CacheKey::for_url("image", &url);
    let ttl = Duration::from_secs(state.config.cache.image_ttl_secs);

    let (response, status) = fetch_through_cache(state, key, ttl, UpstreamRequest::get(url)).await?;
    Ok(Proxied::cached(with_image_type(response), status).with_cache_control(IMAGE_CACHE_CONTROL))
}

fn with_image_type(mut response: UpstreamResponse) -> UpstreamResponse {
    if response.content_type.is_empty() || response.content_type == DEFAULT_CONTENT_TYPE {
        response.content_type = FALLBACK_IMAGE_TYPE.to_string();
    }
    response
}
