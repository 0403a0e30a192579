//! HTTP rendering of the error taxonomy.

use axum::{
    extract::Request,
    http::{
        header::{CACHE_CONTROL, RETRY_AFTER},
        HeaderValue, StatusCode,
    },
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use mikareads_core::Error;

/// Short cache directive so a transient failure is not pinned downstream.
pub const ERROR_CACHE_CONTROL: &str = "public, max-age=60";

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code.
    pub code: &'static str,
    /// Error message.
    pub message: String,
}

/// Wrapper turning [`Error`] into a response.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self.0, "Request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self.0, "Request rejected");
        }

        let body = ErrorResponse {
            code: self.0.code(),
            message: self.0.to_string(),
        };

        let mut response = (status, Json(body)).into_response();
        let headers = response.headers_mut();
        headers.insert(CACHE_CONTROL, HeaderValue::from_static(ERROR_CACHE_CONTROL));

        if let Some(wait) = self.0.retry_after() {
            // Whole seconds, rounded up so clients never retry early
            let secs = wait.as_millis().div_ceil(1000).max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                headers.insert(RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Give error responses produced outside [`ApiError`] (method mismatches,
/// extractor rejections) the same short cache directive.
pub async fn error_cache_directive(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let status = response.status();
    if (status.is_client_error() || status.is_server_error())
        && !response.headers().contains_key(CACHE_CONTROL)
    {
        response
            .headers_mut()
            .insert(CACHE_CONTROL, HeaderValue::from_static(ERROR_CACHE_CONTROL));
    }
    response
}
