//! Error types for Mikareads.

use std::time::Duration;

use thiserror::Error;

/// Result type alias using Mikareads' Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Mikareads.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Caller Errors
    // =========================================================================
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Not authenticated: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Too many requests, retry after {}ms", .retry_after.as_millis())]
    RateLimited { retry_after: Duration },

    // =========================================================================
    // Upstream Errors
    // =========================================================================
    #[error("Upstream returned {status}")]
    UpstreamRejected { status: u16, body: String },

    #[error("Upstream throttled, retry after {}ms", .retry_after.as_millis())]
    UpstreamThrottled { retry_after: Duration },

    #[error("Upstream request timed out")]
    Timeout,

    #[error("Upstream transport failure: {0}")]
    Transport(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create an authentication error.
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Create a not-found error.
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Suggested wait for 429 responses.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after } | Self::UpstreamThrottled { retry_after } => {
                Some(*retry_after)
            }
            _ => None,
        }
    }

    /// HTTP status code this error surfaces as at the boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Unauthorized(_) => 401,
            Self::NotFound(_) => 404,
            Self::UpstreamRejected { status, .. } => *status,
            Self::RateLimited { .. } | Self::UpstreamThrottled { .. } => 429,
            Self::Timeout => 504,
            Self::Transport(_) | Self::Config(_) | Self::Serialization(_) | Self::Internal(_) => {
                500
            }
        }
    }

    /// Stable machine-readable code for error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::RateLimited { .. } => "RATE_LIMITED",
            Self::UpstreamRejected { .. } => "UPSTREAM_REJECTED",
            Self::UpstreamThrottled { .. } => "UPSTREAM_THROTTLED",
            Self::Timeout => "TIMEOUT",
            Self::Transport(_) => "TRANSPORT_FAILURE",
            Self::Config(_) | Self::Serialization(_) | Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
