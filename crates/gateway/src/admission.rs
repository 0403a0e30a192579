//! Per-client admission control.
//!
//! A sliding-window log keyed by client identity keeps outbound volume under
//! the upstream's published rate limit. The identity is the first address of
//! `X-Forwarded-For`, which any client can forge; the limiter smooths bursts
//! from well-behaved browsers and is not a security boundary.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;

use mikareads_core::{config::AdmissionPolicy, traits::AdmissionController, Error};
use mikareads_observability::track_admission_denied;

use crate::{error::ApiError, state::AppState};

/// Bucket shared by every request without a forwarded-for chain.
pub const UNKNOWN_IDENTITY: &str = "unknown";

/// Sliding-window limiter: at most `max_requests` per trailing `window`.
pub struct SlidingWindowLimiter {
    windows: DashMap<String, VecDeque<Instant>>,
    max_requests: usize,
    window: Duration,
}

impl SlidingWindowLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: DashMap::new(),
            max_requests,
            window,
        }
    }

    /// Number of identities currently tracked.
    pub fn tracked(&self) -> usize {
        self.windows.len()
    }
}

impl AdmissionController for SlidingWindowLimiter {
    fn check_and_record(&self, identity: &str) -> bool {
        let now = Instant::now();

        // The entry guard holds the shard lock for the whole prune/compare/record.
        let mut window = self.windows.entry(identity.to_string()).or_default();
        while let Some(oldest) = window.front() {
            if now.duration_since(*oldest) >= self.window {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() >= self.max_requests {
            return false;
        }

        window.push_back(now);
        true
    }

    fn evict_idle(&self, idle_for: Duration) -> usize {
        let now = Instant::now();
        let before = self.windows.len();
        self.windows.retain(|_, window| {
            window
                .back()
                .is_some_and(|last| now.duration_since(*last) < idle_for)
        });
        before.saturating_sub(self.windows.len())
    }
}

/// First address of the `X-Forwarded-For` chain, or [`UNKNOWN_IDENTITY`].
pub fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|chain| chain.split(',').next())
        .map(str::trim)
        .filter(|first| !first.is_empty())
        .unwrap_or(UNKNOWN_IDENTITY)
        .to_string()
}

/// Middleware applying the configured admission policy before any cache
/// lookup or upstream call.
pub async fn enforce(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let identity = client_identity(request.headers());

    if !state.admission.check_and_record(&identity) {
        match state.config.admission.policy {
            AdmissionPolicy::Delay => {
                let delay = state.config.admission.delay();
                track_admission_denied("delay");
                tracing::warn!(
                    identity = %identity,
                    wait_ms = delay.as_millis() as u64,
                    "Client over rate window, delaying"
                );
                tokio::time::sleep(delay).await;
            }
            AdmissionPolicy::Reject => {
                track_admission_denied("reject");
                tracing::warn!(identity = %identity, "Client over rate window, rejecting");
                return ApiError::from(Error::RateLimited {
                    retry_after: state.config.admission.window(),
                })
                .into_response();
            }
        }
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[tokio::test(start_paused = true)]
    async fn test_window_boundary() {
        let limiter = SlidingWindowLimiter::new(4, Duration::from_secs(1));

        for _ in 0..4 {
            assert!(limiter.check_and_record("1.2.3.4"));
        }
        assert!(!limiter.check_and_record("1.2.3.4"));

        tokio::time::advance(Duration::from_millis(1001)).await;
        assert!(limiter.check_and_record("1.2.3.4"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_denied_requests_are_not_recorded() {
        let limiter = SlidingWindowLimiter::new(2, Duration::from_secs(1));
        assert!(limiter.check_and_record("a"));
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.check_and_record("a"));

        // Denials inside the window must not extend it
        for _ in 0..10 {
            assert!(!limiter.check_and_record("a"));
        }

        // First timestamp ages out, one slot frees up
        tokio::time::advance(Duration::from_millis(500)).await;
        assert!(limiter.check_and_record("a"));
        assert!(!limiter.check_and_record("a"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_identities_are_independent() {
        let limiter = SlidingWindowLimiter::new(1, Duration::from_secs(1));
        assert!(limiter.check_and_record("a"));
        assert!(!limiter.check_and_record("a"));
        assert!(limiter.check_and_record("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_evict_idle_windows() {
        let limiter = SlidingWindowLimiter::new(4, Duration::from_secs(1));
        limiter.check_and_record("old");
        tokio::time::advance(Duration::from_secs(120)).await;
        limiter.check_and_record("fresh");

        assert_eq!(limiter.evict_idle(Duration::from_secs(60)), 1);
        assert_eq!(limiter.tracked(), 1);
    }

    #[test]
    fn test_identity_from_forwarded_chain() {
        let mut headers = HeaderMap::new();
        assert_eq!(client_identity(&headers), UNKNOWN_IDENTITY);

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("1.2.3.4, 10.0.0.1, 10.0.0.2"),
        );
        assert_eq!(client_identity(&headers), "1.2.3.4");

        headers.insert("x-forwarded-for", HeaderValue::from_static(" , 10.0.0.1"));
        assert_eq!(client_identity(&headers), UNKNOWN_IDENTITY);
    }
}
