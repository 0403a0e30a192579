//! Upstream gateway: deadline and throttle retry around a transport.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use mikareads_core::{
    config::RetryConfig,
    traits::UpstreamTransport,
    types::{UpstreamOutcome, UpstreamRequest},
};
use mikareads_observability::{track_throttle_retry, track_upstream};

/// Bounded retry on upstream throttling. Nothing else is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Additional attempts after the first.
    pub max_retries: u32,
    /// Upper bound on a single wait, whatever the upstream hint says.
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, max_backoff: Duration) -> Self {
        Self {
            max_retries,
            max_backoff,
        }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(config.max_retries, Duration::from_millis(config.max_backoff_ms))
    }

    /// How long to wait before retrying after `outcome`, given `retries` already
    /// made; `None` means return the outcome to the caller.
    pub fn next_wait(&self, outcome: &UpstreamOutcome, retries: u32) -> Option<Duration> {
        match outcome {
            UpstreamOutcome::Throttled { retry_after } if retries < self.max_retries => {
                Some((*retry_after).min(self.max_backoff))
            }
            _ => None,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_millis(3000))
    }
}

/// Performs one logical upstream call: attempts, throttle backoff and a
/// deadline covering all of it. Touches neither the cache nor the limiter.
#[derive(Clone)]
pub struct UpstreamGateway {
    transport: Arc<dyn UpstreamTransport>,
    retry: RetryPolicy,
    timeout: Duration,
}

impl UpstreamGateway {
    pub fn new(transport: Arc<dyn UpstreamTransport>, retry: RetryPolicy, timeout: Duration) -> Self {
        Self {
            transport,
            retry,
            timeout,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run the call. When the deadline fires the in-flight attempt is dropped
    /// and [`UpstreamOutcome::Timeout`] is returned.
    pub async fn call(&self, request: &UpstreamRequest) -> UpstreamOutcome {
        match tokio::time::timeout(self.timeout, self.call_with_retry(request)).await {
            Ok(outcome) => outcome,
            Err(_) => {
                track_upstream("timeout", self.timeout);
                tracing::error!(
                    url = %request.url,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "Upstream call exceeded deadline"
                );
                UpstreamOutcome::Timeout
            }
        }
    }

    async fn call_with_retry(&self, request: &UpstreamRequest) -> UpstreamOutcome {
        let mut retries = 0;
        loop {
            let started = Instant::now();
            let outcome = self.transport.execute(request).await;
            track_upstream(outcome.label(), started.elapsed());

            match &outcome {
                UpstreamOutcome::UpstreamError { status, .. } => {
                    tracing::warn!(url = %request.url, status, "Upstream rejected request");
                }
                UpstreamOutcome::TransportFailure(cause) => {
                    tracing::error!(url = %request.url, cause = %cause, "Upstream transport failure");
                }
                _ => {}
            }

            let Some(wait) = self.retry.next_wait(&outcome, retries) else {
                if matches!(outcome, UpstreamOutcome::Throttled { .. }) {
                    tracing::warn!(
                        url = %request.url,
                        attempts = retries + 1,
                        "Upstream still throttling, giving up"
                    );
                }
                return outcome;
            };

            retries += 1;
            track_throttle_retry();
            tracing::warn!(
                url = %request.url,
                attempt = retries,
                wait_ms = wait.as_millis() as u64,
                "Upstream throttled, backing off"
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mikareads_core::mocks::ScriptedTransport;
    use mikareads_core::types::UpstreamResponse;
    use serde_json::json;

    fn throttled(ms: u64) -> UpstreamOutcome {
        UpstreamOutcome::Throttled {
            retry_after: Duration::from_millis(ms),
        }
    }

    fn gateway(transport: Arc<ScriptedTransport>) -> UpstreamGateway {
        UpstreamGateway::new(transport, RetryPolicy::default(), Duration::from_secs(25))
    }

    #[test]
    fn test_next_wait_caps_hint() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.next_wait(&throttled(10_000), 0),
            Some(Duration::from_millis(3000))
        );
        assert_eq!(
            policy.next_wait(&throttled(500), 1),
            Some(Duration::from_millis(500))
        );
        assert_eq!(policy.next_wait(&throttled(500), 2), None);
        assert_eq!(policy.next_wait(&UpstreamOutcome::Timeout, 0), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_always_throttled_makes_bounded_attempts() {
        let transport = Arc::new(ScriptedTransport::always(throttled(500)));
        let started = Instant::now();

        let outcome = gateway(transport.clone())
            .call(&UpstreamRequest::get("https://api.example/manga/1"))
            .await;

        assert_eq!(outcome, throttled(500));
        assert_eq!(transport.call_count(), 3);
        // Two waits of 500ms each
        assert!(started.elapsed() >= Duration::from_millis(1000));
        assert!(started.elapsed() < Duration::from_millis(1100));
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_throttle() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            throttled(200),
            UpstreamOutcome::Success(UpstreamResponse::json(json!({"result": "ok"}))),
        ]));

        let outcome = gateway(transport.clone())
            .call(&UpstreamRequest::get("https://api.example/manga/1"))
            .await;

        assert!(outcome.is_success());
        assert_eq!(transport.call_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_are_not_retried() {
        let transport = Arc::new(ScriptedTransport::always(UpstreamOutcome::UpstreamError {
            status: 404,
            body: "not found".into(),
        }));

        let outcome = gateway(transport.clone())
            .call(&UpstreamRequest::get("https://api.example/manga/missing"))
            .await;

        assert_eq!(outcome.label(), "upstream_error");
        assert_eq!(transport.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_yields_timeout() {
        let transport = Arc::new(
            ScriptedTransport::json(json!({})).with_delay(Duration::from_secs(60)),
        );

        let outcome = gateway(transport.clone())
            .call(&UpstreamRequest::get("https://api.example/at-home/server/c1"))
            .await;

        assert_eq!(outcome, UpstreamOutcome::Timeout);
        assert_eq!(transport.call_count(), 1);
    }
}
