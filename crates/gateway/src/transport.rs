//! reqwest-backed upstream transport.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;

use mikareads_core::{
    config::{RetryConfig, UpstreamConfig},
    traits::UpstreamTransport,
    types::{Payload, RequestBody, UpstreamMethod, UpstreamOutcome, UpstreamRequest, UpstreamResponse},
    Error, Result,
};

/// MangaDex reports the instant its rate window reopens as a unix timestamp.
const RATE_LIMIT_RETRY_AFTER: &str = "x-ratelimit-retry-after";

/// Content type assumed when the upstream declares none.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Builds requests from scratch for every call: only the product identifier,
/// the bearer credential and the body headers are ever sent. Inbound headers
/// are never copied, so no referrer or forwarding header can leak upstream.
pub struct HttpTransport {
    client: reqwest::Client,
    user_agent: String,
    default_retry_after: Duration,
}

impl HttpTransport {
    pub fn new(upstream: &UpstreamConfig, retry: &RetryConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(upstream.timeout())
            // The upstream blocks requests that carry a referrer
            .referer(false)
            .build()
            .map_err(|e| Error::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: upstream.user_agent.clone(),
            default_retry_after: Duration::from_millis(retry.default_retry_after_ms),
        })
    }

    /// Build the outbound request.
    pub fn build_request(&self, request: &UpstreamRequest) -> reqwest::Result<reqwest::Request> {
        let method = match request.method {
            UpstreamMethod::Get => Method::GET,
            UpstreamMethod::Post => Method::POST,
            UpstreamMethod::Delete => Method::DELETE,
        };

        let mut builder = self
            .client
            .request(method, &request.url)
            .header(USER_AGENT, &self.user_agent);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Form(fields) => builder.form(fields),
        };

        builder.build()
    }

    async fn classify(&self, response: reqwest::Response) -> UpstreamOutcome {
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = parse_retry_after(response.headers(), Utc::now())
                .unwrap_or(self.default_retry_after);
            return UpstreamOutcome::Throttled { retry_after };
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(DEFAULT_CONTENT_TYPE)
            .to_string();

        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) if e.is_timeout() => return UpstreamOutcome::Timeout,
            Err(e) => return UpstreamOutcome::TransportFailure(e.to_string()),
        };

        if status.is_success() {
            UpstreamOutcome::Success(UpstreamResponse {
                payload: Payload::decode(&content_type, body),
                content_type,
            })
        } else {
            UpstreamOutcome::UpstreamError {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            }
        }
    }
}

#[async_trait]
impl UpstreamTransport for HttpTransport {
    async fn execute(&self, request: &UpstreamRequest) -> UpstreamOutcome {
        let outbound = match self.build_request(request) {
            Ok(outbound) => outbound,
            Err(e) => return UpstreamOutcome::TransportFailure(e.to_string()),
        };

        tracing::debug!(method = request.method.as_str(), url = %request.url, "Calling upstream");

        match self.client.execute(outbound).await {
            Ok(response) => self.classify(response).await,
            Err(e) if e.is_timeout() => UpstreamOutcome::Timeout,
            Err(e) => UpstreamOutcome::TransportFailure(e.to_string()),
        }
    }
}

/// Retry hint from `Retry-After` (delta seconds or HTTP date), falling back to
/// `X-RateLimit-Retry-After` (unix seconds).
pub fn parse_retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    if let Some(raw) = headers.get(RETRY_AFTER).and_then(|v| v.to_str().ok()) {
        let raw = raw.trim();
        if let Ok(seconds) = raw.parse::<f64>() {
            // Negative, NaN or out-of-range hints are ignored
            if let Ok(wait) = Duration::try_from_secs_f64(seconds) {
                return Some(wait);
            }
        }
        if let Ok(at) = DateTime::parse_from_rfc2822(raw) {
            return Some(until(at.with_timezone(&Utc), now));
        }
    }

    headers
        .get(RATE_LIMIT_RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|epoch| DateTime::from_timestamp(epoch, 0))
        .map(|at| until(at, now))
}

fn until(at: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (at - now).to_std().unwrap_or(Duration::ZERO)
}
