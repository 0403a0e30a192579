//! Outbound request and classified outcome types.

use std::time::Duration;

use bytes::Bytes;
use secrecy::Secret;
use serde_json::Value;

use crate::error::{Error, Result};

/// HTTP method of an outbound call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamMethod {
    Get,
    Post,
    Delete,
}

impl UpstreamMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

/// Body of an outbound call.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Form(Vec<(String, String)>),
}

/// One outbound call to a named upstream resource.
///
/// `query` is forwarded verbatim; callers strip internal control parameters
/// before building the request (see [`crate::types::query::forwardable`]).
#[derive(Debug, Clone)]
pub struct UpstreamRequest {
    pub method: UpstreamMethod,
    /// Absolute URL without query string.
    pub url: String,
    pub query: Vec<(String, String)>,
    pub bearer: Option<Secret<String>>,
    pub body: RequestBody,
}

impl UpstreamRequest {
    pub fn new(method: UpstreamMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            query: Vec::new(),
            bearer: None,
            body: RequestBody::Empty,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(UpstreamMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(UpstreamMethod::Post, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(UpstreamMethod::Delete, url)
    }

    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    pub fn with_bearer(mut self, token: Option<Secret<String>>) -> Self {
        self.bearer = token;
        self
    }

    pub fn with_form(mut self, fields: Vec<(String, String)>) -> Self {
        self.body = RequestBody::Form(fields);
        self
    }
}

/// Response payload, decoded according to the declared content type.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Json(Value),
    Binary(Bytes),
}

impl Payload {
    /// Decode a body. JSON content types are parsed; a body that claims JSON
    /// but does not parse is kept as raw bytes and replayed untouched.
    pub fn decode(content_type: &str, body: Bytes) -> Self {
        if is_json(content_type) {
            if let Ok(value) = serde_json::from_slice(&body) {
                return Self::Json(value);
            }
        }
        Self::Binary(body)
    }

    pub fn to_bytes(&self) -> Result<Bytes> {
        match self {
            Self::Json(value) => Ok(Bytes::from(serde_json::to_vec(value)?)),
            Self::Binary(bytes) => Ok(bytes.clone()),
        }
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Self::Json(value) => Some(value),
            Self::Binary(_) => None,
        }
    }
}

fn is_json(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

/// A successful upstream response, replayable from the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub payload: Payload,
    pub content_type: String,
}

impl UpstreamResponse {
    pub fn json(value: Value) -> Self {
        Self {
            payload: Payload::Json(value),
            content_type: "application/json".into(),
        }
    }

    pub fn binary(body: impl Into<Bytes>, content_type: impl Into<String>) -> Self {
        Self {
            payload: Payload::Binary(body.into()),
            content_type: content_type.into(),
        }
    }
}

/// Classified result of one gateway call. Every caller must handle each case.
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamOutcome {
    Success(UpstreamResponse),
    UpstreamError { status: u16, body: String },
    Throttled { retry_after: Duration },
    Timeout,
    TransportFailure(String),
}

impl UpstreamOutcome {
    /// Metric/log label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::UpstreamError { .. } => "upstream_error",
            Self::Throttled { .. } => "throttled",
            Self::Timeout => "timeout",
            Self::TransportFailure(_) => "transport_failure",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Convert into the error taxonomy.
    pub fn into_result(self) -> Result<UpstreamResponse> {
        match self {
            Self::Success(response) => Ok(response),
            Self::UpstreamError { status, body } => Err(Error::UpstreamRejected { status, body }),
            Self::Throttled { retry_after } => Err(Error::UpstreamThrottled { retry_after }),
            Self::Timeout => Err(Error::Timeout),
            Self::TransportFailure(cause) => Err(Error::Transport(cause)),
        }
    }
}
