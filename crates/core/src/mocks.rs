//! Mock implementations of core traits for testing.
//!
//! Used by unit tests here and by the gateway's integration tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use serde_json::Value;

use crate::{
    traits::UpstreamTransport,
    types::{UpstreamOutcome, UpstreamRequest, UpstreamResponse},
};

// =============================================================================
// Scripted Transport
// =============================================================================

struct Script {
    /// Matched as a substring of the request URL. Empty matches everything.
    pattern: String,
    outcomes: VecDeque<UpstreamOutcome>,
}

impl Script {
    /// Pop the next outcome; the last one repeats forever.
    fn next(&mut self) -> UpstreamOutcome {
        if self.outcomes.len() > 1 {
            if let Some(outcome) = self.outcomes.pop_front() {
                return outcome;
            }
        }
        self.outcomes
            .front()
            .cloned()
            .unwrap_or_else(|| UpstreamOutcome::TransportFailure("script exhausted".into()))
    }
}

/// Transport that replays scripted outcomes and records every request.
pub struct ScriptedTransport {
    routes: Mutex<Vec<Script>>,
    fallback: Mutex<Script>,
    delay: Option<Duration>,
    requests: Mutex<Vec<UpstreamRequest>>,
}

impl ScriptedTransport {
    /// Replay `outcomes` in order for any URL, repeating the last one.
    pub fn new(outcomes: Vec<UpstreamOutcome>) -> Self {
        Self {
            routes: Mutex::new(Vec::new()),
            fallback: Mutex::new(Script {
                pattern: String::new(),
                outcomes: outcomes.into(),
            }),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Always return the same outcome.
    pub fn always(outcome: UpstreamOutcome) -> Self {
        Self::new(vec![outcome])
    }

    /// Always succeed with a JSON body.
    pub fn json(value: Value) -> Self {
        Self::always(UpstreamOutcome::Success(UpstreamResponse::json(value)))
    }

    /// Use a dedicated script for URLs containing `pattern`.
    pub fn route(self, pattern: &str, outcomes: Vec<UpstreamOutcome>) -> Self {
        self.routes.lock().unwrap().push(Script {
            pattern: pattern.to_string(),
            outcomes: outcomes.into(),
        });
        self
    }

    /// Sleep before answering each call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of calls made so far.
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Every request received, in order.
    pub fn requests(&self) -> Vec<UpstreamRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl UpstreamTransport for ScriptedTransport {
    async fn execute(&self, request: &UpstreamRequest) -> UpstreamOutcome {
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut routes = self.routes.lock().unwrap();
        if let Some(script) = routes
            .iter_mut()
            .find(|s| request.url.contains(s.pattern.as_str()))
        {
            return script.next();
        }
        drop(routes);

        self.fallback.lock().unwrap().next()
    }
}
