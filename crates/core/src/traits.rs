//! Core traits for Mikareads.
//!
//! These traits are the seams between the request handlers and the three
//! concerns composed around an outbound call, so each can be swapped out in
//! tests or replaced by another backend.

use std::time::Duration;

use async_trait::async_trait;

use crate::types::{CacheKey, UpstreamOutcome, UpstreamRequest, UpstreamResponse};

// =============================================================================
// Upstream
// =============================================================================

/// Performs a single outbound call and classifies the result.
///
/// Implementations never return a raw transport error: every failure mode is
/// folded into an [`UpstreamOutcome`]. Retries and deadlines are applied by the
/// caller.
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    async fn execute(&self, request: &UpstreamRequest) -> UpstreamOutcome;
}

// =============================================================================
// Response Cache
// =============================================================================

/// Time-to-live keyed store for upstream responses.
pub trait ResponseCache: Send + Sync {
    /// Return the value stored under `key` if it has not expired.
    fn lookup(&self, key: &CacheKey) -> Option<UpstreamResponse>;

    /// Store `value` under `key`, replacing any previous entry.
    /// A zero `ttl` means the value is not cached.
    fn store(&self, key: CacheKey, value: UpstreamResponse, ttl: Duration);

    /// Drop every expired entry. Returns the number removed.
    fn purge_expired(&self) -> usize;

    /// Number of physically present entries, expired or not.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// Admission Controller
// =============================================================================

/// Per-identity request throttle.
pub trait AdmissionController: Send + Sync {
    /// Record a request for `identity` if it is under the limit.
    /// Returns `false` (without recording) when the limit is reached.
    fn check_and_record(&self, identity: &str) -> bool;

    /// Forget identities with no request in the last `idle_for`.
    /// Returns the number of windows evicted.
    fn evict_idle(&self, idle_for: Duration) -> usize;
}
