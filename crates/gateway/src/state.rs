//! Shared application state.

use std::sync::Arc;
use std::time::Duration;

use mikareads_core::{
    config::AppConfig,
    traits::{AdmissionController, ResponseCache, UpstreamTransport},
};

use crate::{
    admission::SlidingWindowLimiter,
    cache::InMemoryResponseCache,
    host_policy::ImageHostPolicy,
    upstream::{RetryPolicy, UpstreamGateway},
};

/// Everything a handler needs, constructed once at start-up and injected.
pub struct AppState {
    /// Loaded configuration.
    pub config: Arc<AppConfig>,
    /// Outbound calls with deadline and throttle retry.
    pub gateway: UpstreamGateway,
    /// Response cache.
    pub cache: Arc<dyn ResponseCache>,
    /// Per-client throttle.
    pub admission: Arc<dyn AdmissionController>,
    /// Hosts the generic image proxy may reach.
    pub image_hosts: ImageHostPolicy,
}

impl AppState {
    /// Build fresh in-memory stores around `transport`.
    pub fn new(config: AppConfig, transport: Arc<dyn UpstreamTransport>) -> Self {
        let gateway = UpstreamGateway::new(
            transport,
            RetryPolicy::from_config(&config.retry),
            config.upstream.timeout(),
        );
        let cache = Arc::new(InMemoryResponseCache::with_max_entries(config.cache.max_entries));
        let admission = Arc::new(SlidingWindowLimiter::new(
            config.admission.max_requests,
            config.admission.window(),
        ));
        let image_hosts = ImageHostPolicy::new(config.images.allowed_hosts.clone());

        Self {
            config: Arc::new(config),
            gateway,
            cache,
            admission,
            image_hosts,
        }
    }

    /// Interval between housekeeping sweeps.
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.config.admission.idle_eviction_secs.max(1))
    }

    /// Drop expired cache entries and idle rate windows.
    pub fn sweep(&self) {
        let purged = self.cache.purge_expired();
        let evicted = self.admission.evict_idle(self.sweep_interval());
        if purged > 0 || evicted > 0 {
            tracing::debug!(purged, evicted, "Housekeeping sweep");
        }
    }
}
