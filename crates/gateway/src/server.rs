//! Axum-based HTTP server for the front-end.

use axum::{
    http::Uri,
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;
use tokio::{net::TcpListener, task::JoinHandle};
use tower_http::trace::TraceLayer;

use mikareads_core::{Error, Result};

use crate::{
    admission, cors,
    error::{self, ApiError},
    routes::{auth, chapter, health, images, manga},
    state::AppState,
};

/// Front-end server.
pub struct GatewayServer {
    state: Arc<AppState>,
    metrics_handle: Option<PrometheusHandle>,
}

impl GatewayServer {
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
            metrics_handle: None,
        }
    }

    /// Expose `/metrics` from `handle`.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }

    /// Build the router.
    ///
    /// Upstream-bound resource routes sit behind admission control. Every
    /// response, including errors and pre-flight answers, is CORS-decorated.
    pub fn build_router(&self) -> Router {
        let proxied = Router::new()
            .route("/api/manga/:id", get(manga::get_manga))
            .route("/api/manga/:id/follow", post(manga::follow))
            .route("/api/manga/:id/unfollow", post(manga::unfollow))
            .route("/api/chapter/:id", get(chapter::get_chapter))
            .route("/api/chapter/:id/read", post(chapter::mark_read))
            .route("/api/cover", get(images::cover))
            .route("/api/proxy-image", get(images::proxy_image))
            .route_layer(middleware::from_fn_with_state(
                self.state.clone(),
                admission::enforce,
            ));

        let session = Router::new()
            .route("/api/auth/login", get(auth::login))
            .route("/api/auth/callback", get(auth::callback))
            .route("/api/auth/refresh", post(auth::refresh))
            .route("/api/auth/me", get(auth::me))
            .route("/api/auth/logout", post(auth::logout));

        let mut router = Router::new()
            .route("/health", get(health::health))
            .merge(proxied)
            .merge(session)
            .fallback(not_found)
            .with_state(self.state.clone());

        if let Some(handle) = self.metrics_handle.clone() {
            router = router.route("/metrics", get(move || async move { handle.render() }));
        }

        router = cors::decorate(router.layer(middleware::from_fn(error::error_cache_directive)));

        if self.state.config.server.enable_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        router
    }

    /// Bind the configured address and serve until a shutdown signal.
    pub async fn run(self) -> Result<()> {
        let addr = format!(
            "{}:{}",
            self.state.config.server.host, self.state.config.server.port
        );
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| Error::internal(format!("Failed to bind {}: {}", addr, e)))?;

        tracing::info!(addr = %addr, "Mikareads server starting");
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let janitor = spawn_janitor(self.state.clone());

        let served = axum::serve(listener, self.build_router())
            .with_graceful_shutdown(shutdown_signal())
            .await;
        janitor.abort();

        served.map_err(|e| Error::internal(format!("Server error: {}", e)))?;
        tracing::info!("Server stopped");
        Ok(())
    }
}

async fn not_found(uri: Uri) -> ApiError {
    Error::not_found(format!("No route for {}", uri.path())).into()
}

/// Periodic cache purge and idle-window eviction.
fn spawn_janitor(state: Arc<AppState>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(state.sweep_interval());
        // First tick completes immediately
        ticker.tick().await;
        loop {
            ticker.tick().await;
            state.sweep();
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                tracing::info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
