#![deny(unused)]
//! Mikareads - manga reader front-end.
//!
//! Serves the browser-facing API: cached, rate-aware access to the MangaDex
//! catalogue, image proxying and the OAuth session relay.

use std::sync::Arc;

use mikareads_core::config::AppConfig;
use mikareads_gateway::{AppState, GatewayServer, HttpTransport};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, load_error) = match AppConfig::load() {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    };

    mikareads_observability::configure_tracing(&config.logging)?;

    if let Some(e) = load_error {
        tracing::warn!(error = %e, "Failed to load configuration, using defaults");
    }
    tracing::info!("Starting Mikareads v{}", env!("CARGO_PKG_VERSION"));

    let metrics_handle = mikareads_observability::setup_metrics_recorder()?;

    let transport = Arc::new(HttpTransport::new(&config.upstream, &config.retry)?);
    tracing::info!(
        api = %config.upstream.api_base_url,
        timeout_ms = config.upstream.timeout_ms,
        "Upstream transport initialized"
    );

    if config.auth.client_id.is_empty() {
        tracing::warn!("auth.client_id is not set; login will fail upstream");
    }

    let host = config.server.host.clone();
    let port = config.server.port;
    let policy = config.admission.policy;

    let server = GatewayServer::new(AppState::new(config, transport)).with_metrics(metrics_handle);

    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║  Mikareads v{:<49}║", env!("CARGO_PKG_VERSION"));
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Endpoints:                                                  ║");
    println!("║    GET  /api/manga/:id       - Details (feed=true: chapters) ║");
    println!("║    GET  /api/chapter/:id     - Reader page servers           ║");
    println!("║    GET  /api/cover           - Cover image proxy             ║");
    println!("║    GET  /api/proxy-image     - Page image proxy              ║");
    println!("║    *    /api/auth/*          - OAuth session                 ║");
    println!("║    GET  /health, /metrics                                    ║");
    println!("╠══════════════════════════════════════════════════════════════╣");
    println!("║  Server: {:<52}║", format!("http://{}:{}", host, port));
    println!("║  Admission: {:<49}║", format!("{:?}", policy));
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();

    server.run().await?;

    Ok(())
}
