#![deny(unused)]
//! Logging and metrics for Mikareads.
//!
//! This crate provides:
//! - Tracing subscriber setup (text or JSON, optional OTLP export)
//! - Prometheus recorder installation
//! - Helpers recording cache, upstream and admission metrics

pub mod metrics;
pub mod tracing_layer;

pub use metrics::{
    setup_metrics_recorder, track_admission_denied, track_cache_lookup, track_throttle_retry,
    track_upstream,
};
pub use tracing_layer::configure_tracing;
