#![deny(unused)]
//! HTTP front-end for Mikareads.
//!
//! This crate provides the public HTTP surface: the retrying upstream
//! gateway, the response cache, per-client admission control, CORS
//! decoration and the resource, image and session routes built on them.

pub mod admission;
pub mod cache;
pub mod cors;
pub mod error;
pub mod host_policy;
pub mod proxy;
pub mod routes;
pub mod server;
pub mod state;
pub mod transport;
pub mod upstream;

pub use admission::SlidingWindowLimiter;
pub use cache::InMemoryResponseCache;
pub use error::ApiError;
pub use host_policy::ImageHostPolicy;
pub use server::GatewayServer;
pub use state::AppState;
pub use transport::HttpTransport;
pub use upstream::{RetryPolicy, UpstreamGateway};
