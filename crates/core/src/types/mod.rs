//! Core type definitions for Mikareads.
//!
//! Broken down into submodules for better maintainability.

pub mod cache;
pub mod query;
pub mod upstream;

pub use cache::*;
pub use query::*;
pub use upstream::*;
