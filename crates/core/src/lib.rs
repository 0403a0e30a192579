#![deny(unused)]
//! Core types, traits, and error definitions for Mikareads.
//!
//! This crate provides the building blocks shared by the gateway and the
//! binary: the error taxonomy, configuration, the upstream request/outcome
//! model and the traits that sit at the seams between them.

pub mod config;
pub mod error;
pub mod mocks;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::*;
pub use types::*;
