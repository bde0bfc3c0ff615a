//! Shared primitives, traits, and utilities for the pulsar search workspace.
//!
//! `pulsar-core` provides the foundation the kernel-generation crates build on:
//!
//! - **Error types**: [`PulsarError`] and [`Result`] for structured error handling
//! - **Traits**: [`Summarizable`] and [`ContentAddressable`]
//! - **Hashing**: SHA-256 content addressing for generated kernel sources

pub mod error;
pub mod hash;
pub mod traits;

pub use error::{PulsarError, Result};
pub use traits::*;
