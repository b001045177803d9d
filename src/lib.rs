//! Proxy Sift - Concurrent Proxy Validation Engine
//!
//! Takes a raw list of candidate proxy endpoints, probes each one under the
//! configured protocols with bounded concurrency, and reports which
//! endpoints are usable, bucketed by protocol and optionally by country.

pub mod engine;

pub use engine::*;

/// Application result type
pub type Result<T> = anyhow::Result<T>;
