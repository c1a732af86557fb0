//! Telemetry event naming.
//!
//! The pipeline emits structured `tracing` events with named attributes
//! (store counts, truncation counts, window strategy, boundary-filter
//! reduction, cache verdicts) under a dedicated target so an embedding
//! application can route them to whatever collector it owns. This crate
//! never owns transport; without a subscriber the events cost nothing.

/// Target for every telemetry-bearing event in this crate.
pub const TARGET: &str = "cursor_recall::telemetry";
