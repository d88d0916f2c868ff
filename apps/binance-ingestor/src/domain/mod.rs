//! Domain Layer - Core trade types and ingestion state.
//!
//! This layer contains the core domain types for trade ingestion with no
//! I/O. Everything here is pure Rust with serialization support.

/// Trade record produced by parsing one exchange frame.
pub mod trade;

/// Ordered, single-writer buffer of records awaiting a storage flush.
pub mod batching;

/// Ingestion client lifecycle states.
pub mod streaming;
