//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Binance WebSocket transport and trade frame codec.
pub mod binance;

/// Broadcast channel adapters for trade fan-out.
pub mod broadcast;

/// Configuration loading.
pub mod config;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Storage adapters for trade records.
pub mod storage;

/// OpenTelemetry tracing integration.
pub mod telemetry;
