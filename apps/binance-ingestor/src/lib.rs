#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Binance Ingestor - Trade Stream Ingestion Client
//!
//! Keeps one WebSocket connection to a Binance trade stream alive
//! indefinitely, parses each frame into a validated trade record, optionally
//! batches records for storage and fans every record out to broadcast
//! subscribers.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `trade`: The validated `TradeRecord`
//!   - `batching`: Flush-on-threshold accumulator
//!   - `streaming`: Client lifecycle states
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Transport, storage and broadcast interfaces
//!   - `services`: The ingestion client state machine
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `binance`: WebSocket transport, reconnect policy, frame codec
//!   - `broadcast`: Topic-keyed channel fan-out
//!   - `storage`: In-memory and JSON Lines stores
//!   - `config`: Environment configuration
//!   - `metrics`, `telemetry`: Observability
//!
//! # Data Flow
//!
//! ```text
//!                                             ┌──────────────┐
//!                                        ┌───►│ StorageSink  │
//! Binance WS ──► Transport ──► Codec ──► Accumulator          └──────────────┘
//!                    ▲                   │    ┌──────────────┐
//!                    │ backoff           └───►│ BroadcastSink│──► subscribers
//!                 Client                      └──────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::batching::BatchAccumulator;
pub use domain::streaming::ClientState;
pub use domain::trade::{NewTrade, TradeRecord, TradeRecordError};

// Ports
pub use application::ports::{
    BroadcastError, BroadcastSink, StorageError, StorageSink, TradeBroadcast, TradeTransport,
    TransportError,
};

// Ingestion client
pub use application::services::{
    ClientHandle, IngestionError, IngestionSettings, IngestionSummary, TradeIngestionClient,
};

// Infrastructure config
pub use infrastructure::config::{
    BroadcastSettings, ConfigError, IngestorConfig, ReconnectSettings,
};

// Binance adapters
pub use infrastructure::binance::{
    ParseError, ReconnectConfig, ReconnectPolicy, TradeCodec, TransportConfig,
    WebSocketTransport, parse_trade_frame,
};

// Broadcast hub
pub use infrastructure::broadcast::{BroadcastConfig, BroadcastHub};

// Storage adapters
pub use infrastructure::storage::{InMemoryTradeStore, JsonLinesTradeStore};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};
