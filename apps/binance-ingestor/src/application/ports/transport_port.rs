//! Trade Transport Port (Driven Port)
//!
//! Interface for the reconnecting connection to the exchange feed. The
//! transport owns its connection and its backoff state; it reports outcomes
//! and never touches the ingestion client's lifecycle state.
//!
//! ```text
//! Disconnected ─► Connecting ─► Connected
//!       ▲              │            │
//!       └──────────────┴────────────┘  (connect failure, close, drop)
//! ```

use std::time::Duration;

use async_trait::async_trait;

/// Connection state of a transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    /// No open connection.
    #[default]
    Disconnected,
    /// Connect attempt in flight.
    Connecting,
    /// Connection open; frames can be read.
    Connected,
}

/// Transport errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Connect attempt failed.
    #[error("connection to {endpoint} failed: {reason}")]
    ConnectFailed {
        /// Endpoint that was dialled.
        endpoint: String,
        /// Failure detail.
        reason: String,
    },

    /// The endpoint cannot be dialled at all.
    #[error("invalid endpoint {endpoint}: {reason}")]
    InvalidEndpoint {
        /// Offending endpoint.
        endpoint: String,
        /// Failure detail.
        reason: String,
    },

    /// The frame sequence ended abnormally.
    #[error("stream interrupted: {0}")]
    StreamInterrupted(String),

    /// Frames were requested without an open connection.
    #[error("transport is not connected")]
    NotConnected,
}

impl TransportError {
    /// Whether the client should back off and reconnect.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidEndpoint { .. })
    }
}

/// Port for the exchange feed connection.
#[async_trait]
pub trait TradeTransport: Send {
    /// Endpoint this transport dials.
    fn endpoint(&self) -> &str;

    /// Current connection state.
    fn connection_state(&self) -> ConnectionState;

    /// Open the connection. Resets the backoff on success; never retries.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Next text frame from the open connection.
    ///
    /// Returns `None` once the peer closes cleanly and `Some(Err(_))` when the
    /// connection drops abnormally. Either way the transport is disconnected
    /// afterwards and only [`connect`](Self::connect) restarts the sequence.
    /// Must be cancel safe: the caller races it against a stop signal.
    async fn next_frame(&mut self) -> Option<Result<String, TransportError>>;

    /// Delay to wait before the next connect attempt, advancing the backoff.
    ///
    /// Returns `None` when a configured retry ceiling has been reached.
    fn next_backoff_delay(&mut self) -> Option<Duration>;

    /// Release the connection. Idempotent.
    async fn close(&mut self);
}
