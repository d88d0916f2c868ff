//! Binance WebSocket Transport
//!
//! Connects to a single Binance raw stream and yields its text frames.
//!
//! # Stream URL
//!
//! - Production: `wss://stream.binance.com:9443/ws/<symbol>@<channel>`
//!
//! The symbol is lower-cased in the path; Binance rejects upper-case stream
//! names. The transport does not retry on its own: the ingestion client asks
//! for [`next_backoff_delay`](TradeTransport::next_backoff_delay) and calls
//! [`connect`](TradeTransport::connect) again.

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use crate::application::ports::{ConnectionState, TradeTransport, TransportError};

/// Base URL of the Binance spot raw-stream endpoint.
pub const DEFAULT_BASE_URL: &str = "wss://stream.binance.com:9443/ws";

/// Upper bound on a single connect handshake.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build the raw-stream URL for `symbol` and `channel`.
#[must_use]
pub fn stream_endpoint(base_url: &str, symbol: &str, channel: &str) -> String {
    format!(
        "{}/{}@{}",
        base_url.trim_end_matches('/'),
        symbol.to_lowercase(),
        channel
    )
}

// =============================================================================
// Transport Configuration
// =============================================================================

/// Configuration for the WebSocket transport.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Base URL the stream path is appended to.
    pub base_url: String,
    /// Trading pair, e.g. `btcusdt`.
    pub symbol: String,
    /// Stream channel, e.g. `trade`.
    pub channel: String,
    /// Backoff configuration.
    pub reconnect: ReconnectConfig,
    /// Handshake timeout.
    pub connect_timeout: Duration,
}

impl TransportConfig {
    /// Create a configuration against the production endpoint.
    #[must_use]
    pub fn new(symbol: impl Into<String>, channel: impl Into<String>) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            symbol: symbol.into(),
            channel: channel.into(),
            reconnect: ReconnectConfig::default(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Use a different base URL (e.g. a local test server).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Use a different backoff configuration.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Full stream URL.
    #[must_use]
    pub fn endpoint(&self) -> String {
        stream_endpoint(&self.base_url, &self.symbol, &self.channel)
    }

    /// Check that the endpoint can be dialled.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InvalidEndpoint`] for empty path segments,
    /// a non-WebSocket scheme or an unparsable URL.
    pub fn validate(&self) -> Result<(), TransportError> {
        let endpoint = self.endpoint();
        let invalid = |reason: &str| TransportError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: reason.to_string(),
        };

        if self.symbol.trim().is_empty() {
            return Err(invalid("symbol is empty"));
        }
        if self.channel.trim().is_empty() {
            return Err(invalid("channel is empty"));
        }
        if !(endpoint.starts_with("ws://") || endpoint.starts_with("wss://")) {
            return Err(invalid("scheme must be ws:// or wss://"));
        }
        endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| invalid(&e.to_string()))?;

        Ok(())
    }
}

// =============================================================================
// WebSocket Transport
// =============================================================================

/// Reconnectable WebSocket connection to one Binance stream.
pub struct WebSocketTransport {
    config: TransportConfig,
    endpoint: String,
    policy: ReconnectPolicy,
    state: ConnectionState,
    stream: Option<WsStream>,
}

impl WebSocketTransport {
    /// Create a disconnected transport.
    #[must_use]
    pub fn new(config: TransportConfig) -> Self {
        let endpoint = config.endpoint();
        let policy = ReconnectPolicy::new(config.reconnect.clone());
        Self {
            config,
            endpoint,
            policy,
            state: ConnectionState::Disconnected,
            stream: None,
        }
    }

    /// Transport configuration.
    #[must_use]
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    fn release(&mut self) {
        self.stream = None;
        self.state = ConnectionState::Disconnected;
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TradeTransport for WebSocketTransport {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn connection_state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        if self.stream.is_some() {
            self.close().await;
        }
        self.config.validate()?;

        tracing::info!(url = %self.endpoint, "Connecting to Binance stream");
        self.state = ConnectionState::Connecting;

        let attempt = tokio::time::timeout(
            self.config.connect_timeout,
            tokio_tungstenite::connect_async(self.endpoint.as_str()),
        )
        .await;

        match attempt {
            Ok(Ok((ws_stream, _response))) => {
                self.stream = Some(ws_stream);
                self.state = ConnectionState::Connected;
                self.policy.reset();
                tracing::info!(url = %self.endpoint, "Connected to Binance stream");
                Ok(())
            }
            Ok(Err(tokio_tungstenite::tungstenite::Error::Url(e))) => {
                self.state = ConnectionState::Disconnected;
                Err(TransportError::InvalidEndpoint {
                    endpoint: self.endpoint.clone(),
                    reason: e.to_string(),
                })
            }
            Ok(Err(e)) => {
                self.state = ConnectionState::Disconnected;
                Err(TransportError::ConnectFailed {
                    endpoint: self.endpoint.clone(),
                    reason: e.to_string(),
                })
            }
            Err(_) => {
                self.state = ConnectionState::Disconnected;
                Err(TransportError::ConnectFailed {
                    endpoint: self.endpoint.clone(),
                    reason: format!(
                        "handshake timed out after {}ms",
                        self.config.connect_timeout.as_millis()
                    ),
                })
            }
        }
    }

    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        let outcome = loop {
            let Some(stream) = self.stream.as_mut() else {
                return Some(Err(TransportError::NotConnected));
            };

            match stream.next().await {
                Some(Ok(Message::Text(text))) => return Some(Ok(text.as_str().to_owned())),
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(frame = ?frame, "Server sent close frame");
                    break None;
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::trace!(len = data.len(), "Ignoring binary frame");
                }
                Some(Ok(_)) => {
                    // Ping/pong; tungstenite queues the pong reply itself
                }
                Some(Err(e)) => {
                    break Some(Err(TransportError::StreamInterrupted(e.to_string())));
                }
                None => {
                    tracing::info!("WebSocket stream ended");
                    break None;
                }
            }
        };

        self.release();
        outcome
    }

    fn next_backoff_delay(&mut self) -> Option<std::time::Duration> {
        self.policy.next_delay()
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!(error = %e, "Error sending close frame");
            }
            if let Err(e) = stream.flush().await {
                tracing::trace!(error = %e, "Error flushing close frame");
            }
            tracing::info!(url = %self.endpoint, "WebSocket connection closed");
        }
        self.state = ConnectionState::Disconnected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_lowercases_symbol() {
        let config = TransportConfig::new("BTCUSDT", "trade");
        assert_eq!(
            config.endpoint(),
            "wss://stream.binance.com:9443/ws/btcusdt@trade"
        );
    }

    #[test]
    fn endpoint_trims_trailing_slash() {
        assert_eq!(
            stream_endpoint("ws://127.0.0.1:9000/ws/", "ethusdt", "kline_1m"),
            "ws://127.0.0.1:9000/ws/ethusdt@kline_1m"
        );
    }

    #[test]
    fn default_config_is_valid() {
        assert!(TransportConfig::new("btcusdt", "trade").validate().is_ok());
    }

    #[test]
    fn empty_symbol_is_invalid() {
        let err = TransportConfig::new("", "trade").validate().unwrap_err();
        assert!(matches!(err, TransportError::InvalidEndpoint { .. }));
        assert!(!err.is_retryable());
    }

    #[test]
    fn http_scheme_is_invalid() {
        let config = TransportConfig::new("btcusdt", "trade").with_base_url("http://example.com/ws");
        assert!(matches!(
            config.validate(),
            Err(TransportError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn unparsable_url_is_invalid() {
        let config = TransportConfig::new("btcusdt", "trade").with_base_url("ws://exa mple.com");
        assert!(matches!(
            config.validate(),
            Err(TransportError::InvalidEndpoint { .. })
        ));
    }

    #[tokio::test]
    async fn close_when_disconnected_is_noop() {
        let mut transport = WebSocketTransport::new(TransportConfig::new("btcusdt", "trade"));
        transport.close().await;
        transport.close().await;
        assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn next_frame_without_connection() {
        let mut transport = WebSocketTransport::new(TransportConfig::new("btcusdt", "trade"));
        assert!(matches!(
            transport.next_frame().await,
            Some(Err(TransportError::NotConnected))
        ));
    }

    #[tokio::test]
    async fn connect_refused_reports_failure() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let config =
            TransportConfig::new("btcusdt", "trade").with_base_url(format!("ws://{addr}/ws"));
        let mut transport = WebSocketTransport::new(config);

        let err = transport.connect().await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectFailed { .. }));
        assert!(err.is_retryable());
        assert_eq!(transport.connection_state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn invalid_endpoint_fails_before_dialling() {
        let config = TransportConfig::new("btcusdt", "trade").with_base_url("ftp://example.com");
        let mut transport = WebSocketTransport::new(config);
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::InvalidEndpoint { .. })
        ));
    }

    #[test]
    fn backoff_doubles_from_floor() {
        let mut transport = WebSocketTransport::new(TransportConfig::new("btcusdt", "trade"));
        assert_eq!(transport.next_backoff_delay(), Some(Duration::from_secs(1)));
        assert_eq!(transport.next_backoff_delay(), Some(Duration::from_secs(2)));
        assert_eq!(transport.next_backoff_delay(), Some(Duration::from_secs(4)));
    }
}
