//! Binance WebSocket Adapters
//!
//! Implements the trade stream connection for Binance spot markets:
//!
//! - **Messages**: wire format of `<symbol>@trade` events
//! - **Codec**: frame → [`TradeRecord`](crate::domain::trade::TradeRecord) parser
//! - **Reconnect**: exponential backoff policy
//! - **Transport**: reconnecting WebSocket connection

pub mod codec;
pub mod messages;
pub mod reconnect;
pub mod transport;

pub use codec::{ParseError, TradeCodec, parse_trade_frame};
pub use messages::{CombinedStreamMessage, TradeEventMessage};
pub use reconnect::{ReconnectConfig, ReconnectPolicy};
pub use transport::{DEFAULT_BASE_URL, TransportConfig, WebSocketTransport, stream_endpoint};
