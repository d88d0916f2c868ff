//! Binance WebSocket Message Types
//!
//! Wire format types for the Binance spot trade stream. Field names are the
//! single-letter keys Binance sends; unknown keys are ignored.
//!
//! # Wire Format (JSON)
//!
//! ```json
//! {
//!   "e": "trade",
//!   "E": 1598520003277,
//!   "s": "BTCUSDT",
//!   "t": 12345,
//!   "p": "11850.15",
//!   "q": "0.1",
//!   "T": 1598520003276,
//!   "m": true,
//!   "M": true
//! }
//! ```
//!
//! Price and quantity arrive as decimal strings and are kept as strings here
//! so they never pass through a binary float.
//!
//! # References
//!
//! - [Trade Streams](https://developers.binance.com/docs/binance-spot-api-docs/web-socket-streams#trade-streams)

use serde::{Deserialize, Serialize};

/// Raw trade event from `<symbol>@trade`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEventMessage {
    /// Event type (`"trade"`), optional on the wire.
    #[serde(rename = "e", default, skip_serializing_if = "Option::is_none")]
    pub event_type: Option<String>,

    /// Event time, epoch milliseconds.
    #[serde(rename = "E")]
    pub event_time: i64,

    /// Symbol (e.g. `BTCUSDT`).
    #[serde(rename = "s")]
    pub symbol: String,

    /// Trade ID.
    #[serde(rename = "t")]
    pub trade_id: u64,

    /// Price as decimal text.
    #[serde(rename = "p")]
    pub price: String,

    /// Quantity as decimal text.
    #[serde(rename = "q")]
    pub quantity: String,

    /// Trade time, epoch milliseconds.
    #[serde(rename = "T")]
    pub trade_time: i64,

    /// Is the buyer the market maker?
    #[serde(rename = "m")]
    pub is_buyer_maker: bool,
}

/// Envelope used by `/stream?streams=` combined connections.
///
/// ```json
/// {"stream": "btcusdt@trade", "data": {"e": "trade", ...}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombinedStreamMessage<T> {
    /// Stream name.
    pub stream: String,
    /// Wrapped payload.
    pub data: T,
}
