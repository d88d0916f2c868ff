//! Trade Frame Codec
//!
//! Turns one raw text frame from the Binance stream into a validated
//! [`TradeRecord`]. Decoding happens in two steps so the two failure kinds
//! stay distinct:
//!
//! 1. text → JSON value (`MalformedFrame` on failure)
//! 2. JSON value → trade fields → record (`SchemaMismatch` on failure)
//!
//! Both failures are per-frame: the caller logs them and keeps reading.
//! Frames wrapped in a combined-stream envelope are unwrapped first.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use super::messages::{CombinedStreamMessage, TradeEventMessage};
use crate::domain::trade::{NewTrade, TradeRecord};

/// Longest frame excerpt quoted in error messages.
const PREVIEW_CHARS: usize = 80;

/// Frame parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Frame is not well-formed JSON.
    #[error("malformed frame: {reason} (frame: {preview})")]
    MalformedFrame {
        /// Decoder error.
        reason: String,
        /// Leading part of the frame.
        preview: String,
    },

    /// Frame is JSON but not a trade event we can use.
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
}

impl ParseError {
    /// Short label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::MalformedFrame { .. } => "malformed_frame",
            Self::SchemaMismatch(_) => "schema_mismatch",
        }
    }
}

/// JSON codec for the Binance trade stream.
#[derive(Debug, Default, Clone)]
pub struct TradeCodec;

impl TradeCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode a text frame into a trade record.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::MalformedFrame`] if the text is not JSON and
    /// [`ParseError::SchemaMismatch`] if required fields are missing, have the
    /// wrong type or violate the record invariants.
    pub fn decode(&self, text: &str) -> Result<TradeRecord, ParseError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| ParseError::MalformedFrame {
                reason: e.to_string(),
                preview: preview(text),
            })?;

        self.decode_value(unwrap_combined(value)?)
    }

    /// Map an already-decoded JSON value onto a trade record.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::SchemaMismatch`] on missing or invalid fields.
    pub fn decode_value(&self, value: Value) -> Result<TradeRecord, ParseError> {
        let msg = TradeEventMessage::deserialize(&value)
            .map_err(|e| ParseError::SchemaMismatch(e.to_string()))?;

        let price = parse_decimal("p", &msg.price)?;
        let volume = parse_decimal("q", &msg.quantity)?;
        let trade_time = epoch_millis("T", msg.trade_time)?;
        let event_time = epoch_millis("E", msg.event_time)?;

        TradeRecord::new(NewTrade {
            ticker_symbol: msg.symbol,
            price,
            volume: Some(volume),
            trade_id: msg.trade_id,
            trade_time,
            event_time,
            is_market_maker: msg.is_buyer_maker,
            raw: value,
        })
        .map_err(|e| ParseError::SchemaMismatch(e.to_string()))
    }
}

/// Parse one frame with the default codec.
///
/// # Errors
///
/// See [`TradeCodec::decode`].
pub fn parse_trade_frame(text: &str) -> Result<TradeRecord, ParseError> {
    TradeCodec::new().decode(text)
}

/// Strip a `{"stream": .., "data": ..}` envelope if present.
fn unwrap_combined(value: Value) -> Result<Value, ParseError> {
    let wrapped = value
        .as_object()
        .is_some_and(|map| map.contains_key("stream") && map.contains_key("data"));
    if !wrapped {
        return Ok(value);
    }

    CombinedStreamMessage::<Value>::deserialize(value)
        .map(|envelope| envelope.data)
        .map_err(|e| ParseError::SchemaMismatch(format!("combined stream envelope: {e}")))
}

fn parse_decimal(field: &str, text: &str) -> Result<Decimal, ParseError> {
    Decimal::from_str(text.trim()).map_err(|e| {
        ParseError::SchemaMismatch(format!("field `{field}` is not a decimal ({text:?}): {e}"))
    })
}

fn epoch_millis(field: &str, millis: i64) -> Result<DateTime<Utc>, ParseError> {
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        ParseError::SchemaMismatch(format!("field `{field}` is out of range: {millis}"))
    })
}

fn preview(text: &str) -> String {
    text.chars().take(PREVIEW_CHARS).collect()
}
