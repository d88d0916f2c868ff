//! Trade Record
//!
//! The canonical internal representation of one executed trade. A
//! `TradeRecord` is immutable once constructed and can only be built through
//! [`TradeRecord::new`], which enforces the record invariants:
//!
//! - the ticker symbol is non-empty (exchange casing is preserved)
//! - the price is strictly positive
//! - the volume, when present, is not negative

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Exchange name recorded on every trade ingested by this crate.
pub const DEFAULT_EXCHANGE: &str = "Binance";

/// Violations of the trade record invariants.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TradeRecordError {
    /// Ticker symbol was empty or whitespace.
    #[error("ticker symbol must not be empty")]
    EmptySymbol,

    /// Price was zero or negative.
    #[error("price must be positive, got {0}")]
    NonPositivePrice(Decimal),

    /// Volume was negative.
    #[error("volume must not be negative, got {0}")]
    NegativeVolume(Decimal),
}

/// Fields used to build a [`TradeRecord`].
#[derive(Debug, Clone)]
pub struct NewTrade {
    /// Ticker symbol as sent by the exchange (e.g. `BTCUSDT`).
    pub ticker_symbol: String,
    /// Trade price.
    pub price: Decimal,
    /// Traded quantity in the base asset.
    pub volume: Option<Decimal>,
    /// Exchange trade identifier.
    pub trade_id: u64,
    /// When the trade executed.
    pub trade_time: DateTime<Utc>,
    /// When the exchange emitted the event.
    pub event_time: DateTime<Utc>,
    /// Whether the buyer was the market maker.
    pub is_market_maker: bool,
    /// Decoded payload the record was built from.
    pub raw: serde_json::Value,
}

/// One executed trade, validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeRecord {
    ticker_symbol: String,
    price: Decimal,
    volume: Option<Decimal>,
    trade_id: u64,
    trade_time: DateTime<Utc>,
    event_time: DateTime<Utc>,
    is_market_maker: bool,
    exchange: &'static str,
    raw: serde_json::Value,
}

impl TradeRecord {
    /// Build a record, checking the invariants.
    ///
    /// # Errors
    ///
    /// Returns [`TradeRecordError`] if the symbol is empty, the price is not
    /// positive or the volume is negative.
    pub fn new(trade: NewTrade) -> Result<Self, TradeRecordError> {
        if trade.ticker_symbol.trim().is_empty() {
            return Err(TradeRecordError::EmptySymbol);
        }
        if trade.price <= Decimal::ZERO {
            return Err(TradeRecordError::NonPositivePrice(trade.price));
        }
        if let Some(volume) = trade.volume
            && volume < Decimal::ZERO
        {
            return Err(TradeRecordError::NegativeVolume(volume));
        }

        Ok(Self {
            ticker_symbol: trade.ticker_symbol,
            price: trade.price,
            volume: trade.volume,
            trade_id: trade.trade_id,
            trade_time: trade.trade_time,
            event_time: trade.event_time,
            is_market_maker: trade.is_market_maker,
            exchange: DEFAULT_EXCHANGE,
            raw: trade.raw,
        })
    }

    /// Ticker symbol, exchange casing preserved.
    #[must_use]
    pub fn ticker_symbol(&self) -> &str {
        &self.ticker_symbol
    }

    /// Trade price.
    #[must_use]
    pub const fn price(&self) -> Decimal {
        self.price
    }

    /// Traded quantity, if the exchange supplied one.
    #[must_use]
    pub const fn volume(&self) -> Option<Decimal> {
        self.volume
    }

    /// Exchange trade identifier (unique per stream, not across symbols).
    #[must_use]
    pub const fn trade_id(&self) -> u64 {
        self.trade_id
    }

    /// Execution time.
    #[must_use]
    pub const fn trade_time(&self) -> DateTime<Utc> {
        self.trade_time
    }

    /// Exchange event time.
    #[must_use]
    pub const fn event_time(&self) -> DateTime<Utc> {
        self.event_time
    }

    /// Whether the buyer was the market maker.
    #[must_use]
    pub const fn is_market_maker(&self) -> bool {
        self.is_market_maker
    }

    /// Source exchange.
    #[must_use]
    pub const fn exchange(&self) -> &'static str {
        self.exchange
    }

    /// The decoded frame this record came from.
    #[must_use]
    pub const fn raw(&self) -> &serde_json::Value {
        &self.raw
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn new_trade() -> NewTrade {
        NewTrade {
            ticker_symbol: "BTCUSDT".to_string(),
            price: Decimal::from_str("11850.15").unwrap(),
            volume: Some(Decimal::from_str("0.1").unwrap()),
            trade_id: 12345,
            trade_time: DateTime::from_timestamp_millis(1_598_520_003_276).unwrap(),
            event_time: DateTime::from_timestamp_millis(1_598_520_003_277).unwrap(),
            is_market_maker: true,
            raw: serde_json::json!({"s": "BTCUSDT"}),
        }
    }

    #[test]
    fn valid_trade_builds() {
        let record = TradeRecord::new(new_trade()).unwrap();
        assert_eq!(record.ticker_symbol(), "BTCUSDT");
        assert_eq!(record.price().to_string(), "11850.15");
        assert_eq!(record.volume().unwrap().to_string(), "0.1");
        assert_eq!(record.trade_id(), 12345);
        assert!(record.is_market_maker());
        assert_eq!(record.exchange(), "Binance");
    }

    #[test]
    fn empty_symbol_rejected() {
        let trade = NewTrade {
            ticker_symbol: "  ".to_string(),
            ..new_trade()
        };
        assert_eq!(
            TradeRecord::new(trade).unwrap_err(),
            TradeRecordError::EmptySymbol
        );
    }

    #[test]
    fn zero_price_rejected() {
        let trade = NewTrade {
            price: Decimal::ZERO,
            ..new_trade()
        };
        assert!(matches!(
            TradeRecord::new(trade),
            Err(TradeRecordError::NonPositivePrice(_))
        ));
    }

    #[test]
    fn negative_volume_rejected() {
        let trade = NewTrade {
            volume: Some(Decimal::from_str("-0.5").unwrap()),
            ..new_trade()
        };
        assert!(matches!(
            TradeRecord::new(trade),
            Err(TradeRecordError::NegativeVolume(_))
        ));
    }

    #[test]
    fn zero_and_missing_volume_allowed() {
        let zero = NewTrade {
            volume: Some(Decimal::ZERO),
            ..new_trade()
        };
        assert!(TradeRecord::new(zero).is_ok());

        let missing = NewTrade {
            volume: None,
            ..new_trade()
        };
        assert_eq!(TradeRecord::new(missing).unwrap().volume(), None);
    }

    #[test]
    fn symbol_casing_preserved() {
        let trade = NewTrade {
            ticker_symbol: "EthUsdt".to_string(),
            ..new_trade()
        };
        assert_eq!(TradeRecord::new(trade).unwrap().ticker_symbol(), "EthUsdt");
    }
}
