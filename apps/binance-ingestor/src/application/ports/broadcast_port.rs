//! Broadcast Sink Port (Driven Port)
//!
//! Interface for publishing trade notifications to live subscribers of a
//! named topic. Delivery is best effort: no acknowledgment, no retry.

use async_trait::async_trait;
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::domain::trade::TradeRecord;

/// Notification published for every parsed trade.
///
/// Numbers are rendered as decimal text and the trade time as ISO-8601 UTC.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeBroadcast {
    /// Ticker symbol.
    pub ticker_symbol: String,
    /// Trade price as decimal text.
    pub price: String,
    /// Traded quantity as decimal text.
    pub volume: Option<String>,
    /// Trade time, ISO-8601 UTC.
    pub trade_time: String,
}

impl From<&TradeRecord> for TradeBroadcast {
    fn from(record: &TradeRecord) -> Self {
        Self {
            ticker_symbol: record.ticker_symbol().to_string(),
            price: record.price().to_string(),
            volume: record.volume().map(|v| v.to_string()),
            trade_time: record
                .trade_time()
                .to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Broadcast error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BroadcastError {
    /// Topic channel is no longer accepting messages.
    #[error("broadcast topic closed: {topic}")]
    TopicClosed {
        /// Topic name.
        topic: String,
    },

    /// Event could not be encoded.
    #[error("broadcast serialization error: {message}")]
    Serialization {
        /// Error detail.
        message: String,
    },
}

/// Port for fan-out of trade notifications.
#[async_trait]
pub trait BroadcastSink: Send + Sync {
    /// Publish an event to every live subscriber of `topic`.
    async fn publish(&self, topic: &str, event: TradeBroadcast) -> Result<(), BroadcastError>;
}

/// Broadcast sink that drops everything.
#[derive(Debug, Clone, Default)]
pub struct NoOpBroadcastSink;

#[async_trait]
impl BroadcastSink for NoOpBroadcastSink {
    async fn publish(&self, _topic: &str, _event: TradeBroadcast) -> Result<(), BroadcastError> {
        Ok(())
    }
}
