//! Broadcast Channel Adapters
//!
//! Implements topic-keyed fan-out using tokio broadcast channels.
//!
//! # Architecture
//!
//! The `BroadcastHub` holds one channel per topic name, created on first use.
//! The ingestion client publishes every parsed trade to its configured topic
//! (`binance_data` by default); any number of in-process subscribers can
//! attach and detach at runtime.
//!
//! Delivery is best effort. Publishing to a topic with no subscribers is not
//! an error, and a subscriber that falls more than `capacity` messages behind
//! sees `RecvError::Lagged` and skips ahead.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::application::ports::{BroadcastError, BroadcastSink, TradeBroadcast};

/// Topic used when none is configured.
pub const DEFAULT_TOPIC: &str = "binance_data";

/// Default per-topic channel capacity.
pub const DEFAULT_CAPACITY: usize = 10_000;

// =============================================================================
// Broadcast Hub
// =============================================================================

/// Configuration for broadcast channels.
#[derive(Debug, Clone, Copy)]
pub struct BroadcastConfig {
    /// Capacity of each topic channel.
    pub capacity: usize,
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Central hub for topic channels.
///
/// # Example
///
/// ```rust
/// use binance_ingestor::infrastructure::broadcast::{BroadcastConfig, BroadcastHub};
///
/// let hub = BroadcastHub::new(BroadcastConfig::default());
///
/// // Subscribe before anything is published
/// let _rx = hub.subscribe("binance_data");
/// assert_eq!(hub.receiver_count("binance_data"), 1);
/// ```
#[derive(Debug)]
pub struct BroadcastHub {
    capacity: usize,
    topics: RwLock<HashMap<String, broadcast::Sender<TradeBroadcast>>>,
}

impl BroadcastHub {
    /// Create a new broadcast hub with the given configuration.
    #[must_use]
    pub fn new(config: BroadcastConfig) -> Self {
        Self {
            capacity: config.capacity.max(1),
            topics: RwLock::new(HashMap::new()),
        }
    }

    /// Create a new broadcast hub with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(BroadcastConfig::default())
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<TradeBroadcast> {
        if let Some(tx) = self.topics.read().get(topic) {
            return tx.clone();
        }
        self.topics
            .write()
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }

    /// Send an event to all subscribers of `topic`.
    ///
    /// Returns the number of receivers that got the event, or `None` if the
    /// topic has no active receivers.
    #[must_use]
    pub fn send(&self, topic: &str, event: TradeBroadcast) -> Option<usize> {
        let tx = self.topics.read().get(topic).cloned()?;
        tx.send(event).ok()
    }

    /// Get a new receiver for `topic`.
    #[must_use]
    pub fn subscribe(&self, topic: &str) -> broadcast::Receiver<TradeBroadcast> {
        self.sender(topic).subscribe()
    }

    /// Get a new receiver for `topic` as a `Stream`.
    #[must_use]
    pub fn subscribe_stream(&self, topic: &str) -> BroadcastStream<TradeBroadcast> {
        BroadcastStream::new(self.subscribe(topic))
    }

    /// Get the number of active receivers on `topic`.
    #[must_use]
    pub fn receiver_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }
}

#[async_trait]
impl BroadcastSink for BroadcastHub {
    async fn publish(&self, topic: &str, event: TradeBroadcast) -> Result<(), BroadcastError> {
        match self.send(topic, event) {
            Some(receivers) => {
                tracing::trace!(topic, receivers, "Published trade");
            }
            None => {
                tracing::trace!(topic, "No subscribers for trade");
            }
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
