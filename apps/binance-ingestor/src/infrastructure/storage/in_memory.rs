//! In-memory trade store for testing and dry runs.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::application::ports::{StorageError, StorageSink};
use crate::domain::trade::TradeRecord;

/// In-memory implementation of `StorageSink`.
///
/// Keeps every stored record in arrival order. Can be told to reject
/// specific trade IDs to exercise failure handling.
#[derive(Debug, Default)]
pub struct InMemoryTradeStore {
    records: RwLock<Vec<TradeRecord>>,
    rejected_ids: RwLock<Vec<u64>>,
    failures: AtomicU64,
}

impl InMemoryTradeStore {
    /// Create a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `store` of `trade_id` fail.
    pub fn reject_trade_id(&self, trade_id: u64) {
        self.rejected_ids.write().push(trade_id);
    }

    /// Snapshot of stored records.
    #[must_use]
    pub fn records(&self) -> Vec<TradeRecord> {
        self.records.read().clone()
    }

    /// Stored trade IDs in order.
    #[must_use]
    pub fn trade_ids(&self) -> Vec<u64> {
        self.records.read().iter().map(TradeRecord::trade_id).collect()
    }

    /// Number of stored records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Check if the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Number of rejected writes.
    #[must_use]
    pub fn failure_count(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl StorageSink for InMemoryTradeStore {
    async fn store(&self, record: &TradeRecord) -> Result<(), StorageError> {
        if self.rejected_ids.read().contains(&record.trade_id()) {
            self.failures.fetch_add(1, Ordering::Relaxed);
            return Err(StorageError::Write {
                message: format!("trade {} rejected", record.trade_id()),
            });
        }
        self.records.write().push(record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::DateTime;
    use rust_decimal::Decimal;
    use tokio_test::{assert_err, assert_ok};

    use super::*;
    use crate::domain::trade::NewTrade;

    fn record(trade_id: u64) -> TradeRecord {
        TradeRecord::new(NewTrade {
            ticker_symbol: "BTCUSDT".to_string(),
            price: Decimal::new(1_185_015, 2),
            volume: Some(Decimal::new(1, 1)),
            trade_id,
            trade_time: DateTime::from_timestamp_millis(1_598_520_003_276).unwrap(),
            event_time: DateTime::from_timestamp_millis(1_598_520_003_277).unwrap(),
            is_market_maker: false,
            raw: serde_json::Value::Null,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn store_keeps_arrival_order() {
        let store = InMemoryTradeStore::new();
        for id in [3, 1, 2] {
            store.store(&record(id)).await.unwrap();
        }
        assert_eq!(store.trade_ids(), vec![3, 1, 2]);
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn rejected_id_fails_without_storing() {
        let store = InMemoryTradeStore::new();
        store.reject_trade_id(2);

        assert_ok!(store.store(&record(1)).await);
        let err = assert_err!(store.store(&record(2)).await);
        assert_ok!(store.store(&record(3)).await);

        assert!(matches!(err, StorageError::Write { .. }));
        assert_eq!(store.trade_ids(), vec![1, 3]);
        assert_eq!(store.failure_count(), 1);
    }
}
