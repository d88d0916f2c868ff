//! JSON Lines trade store.
//!
//! Appends one JSON object per record to a local file. Decimals are written
//! as strings so the stored price text matches what the exchange sent.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::application::ports::{StorageError, StorageSink};
use crate::domain::trade::TradeRecord;

/// Append-only JSON Lines implementation of `StorageSink`.
#[derive(Debug)]
pub struct JsonLinesTradeStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesTradeStore {
    /// Open (or create) the file at `path` for appending.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Unavailable`] if the parent directory cannot be
    /// created or the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::Unavailable {
                    message: format!("{}: {e}", parent.display()),
                })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .map_err(|e| StorageError::Unavailable {
                message: format!("{}: {e}", path.display()),
            })?;

        tracing::info!(path = %path.display(), "Opened trade output file");

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Output file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StorageSink for JsonLinesTradeStore {
    async fn store(&self, record: &TradeRecord) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(record).map_err(|e| StorageError::Serialization {
            message: e.to_string(),
        })?;
        line.push(b'\n');

        let mut file = self.file.lock().await;
        file.write_all(&line)
            .await
            .map_err(|e| StorageError::Write {
                message: e.to_string(),
            })?;
        file.flush().await.map_err(|e| StorageError::Write {
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::DateTime;
    use rust_decimal::Decimal;

    use super::*;
    use crate::domain::trade::NewTrade;

    fn record(trade_id: u64, price: &str) -> TradeRecord {
        TradeRecord::new(NewTrade {
            ticker_symbol: "BTCUSDT".to_string(),
            price: Decimal::from_str(price).unwrap(),
            volume: Some(Decimal::from_str("0.00100000").unwrap()),
            trade_id,
            trade_time: DateTime::from_timestamp_millis(1_598_520_003_276).unwrap(),
            event_time: DateTime::from_timestamp_millis(1_598_520_003_277).unwrap(),
            is_market_maker: true,
            raw: serde_json::json!({"t": trade_id}),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn appends_one_line_per_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.jsonl");
        let store = JsonLinesTradeStore::open(&path).await.unwrap();

        store.store(&record(1, "11850.15")).await.unwrap();
        store.store(&record(2, "11850.20")).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<serde_json::Value> = contents
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["trade_id"], 1);
        assert_eq!(lines[0]["price"], "11850.15");
        assert_eq!(lines[0]["volume"], "0.00100000");
        assert_eq!(lines[0]["exchange"], "Binance");
        assert_eq!(lines[1]["trade_id"], 2);
    }

    #[tokio::test]
    async fn reopening_appends() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.jsonl");

        JsonLinesTradeStore::open(&path)
            .await
            .unwrap()
            .store(&record(1, "1"))
            .await
            .unwrap();
        JsonLinesTradeStore::open(&path)
            .await
            .unwrap()
            .store(&record(2, "2"))
            .await
            .unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }

    #[tokio::test]
    async fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/trades.jsonl");
        let store = JsonLinesTradeStore::open(&path).await.unwrap();
        assert_eq!(store.path(), path.as_path());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn directory_path_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = JsonLinesTradeStore::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, StorageError::Unavailable { .. }));
    }
}
