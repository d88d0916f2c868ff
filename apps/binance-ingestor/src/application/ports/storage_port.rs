//! Storage Sink Port (Driven Port)
//!
//! Interface for durably storing trade records. Called once per record, in
//! arrival order.

use async_trait::async_trait;

use crate::domain::trade::TradeRecord;

/// Storage error.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// Backing store could not be reached.
    #[error("storage unavailable: {message}")]
    Unavailable {
        /// Error detail.
        message: String,
    },

    /// Write was rejected or failed part way.
    #[error("storage write failed: {message}")]
    Write {
        /// Error detail.
        message: String,
    },

    /// Record could not be encoded for storage.
    #[error("storage serialization error: {message}")]
    Serialization {
        /// Error detail.
        message: String,
    },
}

/// Port for persisting trade records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StorageSink: Send + Sync {
    /// Durably store one record.
    async fn store(&self, record: &TradeRecord) -> Result<(), StorageError>;
}
