//! Batch Accumulator
//!
//! Holds parsed trade records until a flush is due. The accumulator is owned
//! by the ingestion task and mutated only from there, so it carries no
//! internal locking.
//!
//! With no batch size configured every offered record is immediately ready
//! to flush as a single-element batch.

use std::num::NonZeroUsize;

use super::trade::TradeRecord;

/// Ordered buffer of records awaiting storage.
#[derive(Debug, Default)]
pub struct BatchAccumulator {
    batch_size: Option<NonZeroUsize>,
    buffer: Vec<TradeRecord>,
}

impl BatchAccumulator {
    /// Create an accumulator. `None` disables buffering.
    #[must_use]
    pub fn new(batch_size: Option<NonZeroUsize>) -> Self {
        let capacity = batch_size.map_or(1, NonZeroUsize::get);
        Self {
            batch_size,
            buffer: Vec::with_capacity(capacity),
        }
    }

    /// Append a record and report whether the buffer reached its threshold.
    pub fn offer(&mut self, record: TradeRecord) -> bool {
        self.buffer.push(record);
        self.is_full()
    }

    /// Take every buffered record in arrival order, leaving the buffer empty.
    pub fn flush(&mut self) -> Vec<TradeRecord> {
        std::mem::take(&mut self.buffer)
    }

    /// Whether a flush is due.
    #[must_use]
    pub fn is_full(&self) -> bool {
        match self.batch_size {
            Some(size) => self.buffer.len() >= size.get(),
            None => !self.buffer.is_empty(),
        }
    }

    /// Number of buffered records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Configured batch size.
    #[must_use]
    pub const fn batch_size(&self) -> Option<NonZeroUsize> {
        self.batch_size
    }

    /// Whether records are held back until the batch fills.
    #[must_use]
    pub const fn is_batching(&self) -> bool {
        self.batch_size.is_some()
    }
}
