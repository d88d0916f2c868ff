//! Storage Adapters
//!
//! Implementations of [`StorageSink`](crate::application::ports::StorageSink).

pub mod in_memory;
pub mod json_lines;

pub use in_memory::InMemoryTradeStore;
pub use json_lines::JsonLinesTradeStore;
