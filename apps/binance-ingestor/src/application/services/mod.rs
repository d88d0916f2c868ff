//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `TradeIngestionClient`: runs one trade stream into storage and broadcast

mod ingestion;

pub use ingestion::{
    ClientHandle, IngestionError, IngestionSettings, IngestionSummary, TradeIngestionClient,
};
