//! Port Interfaces
//!
//! Contracts the infrastructure adapters implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `TradeTransport`: reconnecting connection to the exchange feed
//! - `StorageSink`: durable storage of trade records
//! - `BroadcastSink`: best-effort fan-out to live subscribers

mod broadcast_port;
mod storage_port;
mod transport_port;

pub use broadcast_port::{BroadcastError, BroadcastSink, NoOpBroadcastSink, TradeBroadcast};
#[cfg(test)]
pub use storage_port::MockStorageSink;
pub use storage_port::{StorageError, StorageSink};
pub use transport_port::{ConnectionState, TradeTransport, TransportError};
