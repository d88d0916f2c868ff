//! Application Layer - Ingestion orchestration and port definitions.
//!
//! This layer contains the ingestion client and the port interfaces that
//! define how it talks to the transport, storage and broadcast adapters.

/// Port interfaces for external systems (transport, storage, broadcast).
pub mod ports;

/// Application services (the ingestion client).
pub mod services;
