//! Configuration Module
//!
//! Configuration loading for the ingestor binary.

mod settings;

pub use settings::{
    BroadcastSettings, ConfigError, DEFAULT_CHANNEL, DEFAULT_SYMBOL, IngestorConfig,
    ReconnectSettings,
};
