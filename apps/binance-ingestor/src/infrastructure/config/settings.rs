//! Ingestor Configuration Settings
//!
//! Configuration types for the ingestor, loaded from environment variables.
//! Absent variables fall back to defaults; present but unparsable values are
//! reported as [`ConfigError::InvalidValue`].

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::application::services::IngestionSettings;
use crate::infrastructure::binance::{
    DEFAULT_BASE_URL, ReconnectConfig, TransportConfig, stream_endpoint,
};
use crate::infrastructure::broadcast::{BroadcastConfig, DEFAULT_CAPACITY, DEFAULT_TOPIC};

/// Symbol streamed when none is configured.
pub const DEFAULT_SYMBOL: &str = "btcusdt";

/// Channel streamed when none is configured.
pub const DEFAULT_CHANNEL: &str = "trade";

/// Reconnection settings.
#[derive(Debug, Clone)]
pub struct ReconnectSettings {
    /// Initial reconnection delay (backoff floor).
    pub delay_initial: Duration,
    /// Maximum reconnection delay (backoff ceiling).
    pub delay_max: Duration,
    /// Jitter as a fraction of the delay (0 = none).
    pub jitter_factor: f64,
    /// Maximum consecutive reconnection attempts (0 = unlimited).
    pub max_attempts: u32,
}

impl Default for ReconnectSettings {
    fn default() -> Self {
        Self {
            delay_initial: Duration::from_secs(1),
            delay_max: Duration::from_secs(60),
            jitter_factor: 0.0,
            max_attempts: 0, // Unlimited
        }
    }
}

/// Broadcast settings.
#[derive(Debug, Clone)]
pub struct BroadcastSettings {
    /// Topic every trade is published to.
    pub topic: String,
    /// Per-topic channel capacity.
    pub capacity: usize,
}

impl Default for BroadcastSettings {
    fn default() -> Self {
        Self {
            topic: DEFAULT_TOPIC.to_string(),
            capacity: DEFAULT_CAPACITY,
        }
    }
}

impl From<&BroadcastSettings> for BroadcastConfig {
    fn from(settings: &BroadcastSettings) -> Self {
        Self {
            capacity: settings.capacity,
        }
    }
}

/// Complete ingestor configuration.
#[derive(Debug, Clone)]
pub struct IngestorConfig {
    /// Trading pair (e.g. `btcusdt`).
    pub symbol: String,
    /// Stream channel (e.g. `trade`).
    pub channel: String,
    /// WebSocket base URL.
    pub base_url: String,
    /// Records per storage flush (`None` = store immediately).
    pub batch_size: Option<NonZeroUsize>,
    /// Stop after this many parsed records.
    pub max_records: Option<u64>,
    /// Broadcast settings.
    pub broadcast: BroadcastSettings,
    /// Reconnection settings.
    pub reconnect: ReconnectSettings,
    /// Upper bound on the final flush and close.
    pub shutdown_grace: Duration,
    /// JSON Lines output file (`None` = keep records in memory).
    pub output_path: Option<PathBuf>,
    /// Prometheus metrics port (0 = disabled).
    pub metrics_port: u16,
}

impl Default for IngestorConfig {
    fn default() -> Self {
        Self {
            symbol: DEFAULT_SYMBOL.to_string(),
            channel: DEFAULT_CHANNEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            batch_size: None,
            max_records: None,
            broadcast: BroadcastSettings::default(),
            reconnect: ReconnectSettings::default(),
            shutdown_grace: Duration::from_secs(5),
            output_path: None,
            metrics_port: 9090,
        }
    }
}

impl IngestorConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a variable is present but cannot be parsed, or the
    /// resulting configuration is invalid.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// See [`from_env`](Self::from_env).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env = EnvReader { lookup };

        let batch_size: usize = env.parse("INGESTOR_BATCH_SIZE", 0)?;
        let max_records: u64 = env.parse("INGESTOR_MAX_RECORDS", 0)?;

        let reconnect = ReconnectSettings {
            delay_initial: env.duration_secs(
                "INGESTOR_RECONNECT_DELAY_INITIAL_SECS",
                defaults.reconnect.delay_initial,
            )?,
            delay_max: env.duration_secs(
                "INGESTOR_RECONNECT_DELAY_MAX_SECS",
                defaults.reconnect.delay_max,
            )?,
            jitter_factor: env.parse(
                "INGESTOR_RECONNECT_JITTER_FACTOR",
                defaults.reconnect.jitter_factor,
            )?,
            max_attempts: env.parse(
                "INGESTOR_MAX_RECONNECT_ATTEMPTS",
                defaults.reconnect.max_attempts,
            )?,
        };

        let broadcast = BroadcastSettings {
            topic: env.string("INGESTOR_BROADCAST_TOPIC", &defaults.broadcast.topic),
            capacity: env.parse("INGESTOR_BROADCAST_CAPACITY", defaults.broadcast.capacity)?,
        };

        let config = Self {
            symbol: env.string("BINANCE_SYMBOL", &defaults.symbol),
            channel: env.string("BINANCE_CHANNEL", &defaults.channel),
            base_url: env.string("BINANCE_WS_BASE_URL", &defaults.base_url),
            batch_size: NonZeroUsize::new(batch_size),
            max_records: (max_records > 0).then_some(max_records),
            broadcast,
            reconnect,
            shutdown_grace: env
                .duration_secs("INGESTOR_SHUTDOWN_GRACE_SECS", defaults.shutdown_grace)?,
            output_path: (env.lookup)("INGESTOR_OUTPUT_PATH")
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
            metrics_port: env.parse("INGESTOR_METRICS_PORT", defaults.metrics_port)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Check the configuration for values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::EmptyValue("symbol".to_string()));
        }
        if self.channel.trim().is_empty() {
            return Err(ConfigError::EmptyValue("channel".to_string()));
        }
        if self.broadcast.topic.trim().is_empty() {
            return Err(ConfigError::EmptyValue("broadcast topic".to_string()));
        }
        if self.broadcast.capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "broadcast capacity".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.reconnect.delay_initial.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "reconnect delay".to_string(),
                reason: "initial delay must be positive".to_string(),
            });
        }
        if self.reconnect.delay_initial > self.reconnect.delay_max {
            return Err(ConfigError::InvalidValue {
                key: "reconnect delay".to_string(),
                reason: format!(
                    "initial delay {:?} exceeds maximum {:?}",
                    self.reconnect.delay_initial, self.reconnect.delay_max
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.reconnect.jitter_factor) {
            return Err(ConfigError::InvalidValue {
                key: "reconnect jitter".to_string(),
                reason: format!("{} is outside 0..=1", self.reconnect.jitter_factor),
            });
        }

        self.transport_config()
            .validate()
            .map_err(|e| ConfigError::InvalidEndpoint(e.to_string()))
    }

    /// Full stream URL.
    #[must_use]
    pub fn stream_url(&self) -> String {
        stream_endpoint(&self.base_url, &self.symbol, &self.channel)
    }

    /// Transport configuration derived from these settings.
    #[must_use]
    pub fn transport_config(&self) -> TransportConfig {
        TransportConfig::new(&self.symbol, &self.channel)
            .with_base_url(&self.base_url)
            .with_reconnect(ReconnectConfig::from_settings(&self.reconnect))
    }

    /// Client settings derived from these settings.
    #[must_use]
    pub fn ingestion_settings(&self) -> IngestionSettings {
        IngestionSettings {
            symbol: self.symbol.clone(),
            channel: self.channel.clone(),
            batch_size: self.batch_size,
            topic: self.broadcast.topic.clone(),
            max_records: self.max_records,
            shutdown_grace: self.shutdown_grace,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Required value is empty.
    #[error("{0} cannot be empty")]
    EmptyValue(String),

    /// Value could not be parsed or is out of range.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Variable or setting name.
        key: String,
        /// Failure detail.
        reason: String,
    },

    /// Stream endpoint cannot be dialled.
    #[error("{0}")]
    InvalidEndpoint(String),
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str, default: &str) -> String {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    }

    fn parse<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match (self.lookup)(key) {
            Some(raw) if !raw.trim().is_empty() => {
                raw.trim()
                    .parse()
                    .map_err(|e: T::Err| ConfigError::InvalidValue {
                        key: key.to_string(),
                        reason: format!("{raw:?}: {e}"),
                    })
            }
            _ => Ok(default),
        }
    }

    fn duration_secs(&self, key: &str, default: Duration) -> Result<Duration, ConfigError> {
        let secs: u64 = self.parse(key, default.as_secs())?;
        Ok(Duration::from_secs(secs))
    }
}
