//! Binance Ingestor Binary
//!
//! Streams trades for one symbol until interrupted.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin binance-ingestor -- --symbol ethusdt --batch-size 50 --output trades.jsonl
//! cargo run --bin binance-ingestor -- --limit 10
//! ```
//!
//! # Environment Variables
//!
//! - `BINANCE_SYMBOL`: Trading pair (default: btcusdt)
//! - `BINANCE_CHANNEL`: Stream channel (default: trade)
//! - `BINANCE_WS_BASE_URL`: Stream base URL (default: <wss://stream.binance.com:9443/ws>)
//! - `INGESTOR_BATCH_SIZE`: Records per storage flush, 0 = unbatched (default: 0)
//! - `INGESTOR_MAX_RECORDS`: Stop after this many trades, 0 = unlimited (default: 0)
//! - `INGESTOR_BROADCAST_TOPIC`: Broadcast topic (default: binance_data)
//! - `INGESTOR_BROADCAST_CAPACITY`: Per-topic channel capacity (default: 10000)
//! - `INGESTOR_RECONNECT_DELAY_INITIAL_SECS`: Backoff floor (default: 1)
//! - `INGESTOR_RECONNECT_DELAY_MAX_SECS`: Backoff ceiling (default: 60)
//! - `INGESTOR_RECONNECT_JITTER_FACTOR`: Backoff jitter fraction (default: 0)
//! - `INGESTOR_MAX_RECONNECT_ATTEMPTS`: 0 = unlimited (default: 0)
//! - `INGESTOR_SHUTDOWN_GRACE_SECS`: Final flush bound (default: 5)
//! - `INGESTOR_OUTPUT_PATH`: JSON Lines output file (default: in memory)
//! - `INGESTOR_METRICS_PORT`: Prometheus port, 0 = disabled (default: 9090)
//! - `OTEL_ENABLED`: Export spans over OTLP (default: false)
//! - `RUST_LOG`: Log level (default: info)

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use binance_ingestor::application::ports::StorageSink;
use binance_ingestor::infrastructure::broadcast::{BroadcastConfig, BroadcastHub};
use binance_ingestor::infrastructure::storage::{InMemoryTradeStore, JsonLinesTradeStore};
use binance_ingestor::infrastructure::telemetry;
use binance_ingestor::{
    ClientHandle, IngestorConfig, TradeIngestionClient, WebSocketTransport, init_metrics,
};
use clap::Parser;
use futures_util::StreamExt;
use tokio::signal;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

/// Stream Binance trades into storage and broadcast subscribers.
#[derive(Debug, Parser)]
#[command(name = "binance-ingestor")]
#[command(version)]
struct Cli {
    /// Trading pair, e.g. btcusdt (overrides BINANCE_SYMBOL)
    #[arg(long)]
    symbol: Option<String>,

    /// Stream channel, e.g. trade (overrides BINANCE_CHANNEL)
    #[arg(long)]
    channel: Option<String>,

    /// Records per storage flush; 0 stores each record immediately
    #[arg(long)]
    batch_size: Option<usize>,

    /// Stop after this many parsed trades
    #[arg(long)]
    limit: Option<u64>,

    /// Append trades to this JSON Lines file
    #[arg(long)]
    output: Option<PathBuf>,
}

impl Cli {
    fn apply(self, config: &mut IngestorConfig) {
        if let Some(symbol) = self.symbol {
            config.symbol = symbol;
        }
        if let Some(channel) = self.channel {
            config.channel = channel;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = std::num::NonZeroUsize::new(batch_size);
        }
        if let Some(limit) = self.limit {
            config.max_records = (limit > 0).then_some(limit);
        }
        if let Some(output) = self.output {
            config.output_path = Some(output);
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    load_dotenv();

    let _telemetry_guard = telemetry::init()?;

    tracing::info!("Starting Binance Ingestor");

    let mut config = IngestorConfig::from_env()?;
    cli.apply(&mut config);
    config.validate()?;
    log_config(&config);

    init_metrics(config.metrics_port).context("failed to start Prometheus exporter")?;

    let hub = Arc::new(BroadcastHub::new(BroadcastConfig::from(&config.broadcast)));

    let storage: Arc<dyn StorageSink> = if let Some(path) = &config.output_path {
        Arc::new(JsonLinesTradeStore::open(path).await?)
    } else {
        tracing::warn!("No output path configured; trades are kept in memory only");
        Arc::new(InMemoryTradeStore::new())
    };

    let transport = WebSocketTransport::new(config.transport_config());
    let mut client = TradeIngestionClient::new(
        config.ingestion_settings(),
        transport,
        storage,
        hub.clone(),
    );

    tokio::spawn(log_trades(Arc::clone(&hub), config.broadcast.topic.clone()));
    tokio::spawn(stop_on_signal(client.handle()));

    let summary = client.run().await?;

    tracing::info!(
        frames = summary.frames_received,
        parsed = summary.records_parsed,
        parse_failures = summary.parse_failures,
        stored = summary.records_stored,
        storage_failures = summary.storage_failures,
        dropped = summary.records_dropped,
        connects = summary.connect_attempts,
        reconnects = summary.reconnects,
        "Binance Ingestor stopped"
    );
    Ok(())
}

/// Log every trade published on `topic`.
async fn log_trades(hub: Arc<BroadcastHub>, topic: String) {
    let mut trades = hub.subscribe_stream(&topic);
    tracing::debug!(
        topic = %topic,
        subscribers = hub.receiver_count(&topic),
        "Trade logger subscribed"
    );
    while let Some(item) = trades.next().await {
        match item {
            Ok(trade) => {
                tracing::info!(
                    symbol = %trade.ticker_symbol,
                    price = %trade.price,
                    volume = trade.volume.as_deref().unwrap_or("-"),
                    trade_time = %trade.trade_time,
                    "Trade"
                );
            }
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                tracing::warn!(skipped, "Trade logger lagged");
            }
        }
    }
}

/// Log the parsed configuration.
fn log_config(config: &IngestorConfig) {
    tracing::info!(
        symbol = %config.symbol,
        channel = %config.channel,
        batch_size = ?config.batch_size,
        max_records = ?config.max_records,
        topic = %config.broadcast.topic,
        metrics_port = config.metrics_port,
        "Configuration loaded"
    );
    tracing::debug!(
        stream_url = %config.stream_url(),
        output = ?config.output_path,
        reconnect = ?config.reconnect,
        "Stream settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Turn SIGINT or SIGTERM into a stop request.
async fn stop_on_signal(handle: ClientHandle) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    handle.stop();
}
