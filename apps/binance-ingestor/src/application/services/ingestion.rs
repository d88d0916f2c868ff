//! Trade Ingestion Client
//!
//! Drives one exchange stream from start to stop:
//!
//! ```text
//! Idle ─► Connecting ─► Streaming ◄──► Reconnecting
//!   │          │            │               │
//!   └──────────┴────────────┴───────────────┴──► Stopping ─► Stopped
//! ```
//!
//! Every frame is parsed, offered to the batch accumulator (flushed to the
//! storage sink when full) and published to the broadcast sink. Storage and
//! broadcast are awaited in line, so both sinks see records in parse order.
//!
//! Connection failures and stream drops are retried with the transport's
//! backoff until [`ClientHandle::stop`] is called. The stop request is raced
//! against the connect attempt, the frame read and the backoff sleep. On stop
//! the accumulator is flushed within `shutdown_grace`; records still unwritten
//! when it elapses are counted in [`IngestionSummary::records_dropped`]. The
//! transport is closed afterwards under its own `shutdown_grace` bound.

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{
    BroadcastSink, StorageSink, TradeBroadcast, TradeTransport, TransportError,
};
use crate::domain::batching::BatchAccumulator;
use crate::domain::streaming::ClientState;
use crate::domain::trade::TradeRecord;
use crate::infrastructure::binance::TradeCodec;
use crate::infrastructure::metrics;

// =============================================================================
// Settings, Summary, Errors
// =============================================================================

/// Parameters the client runs with.
#[derive(Debug, Clone)]
pub struct IngestionSettings {
    /// Trading pair, e.g. `btcusdt`.
    pub symbol: String,
    /// Stream channel, e.g. `trade`.
    pub channel: String,
    /// Records per storage flush (`None` = store each record immediately).
    pub batch_size: Option<NonZeroUsize>,
    /// Broadcast topic.
    pub topic: String,
    /// Stop after this many parsed records.
    pub max_records: Option<u64>,
    /// Upper bound on the final flush and close.
    pub shutdown_grace: Duration,
}

impl Default for IngestionSettings {
    fn default() -> Self {
        Self {
            symbol: "btcusdt".to_string(),
            channel: "trade".to_string(),
            batch_size: None,
            topic: "binance_data".to_string(),
            max_records: None,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

impl IngestionSettings {
    /// Check for values the client cannot run with.
    ///
    /// # Errors
    ///
    /// Returns [`IngestionError::Config`] for an empty symbol, channel or
    /// topic, or a zero record limit.
    pub fn validate(&self) -> Result<(), IngestionError> {
        let empty = |what: &str| IngestionError::Config(format!("{what} cannot be empty"));

        if self.symbol.trim().is_empty() {
            return Err(empty("symbol"));
        }
        if self.channel.trim().is_empty() {
            return Err(empty("channel"));
        }
        if self.topic.trim().is_empty() {
            return Err(empty("broadcast topic"));
        }
        if self.max_records == Some(0) {
            return Err(IngestionError::Config(
                "record limit must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Counters reported when [`TradeIngestionClient::run`] returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestionSummary {
    /// Text frames received.
    pub frames_received: u64,
    /// Frames parsed into records.
    pub records_parsed: u64,
    /// Frames discarded by the parser.
    pub parse_failures: u64,
    /// Records accepted by the storage sink.
    pub records_stored: u64,
    /// Records the storage sink rejected.
    pub storage_failures: u64,
    /// Failed broadcast publishes.
    pub broadcast_failures: u64,
    /// Connect attempts, including the first.
    pub connect_attempts: u64,
    /// Backoff waits taken.
    pub reconnects: u64,
    /// Batches handed to storage; zero when unbatched.
    pub batch_flushes: u64,
    /// Buffered records abandoned when the shutdown grace period elapsed.
    pub records_dropped: u64,
}

/// Errors that end [`TradeIngestionClient::run`].
#[derive(Debug, thiserror::Error)]
pub enum IngestionError {
    /// Settings are unusable.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The stream endpoint cannot be dialled.
    #[error("{0}")]
    InvalidEndpoint(#[source] TransportError),

    /// The configured reconnection ceiling was reached.
    #[error("gave up after {attempts} consecutive reconnection attempts")]
    RetriesExhausted {
        /// Consecutive failed attempts.
        attempts: u32,
    },

    /// `run` was already called on this client.
    #[error("ingestion client already started")]
    AlreadyStarted,
}

// =============================================================================
// Client Handle
// =============================================================================

/// Cloneable control handle for a running client.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    cancel: CancellationToken,
    state: watch::Receiver<ClientState>,
}

impl ClientHandle {
    /// Ask the client to stop. Idempotent; valid in any state.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Current client state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        *self.state.borrow()
    }

    /// Receiver for state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ClientState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`.
    ///
    /// Returns the last published state if the client is dropped first.
    pub async fn wait_until(&self, mut predicate: impl FnMut(ClientState) -> bool) -> ClientState {
        let mut rx = self.state.clone();
        let reached = rx.wait_for(|s| predicate(*s)).await.map(|s| *s);
        reached.unwrap_or_else(|_| *rx.borrow())
    }
}

// =============================================================================
// Ingestion Client
// =============================================================================

enum StreamEnd {
    Stopped,
    Closed,
    Interrupted(TransportError),
}

/// Client that ingests one trade stream.
pub struct TradeIngestionClient<T> {
    settings: IngestionSettings,
    transport: T,
    codec: TradeCodec,
    storage: Arc<dyn StorageSink>,
    broadcast: Arc<dyn BroadcastSink>,
    accumulator: BatchAccumulator,
    state_tx: watch::Sender<ClientState>,
    cancel: CancellationToken,
    summary: IngestionSummary,
    consecutive_failures: u32,
    started: bool,
}

impl<T: TradeTransport> TradeIngestionClient<T> {
    /// Create an idle client.
    pub fn new(
        settings: IngestionSettings,
        transport: T,
        storage: Arc<dyn StorageSink>,
        broadcast: Arc<dyn BroadcastSink>,
    ) -> Self {
        let accumulator = BatchAccumulator::new(settings.batch_size);
        let (state_tx, _) = watch::channel(ClientState::Idle);
        Self {
            settings,
            transport,
            codec: TradeCodec::new(),
            storage,
            broadcast,
            accumulator,
            state_tx,
            cancel: CancellationToken::new(),
            summary: IngestionSummary::default(),
            consecutive_failures: 0,
            started: false,
        }
    }

    /// Control handle for this client.
    #[must_use]
    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            cancel: self.cancel.clone(),
            state: self.state_tx.subscribe(),
        }
    }

    /// Current client state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        *self.state_tx.borrow()
    }

    /// Counters so far.
    #[must_use]
    pub const fn summary(&self) -> IngestionSummary {
        self.summary
    }

    /// Run until stopped.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid settings, an endpoint that cannot be
    /// dialled, an exhausted retry ceiling, or a second call.
    pub async fn run(&mut self) -> Result<IngestionSummary, IngestionError> {
        if self.started {
            return Err(IngestionError::AlreadyStarted);
        }
        self.started = true;
        self.settings.validate()?;

        tracing::info!(
            symbol = %self.settings.symbol,
            channel = %self.settings.channel,
            endpoint = %self.transport.endpoint(),
            batch_size = ?self.settings.batch_size,
            topic = %self.settings.topic,
            "Starting trade ingestion"
        );

        let outcome = if self.cancel.is_cancelled() {
            Ok(())
        } else {
            self.set_state(ClientState::Connecting);
            self.drive().await
        };

        self.shutdown().await;

        tracing::info!(summary = ?self.summary, "Trade ingestion stopped");
        outcome.map(|()| self.summary)
    }

    async fn drive(&mut self) -> Result<(), IngestionError> {
        loop {
            let attempt = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return Ok(()),
                result = self.transport.connect() => result,
            };
            self.summary.connect_attempts += 1;
            metrics::record_connect_attempt();

            if let Err(e) = attempt {
                if !e.is_retryable() {
                    tracing::error!(error = %e, "Endpoint rejected; not retrying");
                    return Err(IngestionError::InvalidEndpoint(e));
                }
                tracing::warn!(error = %e, "Connect attempt failed");
                self.set_state(ClientState::Reconnecting);
                if !self.back_off().await? {
                    return Ok(());
                }
                continue;
            }

            self.consecutive_failures = 0;
            self.set_state(ClientState::Streaming);

            match self.stream().await {
                StreamEnd::Stopped => return Ok(()),
                StreamEnd::Closed => {
                    tracing::warn!("Stream closed by peer");
                }
                StreamEnd::Interrupted(e) => {
                    tracing::warn!(error = %e, "Stream interrupted");
                }
            }

            self.set_state(ClientState::Reconnecting);
            if !self.back_off().await? {
                return Ok(());
            }
        }
    }

    /// Wait out the next backoff delay. `Ok(false)` means stop was requested.
    async fn back_off(&mut self) -> Result<bool, IngestionError> {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        let Some(delay) = self.transport.next_backoff_delay() else {
            tracing::error!(
                attempts = self.consecutive_failures,
                "Reconnection attempts exhausted"
            );
            return Err(IngestionError::RetriesExhausted {
                attempts: self.consecutive_failures,
            });
        };

        self.summary.reconnects += 1;
        metrics::record_reconnect();
        tracing::info!(
            attempt = self.consecutive_failures,
            delay_ms = delay.as_millis(),
            "Reconnecting to stream"
        );

        tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                tracing::info!("Stop requested during reconnect delay");
                Ok(false)
            }
            () = tokio::time::sleep(delay) => Ok(true),
        }
    }

    async fn stream(&mut self) -> StreamEnd {
        loop {
            let frame = tokio::select! {
                biased;
                () = self.cancel.cancelled() => return StreamEnd::Stopped,
                frame = self.transport.next_frame() => frame,
            };

            match frame {
                Some(Ok(text)) => {
                    self.handle_frame(&text).await;
                    if self.limit_reached() {
                        tracing::info!(
                            records = self.summary.records_parsed,
                            "Record limit reached"
                        );
                        self.cancel.cancel();
                        return StreamEnd::Stopped;
                    }
                }
                Some(Err(e)) => return StreamEnd::Interrupted(e),
                None => return StreamEnd::Closed,
            }
        }
    }

    async fn handle_frame(&mut self, text: &str) {
        self.summary.frames_received += 1;
        metrics::record_frame_received();

        let record = match self.codec.decode(text) {
            Ok(record) => record,
            Err(e) => {
                self.summary.parse_failures += 1;
                metrics::record_parse_failure(e.kind());
                tracing::warn!(kind = e.kind(), error = %e, "Discarding frame");
                return;
            }
        };

        self.summary.records_parsed += 1;
        metrics::record_record_parsed();
        tracing::trace!(
            symbol = record.ticker_symbol(),
            trade_id = record.trade_id(),
            price = %record.price(),
            "Parsed trade"
        );

        let event = TradeBroadcast::from(&record);
        if self.accumulator.offer(record) {
            self.flush().await;
        }
        self.publish(event).await;
    }

    fn limit_reached(&self) -> bool {
        self.settings
            .max_records
            .is_some_and(|max| self.summary.records_parsed >= max)
    }

    async fn flush(&mut self) {
        let batch = self.accumulator.flush();
        let mut written = 0;
        self.write_batch(&batch, &mut written).await;
    }

    /// Store `batch` in order. `written` counts completed store calls so a
    /// cancelled write can report what was left.
    async fn write_batch(&mut self, batch: &[TradeRecord], written: &mut usize) {
        if batch.is_empty() {
            return;
        }

        let started = Instant::now();
        for record in batch {
            self.store(record).await;
            *written += 1;
        }

        if self.accumulator.is_batching() {
            self.summary.batch_flushes += 1;
            metrics::record_batch_flush(started.elapsed());
            tracing::debug!(records = batch.len(), "Flushed batch");
        }
    }

    async fn store(&mut self, record: &TradeRecord) {
        match self.storage.store(record).await {
            Ok(()) => {
                self.summary.records_stored += 1;
                metrics::record_record_stored();
            }
            Err(e) => {
                self.summary.storage_failures += 1;
                metrics::record_storage_failure();
                tracing::error!(trade_id = record.trade_id(), error = %e, "Failed to store trade");
            }
        }
    }

    async fn publish(&mut self, event: TradeBroadcast) {
        if let Err(e) = self.broadcast.publish(&self.settings.topic, event).await {
            self.summary.broadcast_failures += 1;
            metrics::record_broadcast_failure();
            tracing::warn!(topic = %self.settings.topic, error = %e, "Failed to broadcast trade");
        }
    }

    async fn shutdown(&mut self) {
        self.set_state(ClientState::Stopping);

        let pending = self.accumulator.flush();
        if !pending.is_empty() {
            tracing::info!(pending = pending.len(), "Flushing buffered trades");
        }

        let grace = self.settings.shutdown_grace;
        let mut written = 0;
        let flushed = tokio::time::timeout(grace, self.write_batch(&pending, &mut written)).await;

        if flushed.is_err() {
            let dropped = u64::try_from(pending.len() - written).unwrap_or(u64::MAX);
            self.summary.records_dropped += dropped;
            metrics::record_records_dropped(dropped);
            tracing::error!(
                grace_ms = grace.as_millis(),
                dropped,
                first_trade_id = pending.get(written).map(TradeRecord::trade_id),
                "Shutdown grace period elapsed; buffered trades were not stored"
            );
        }

        if tokio::time::timeout(grace, self.transport.close()).await.is_err() {
            tracing::warn!(grace_ms = grace.as_millis(), "Transport close timed out");
        }

        self.set_state(ClientState::Stopped);
    }

    fn set_state(&self, next: ClientState) {
        let current = *self.state_tx.borrow();
        if current == next {
            return;
        }
        if current.is_terminal() {
            tracing::warn!(to = %next, "Ignoring state change after stop");
            return;
        }
        if !current.can_transition_to(next) {
            tracing::warn!(from = %current, to = %next, "Unexpected state transition");
        }
        tracing::debug!(from = %current, to = %next, "Client state changed");
        self.state_tx.send_replace(next);
        metrics::set_client_state(next);
    }
}

impl<T> std::fmt::Debug for TradeIngestionClient<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TradeIngestionClient")
            .field("settings", &self.settings)
            .field("state", &*self.state_tx.borrow())
            .field("buffered", &self.accumulator.len())
            .field("summary", &self.summary)
            .finish_non_exhaustive()
    }
}
