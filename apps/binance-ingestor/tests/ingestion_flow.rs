//! Ingestion Flow Integration Tests
//!
//! Drives the ingestion client end to end against a scripted transport, the
//! broadcast hub and the shipped storage adapters.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::VecDeque;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;
use tokio::time::timeout;

use binance_ingestor::application::ports::ConnectionState;
use binance_ingestor::{
    BroadcastConfig, BroadcastHub, ClientState, InMemoryTradeStore, IngestionSettings,
    JsonLinesTradeStore, ReconnectConfig, ReconnectPolicy, TradeIngestionClient, TradeTransport,
    TransportError,
};

const WAIT: Duration = Duration::from_secs(5);

fn frame(trade_id: u64) -> String {
    format!(
        r#"{{"e":"trade","E":1598520003277,"s":"BTCUSDT","t":{trade_id},"p":"11850.{trade_id}","q":"0.1","T":1598520003276,"m":true,"M":true}}"#
    )
}

/// Transport that replays a script, then signals `drained` and blocks.
struct ScriptedTransport {
    frames: VecDeque<Option<Result<String, TransportError>>>,
    refuse_connects: bool,
    policy: ReconnectPolicy,
    state: ConnectionState,
    connects: Arc<AtomicU32>,
    drained: Arc<Notify>,
}

impl ScriptedTransport {
    fn new(frames: Vec<Option<Result<String, TransportError>>>) -> Self {
        Self {
            frames: frames.into(),
            refuse_connects: false,
            policy: ReconnectPolicy::new(ReconnectConfig::default()),
            state: ConnectionState::Disconnected,
            connects: Arc::new(AtomicU32::new(0)),
            drained: Arc::new(Notify::new()),
        }
    }

    fn of_trades(ids: impl IntoIterator<Item = u64>) -> Self {
        Self::new(ids.into_iter().map(|id| Some(Ok(frame(id)))).collect())
    }
}

#[async_trait]
impl TradeTransport for ScriptedTransport {
    fn endpoint(&self) -> &str {
        "ws://scripted/ws/btcusdt@trade"
    }

    fn connection_state(&self) -> ConnectionState {
        self.state
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse_connects {
            return Err(TransportError::ConnectFailed {
                endpoint: self.endpoint().to_string(),
                reason: "connection refused".to_string(),
            });
        }
        self.state = ConnectionState::Connected;
        self.policy.reset();
        Ok(())
    }

    async fn next_frame(&mut self) -> Option<Result<String, TransportError>> {
        match self.frames.pop_front() {
            Some(Some(Ok(text))) => Some(Ok(text)),
            Some(end) => {
                self.state = ConnectionState::Disconnected;
                end
            }
            None => {
                self.drained.notify_one();
                std::future::pending().await
            }
        }
    }

    fn next_backoff_delay(&mut self) -> Option<Duration> {
        self.policy.next_delay()
    }

    async fn close(&mut self) {
        self.state = ConnectionState::Disconnected;
    }
}

fn settings(batch_size: Option<usize>) -> IngestionSettings {
    IngestionSettings {
        batch_size: batch_size.and_then(NonZeroUsize::new),
        ..IngestionSettings::default()
    }
}

#[tokio::test]
async fn batch_of_three_then_forced_flush_on_stop() {
    let store = Arc::new(InMemoryTradeStore::new());
    let hub = Arc::new(BroadcastHub::with_defaults());
    let transport = ScriptedTransport::of_trades(1..=5);
    let drained = transport.drained.clone();

    let mut client = TradeIngestionClient::new(settings(Some(3)), transport, store.clone(), hub);
    let handle = client.handle();
    let task = tokio::spawn(async move { client.run().await });

    timeout(WAIT, drained.notified()).await.unwrap();
    assert_eq!(store.trade_ids(), vec![1, 2, 3]);

    handle.stop();
    let summary = timeout(WAIT, task).await.unwrap().unwrap().unwrap();

    assert_eq!(store.trade_ids(), vec![1, 2, 3, 4, 5]);
    assert_eq!(summary.batch_flushes, 2);
    assert_eq!(handle.state(), ClientState::Stopped);
}

#[tokio::test]
async fn unbatched_records_reach_both_sinks_in_order() {
    let store = Arc::new(InMemoryTradeStore::new());
    let hub = Arc::new(BroadcastHub::new(BroadcastConfig { capacity: 16 }));
    let mut subscriber = hub.subscribe("binance_data");

    let transport = ScriptedTransport::of_trades(1..=3);
    let drained = transport.drained.clone();
    let mut client =
        TradeIngestionClient::new(settings(None), transport, store.clone(), hub.clone());
    let handle = client.handle();
    let task = tokio::spawn(async move { client.run().await });

    timeout(WAIT, drained.notified()).await.unwrap();
    assert_eq!(store.trade_ids(), vec![1, 2, 3]);

    let mut prices = Vec::new();
    for _ in 0..3 {
        prices.push(subscriber.recv().await.unwrap().price);
    }
    assert_eq!(prices, vec!["11850.1", "11850.2", "11850.3"]);

    handle.stop();
    timeout(WAIT, task).await.unwrap().unwrap().unwrap();
}

#[tokio::test]
async fn broadcast_event_shape() {
    let hub = Arc::new(BroadcastHub::with_defaults());
    let mut subscriber = hub.subscribe("trades");

    let mut client = TradeIngestionClient::new(
        IngestionSettings {
            topic: "trades".to_string(),
            max_records: Some(1),
            ..IngestionSettings::default()
        },
        ScriptedTransport::of_trades([7]),
        Arc::new(InMemoryTradeStore::new()),
        hub.clone(),
    );
    client.run().await.unwrap();

    let event = subscriber.recv().await.unwrap();
    assert_eq!(event.ticker_symbol, "BTCUSDT");
    assert_eq!(event.price, "11850.7");
    assert_eq!(event.volume.as_deref(), Some("0.1"));
    assert_eq!(event.trade_time, "2020-08-27T09:20:03.276Z");
}

#[tokio::test]
async fn malformed_frame_between_trades_is_skipped() {
    let store = Arc::new(InMemoryTradeStore::new());
    let transport = ScriptedTransport::new(vec![
        Some(Ok(frame(1))),
        Some(Ok(r#"{"s":"BTCUSDT","t":2,"p":11850.2}"#.to_string())),
        Some(Ok("not json at all".to_string())),
        Some(Ok(frame(3))),
    ]);
    let drained = transport.drained.clone();

    let mut client = TradeIngestionClient::new(
        settings(None),
        transport,
        store.clone(),
        Arc::new(BroadcastHub::with_defaults()),
    );
    let handle = client.handle();
    let task = tokio::spawn(async move { client.run().await });

    timeout(WAIT, drained.notified()).await.unwrap();
    assert_eq!(handle.state(), ClientState::Streaming);

    handle.stop();
    let summary = timeout(WAIT, task).await.unwrap().unwrap().unwrap();

    assert_eq!(store.trade_ids(), vec![1, 3]);
    assert_eq!(summary.parse_failures, 2);
    assert_eq!(summary.connect_attempts, 1);
}

#[tokio::test]
async fn storage_failure_is_isolated_to_one_record() {
    let store = Arc::new(InMemoryTradeStore::new());
    store.reject_trade_id(2);

    let mut client = TradeIngestionClient::new(
        IngestionSettings {
            max_records: Some(3),
            ..IngestionSettings::default()
        },
        ScriptedTransport::of_trades(1..=3),
        store.clone(),
        Arc::new(BroadcastHub::with_defaults()),
    );

    let summary = client.run().await.unwrap();

    assert_eq!(store.trade_ids(), vec![1, 3]);
    assert_eq!(store.failure_count(), 1);
    assert_eq!(summary.storage_failures, 1);
    assert_eq!(summary.records_stored, 2);
}

#[tokio::test(start_paused = true)]
async fn stream_drop_reconnects_and_resumes() {
    let store = Arc::new(InMemoryTradeStore::new());
    let transport = ScriptedTransport::new(vec![
        Some(Ok(frame(1))),
        Some(Err(TransportError::StreamInterrupted(
            "connection reset".to_string(),
        ))),
        Some(Ok(frame(2))),
        None,
        Some(Ok(frame(3))),
    ]);
    let connects = transport.connects.clone();

    let mut client = TradeIngestionClient::new(
        IngestionSettings {
            max_records: Some(3),
            ..IngestionSettings::default()
        },
        transport,
        store.clone(),
        Arc::new(BroadcastHub::with_defaults()),
    );

    let summary = client.run().await.unwrap();

    assert_eq!(store.trade_ids(), vec![1, 2, 3]);
    assert_eq!(connects.load(Ordering::SeqCst), 3);
    assert_eq!(summary.reconnects, 2);
}

#[tokio::test(start_paused = true)]
async fn stop_while_reconnecting_prevents_further_attempts() {
    let store = Arc::new(InMemoryTradeStore::new());
    let mut transport = ScriptedTransport::new(Vec::new());
    transport.refuse_connects = true;
    let connects = transport.connects.clone();

    let mut client = TradeIngestionClient::new(
        settings(Some(10)),
        transport,
        store.clone(),
        Arc::new(BroadcastHub::with_defaults()),
    );
    let handle = client.handle();
    let task = tokio::spawn(async move { client.run().await });

    handle
        .wait_until(|s| s == ClientState::Reconnecting)
        .await;
    handle.stop();
    timeout(WAIT, task).await.unwrap().unwrap().unwrap();

    let attempts = connects.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(600)).await;

    assert_eq!(connects.load(Ordering::SeqCst), attempts);
    assert_eq!(handle.state(), ClientState::Stopped);
    assert!(store.is_empty());
}

#[tokio::test]
async fn json_lines_store_receives_flushes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trades.jsonl");
    let store = Arc::new(JsonLinesTradeStore::open(&path).await.unwrap());

    let mut client = TradeIngestionClient::new(
        IngestionSettings {
            batch_size: NonZeroUsize::new(2),
            max_records: Some(3),
            ..IngestionSettings::default()
        },
        ScriptedTransport::of_trades(1..=3),
        store,
        Arc::new(BroadcastHub::with_defaults()),
    );
    client.run().await.unwrap();

    let contents = tokio::fs::read_to_string(&path).await.unwrap();
    let ids: Vec<u64> = contents
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["trade_id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2, 3]);
}
