//! Fan-Out Hub
//!
//! Owns the registry of live streaming connections and relays every event
//! received from the bus to all of them, payload bytes unchanged and with
//! no per-subscriber filtering.
//!
//! # Architecture
//!
//! ```text
//!  EventBus ──► bridge task ──► ingest_event ──► queue ──► dispatcher ──► broadcast
//!                                                                          │
//!                                              ┌───────────────────────────┼──────────┐
//!                                              ▼                           ▼          ▼
//!                                          conn-1                       conn-2     conn-N
//! ```
//!
//! # Registry discipline
//!
//! The registry is a single `parking_lot::Mutex`. `broadcast` copies the
//! current members out under the lock, releases it, writes to every member
//! concurrently, and then removes exactly the members whose write failed in
//! a second short locked pass. No socket I/O ever runs under the lock, so a
//! stalled client cannot block registration, removal or other deliveries.
//!
//! There is no per-connection buffer: a client whose write fails is dropped
//! and its stream closed. Payloads go out as text frames, so an event that is
//! not valid UTF-8 is discarded rather than altered.

pub mod websocket;

use crate::application::ports::{BusError, EventBus, Subscription};
use crate::shared::metrics::METRICS;
use crate::shared::protocol::STREAM_TOPICS;
use async_trait::async_trait;
use bytes::Bytes;
use futures::future::join_all;
use futures::StreamExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

pub use websocket::{serve_connection, WsSubscriber};

/// Opaque handle of a registered connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// A subscriber's stream failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectionError {
    #[error("connection closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),
}

/// Write half of one streaming connection
#[async_trait]
pub trait Subscriber: Send + Sync {
    /// Sends one text frame carrying `payload`.
    async fn send_text(&self, payload: &str) -> Result<(), ConnectionError>;

    /// Closes the stream after the hub has dropped it. Best effort.
    async fn close(&self) {}
}

/// Outcome of one `broadcast` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Connections the payload was written to
    pub delivered: usize,
    /// Connections removed because their write failed
    pub dropped: usize,
}

pub struct FanOutHub {
    connections: Mutex<HashMap<ConnectionId, Arc<dyn Subscriber>>>,
    next_id: AtomicU64,
    queue_tx: mpsc::UnboundedSender<Arc<str>>,
    // 由唯一的 dispatcher 取走
    queue_rx: Mutex<Option<mpsc::UnboundedReceiver<Arc<str>>>>,
}

impl FanOutHub {
    pub fn new() -> Self {
        let (queue_tx, queue_rx) = mpsc::unbounded_channel();
        Self {
            connections: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_tx,
            queue_rx: Mutex::new(Some(queue_rx)),
        }
    }

    /// Adds a connection to the registry
    pub fn register(&self, subscriber: Arc<dyn Subscriber>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let count = {
            let mut connections = self.connections.lock();
            connections.insert(id, subscriber);
            connections.len()
        };
        METRICS.active_connections.set(count as f64);
        debug!(conn_id = %id, active = count, "connection registered");
        id
    }

    /// Removes a connection; returns `false` if it was already gone
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let (removed, count) = {
            let mut connections = self.connections.lock();
            let removed = connections.remove(&id).is_some();
            (removed, connections.len())
        };
        if removed {
            METRICS.active_connections.set(count as f64);
            debug!(conn_id = %id, active = count, "connection unregistered");
        }
        removed
    }

    pub fn connection_count(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn is_registered(&self, id: ConnectionId) -> bool {
        self.connections.lock().contains_key(&id)
    }

    /// Queues one bus event for broadcast, keeping bus order
    pub fn ingest_event(&self, topic: &str, payload: Bytes) {
        METRICS.events_ingested_total.with_label_values(&[topic]).inc();

        // 文本帧只能承载 UTF-8，原样转发不了的事件直接丢弃
        let text: Arc<str> = match std::str::from_utf8(&payload) {
            Ok(text) => Arc::from(text),
            Err(e) => {
                warn!(
                    topic,
                    error = %e,
                    bytes = payload.len(),
                    "payload is not valid UTF-8, event dropped"
                );
                return;
            }
        };

        if self.queue_tx.send(text).is_err() {
            debug!(topic, "broadcast queue closed, event dropped");
        } else {
            trace!(topic, bytes = payload.len(), "event queued for broadcast");
        }
    }

    /// Writes `payload` to every registered connection
    ///
    /// Connections whose write fails are removed; the rest are unaffected.
    pub async fn broadcast(&self, payload: &str) -> BroadcastReport {
        let snapshot: Vec<(ConnectionId, Arc<dyn Subscriber>)> = self
            .connections
            .lock()
            .iter()
            .map(|(id, subscriber)| (*id, Arc::clone(subscriber)))
            .collect();

        if snapshot.is_empty() {
            return BroadcastReport::default();
        }

        let results = join_all(snapshot.iter().map(|(id, subscriber)| async move {
            (*id, subscriber.send_text(payload).await)
        }))
        .await;

        let failed: Vec<(ConnectionId, Arc<dyn Subscriber>)> = results
            .into_iter()
            .zip(snapshot.iter())
            .filter_map(|((id, result), (_, subscriber))| {
                result.err().map(|e| {
                    debug!(conn_id = %id, error = %e, "write failed, dropping connection");
                    (id, Arc::clone(subscriber))
                })
            })
            .collect();

        let dropped = if failed.is_empty() {
            0
        } else {
            let (dropped, count) = {
                let mut connections = self.connections.lock();
                let dropped = failed
                    .iter()
                    .filter(|(id, _)| connections.remove(id).is_some())
                    .count();
                (dropped, connections.len())
            };
            METRICS.connection_drops_total.inc_by(dropped as f64);
            METRICS.active_connections.set(count as f64);

            // 锁外关闭，对端的读循环随之结束
            join_all(failed.iter().map(|(_, subscriber)| subscriber.close())).await;
            dropped
        };

        METRICS.broadcasts_total.inc();
        BroadcastReport {
            delivered: snapshot.len() - failed.len(),
            dropped,
        }
    }

    /// Drains the broadcast queue until shutdown
    ///
    /// Only the first caller gets the queue; later calls return at once.
    pub async fn run_dispatcher(self: Arc<Self>, shutdown: CancellationToken) {
        let Some(mut queue) = self.queue_rx.lock().take() else {
            warn!("broadcast dispatcher already running");
            return;
        };

        info!("broadcast dispatcher started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = queue.recv() => match next {
                    Some(payload) => {
                        let report = self.broadcast(&payload).await;
                        trace!(delivered = report.delivered, dropped = report.dropped, "broadcast done");
                    }
                    None => break,
                },
            }
        }
        info!("broadcast dispatcher stopped");
    }

    /// Feeds every event of `subscription` into `ingest_event` until the
    /// subscription ends or shutdown is requested
    pub async fn run_bridge(self: Arc<Self>, mut subscription: Subscription, shutdown: CancellationToken) {
        info!(topics = ?STREAM_TOPICS, "bus bridge started");
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                next = subscription.next() => match next {
                    Some(event) => self.ingest_event(&event.topic, event.payload),
                    None => {
                        warn!("bus subscription ended");
                        break;
                    }
                },
            }
        }
        info!("bus bridge stopped");
    }

    /// Subscribes to the stream topics and spawns the bridge task
    ///
    /// The subscription exists once this returns, so events published
    /// afterwards reach the hub.
    pub async fn attach(
        self: &Arc<Self>,
        bus: &dyn EventBus,
        shutdown: CancellationToken,
    ) -> Result<JoinHandle<()>, BusError> {
        let subscription = bus.subscribe(&STREAM_TOPICS).await?;
        Ok(tokio::spawn(Arc::clone(self).run_bridge(subscription, shutdown)))
    }
}

impl Default for FanOutHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bus::InMemoryEventBus;
    use std::sync::atomic::AtomicBool;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// 记录收到的所有帧，可切换为写失败
    #[derive(Default)]
    struct RecordingSubscriber {
        frames: Mutex<Vec<String>>,
        broken: AtomicBool,
        closed: AtomicBool,
    }

    impl RecordingSubscriber {
        fn broken() -> Self {
            let subscriber = Self::default();
            subscriber.broken.store(true, Ordering::SeqCst);
            subscriber
        }

        fn frames(&self) -> Vec<String> {
            self.frames.lock().clone()
        }
    }

    #[async_trait]
    impl Subscriber for RecordingSubscriber {
        async fn send_text(&self, payload: &str) -> Result<(), ConnectionError> {
            if self.broken.load(Ordering::SeqCst) {
                return Err(ConnectionError::Closed);
            }
            self.frames.lock().push(payload.to_string());
            Ok(())
        }

        async fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    /// 阻塞在写上直到被放行，用于验证广播时不持有注册表锁
    struct StalledSubscriber {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Subscriber for StalledSubscriber {
        async fn send_text(&self, _payload: &str) -> Result<(), ConnectionError> {
            self.release.notified().await;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_broadcast_reaches_all_connections() {
        let hub = FanOutHub::new();
        let subscribers: Vec<Arc<RecordingSubscriber>> =
            (0..5).map(|_| Arc::new(RecordingSubscriber::default())).collect();
        for s in &subscribers {
            hub.register(s.clone());
        }

        let report = hub.broadcast(r#"{"symbol":"TCS"}"#).await;

        assert_eq!(report, BroadcastReport { delivered: 5, dropped: 0 });
        for s in &subscribers {
            assert_eq!(s.frames(), vec![r#"{"symbol":"TCS"}"#.to_string()]);
        }
    }

    #[tokio::test]
    async fn test_failed_writes_remove_only_failing_connections() {
        let hub = FanOutHub::new();
        let healthy: Vec<Arc<RecordingSubscriber>> =
            (0..4).map(|_| Arc::new(RecordingSubscriber::default())).collect();
        let mut healthy_ids = Vec::new();
        for s in &healthy {
            healthy_ids.push(hub.register(s.clone()));
        }
        let broken_ids: Vec<ConnectionId> = (0..3)
            .map(|_| hub.register(Arc::new(RecordingSubscriber::broken())))
            .collect();
        assert_eq!(hub.connection_count(), 7);

        let report = hub.broadcast("payload").await;

        assert_eq!(report, BroadcastReport { delivered: 4, dropped: 3 });
        assert_eq!(hub.connection_count(), 4);
        assert!(healthy_ids.iter().all(|id| hub.is_registered(*id)));
        assert!(broken_ids.iter().all(|id| !hub.is_registered(*id)));
        for s in &healthy {
            assert_eq!(s.frames(), vec!["payload".to_string()]);
        }
    }

    #[tokio::test]
    async fn test_disconnected_connection_is_not_written_again() {
        let hub = FanOutHub::new();
        let stays = Arc::new(RecordingSubscriber::default());
        let leaves = Arc::new(RecordingSubscriber::default());
        hub.register(stays.clone());
        hub.register(leaves.clone());

        hub.broadcast("first").await;
        leaves.broken.store(true, Ordering::SeqCst);
        let report = hub.broadcast("second").await;
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });

        leaves.broken.store(false, Ordering::SeqCst);
        let report = hub.broadcast("third").await;

        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 0 });
        assert_eq!(stays.frames(), vec!["first", "second", "third"]);
        assert_eq!(leaves.frames(), vec!["first"]);
    }

    #[tokio::test]
    async fn test_unregister() {
        let hub = FanOutHub::new();
        let id = hub.register(Arc::new(RecordingSubscriber::default()));

        assert!(hub.unregister(id));
        assert!(!hub.unregister(id));
        assert_eq!(hub.broadcast("nobody").await, BroadcastReport::default());
    }

    #[tokio::test]
    async fn test_registry_usable_while_a_write_is_stalled() {
        let hub = Arc::new(FanOutHub::new());
        let release = Arc::new(Notify::new());
        hub.register(Arc::new(StalledSubscriber { release: release.clone() }));

        let broadcasting = tokio::spawn({
            let hub = hub.clone();
            async move { hub.broadcast("slow").await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        // 广播仍在进行中，注册/注销不应被阻塞
        let late = hub.register(Arc::new(RecordingSubscriber::default()));
        assert_eq!(hub.connection_count(), 2);
        assert!(hub.unregister(late));

        release.notify_one();
        let report = broadcasting.await.unwrap();
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 0 });
    }

    #[tokio::test]
    async fn test_bridge_and_dispatcher_relay_bus_events_in_order() {
        let bus = InMemoryEventBus::default();
        let hub = Arc::new(FanOutHub::new());
        let shutdown = CancellationToken::new();

        let first = Arc::new(RecordingSubscriber::default());
        let second = Arc::new(RecordingSubscriber::default());
        hub.register(first.clone());
        hub.register(second.clone());

        let dispatcher = tokio::spawn(hub.clone().run_dispatcher(shutdown.clone()));
        let bridge = hub.attach(&bus, shutdown.clone()).await.unwrap();

        bus.publish("order_updates", Bytes::from_static(br#"{"status":"PENDING"}"#)).await.unwrap();
        bus.publish("market_ticks", Bytes::from_static(br#"{"price":2500.0}"#)).await.unwrap();
        bus.publish("other_topic", Bytes::from_static(b"ignored")).await.unwrap();
        bus.publish("order_updates", Bytes::from_static(br#"{"status":"FILLED"}"#)).await.unwrap();

        for _ in 0..100 {
            if second.frames().len() == 3 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let expected = vec![
            r#"{"status":"PENDING"}"#.to_string(),
            r#"{"price":2500.0}"#.to_string(),
            r#"{"status":"FILLED"}"#.to_string(),
        ];
        assert_eq!(first.frames(), expected);
        assert_eq!(second.frames(), expected);

        shutdown.cancel();
        dispatcher.await.unwrap();
        bridge.await.unwrap();
    }

    #[tokio::test]
    async fn test_second_dispatcher_returns_immediately() {
        let hub = Arc::new(FanOutHub::new());
        let shutdown = CancellationToken::new();

        let first = tokio::spawn(hub.clone().run_dispatcher(shutdown.clone()));
        tokio::time::sleep(Duration::from_millis(10)).await;

        tokio::time::timeout(Duration::from_secs(1), hub.clone().run_dispatcher(shutdown.clone()))
            .await
            .unwrap();

        shutdown.cancel();
        first.await.unwrap();
    }

    #[tokio::test]
    async fn test_dropped_connections_are_closed() {
        let hub = FanOutHub::new();
        let healthy = Arc::new(RecordingSubscriber::default());
        let broken = Arc::new(RecordingSubscriber::broken());
        hub.register(healthy.clone());
        hub.register(broken.clone());

        let report = hub.broadcast("payload").await;

        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert!(broken.closed.load(Ordering::SeqCst));
        assert!(!healthy.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_non_utf8_payload_is_not_altered() {
        let hub = Arc::new(FanOutHub::new());
        let shutdown = CancellationToken::new();
        let subscriber = Arc::new(RecordingSubscriber::default());
        hub.register(subscriber.clone());
        let dispatcher = tokio::spawn(hub.clone().run_dispatcher(shutdown.clone()));

        hub.ingest_event("market_ticks", Bytes::from_static(&[0xff, 0xfe, b'x']));
        hub.ingest_event("market_ticks", Bytes::from_static(b"valid"));

        for _ in 0..100 {
            if !subscriber.frames().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(subscriber.frames(), vec!["valid"]);

        shutdown.cancel();
        dispatcher.await.unwrap();
    }
}
