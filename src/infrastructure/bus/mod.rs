//! In-memory event bus
//!
//! A single tokio broadcast channel carries every `(topic, payload)` event;
//! each subscription filters it down to the topics it asked for. Publishing
//! with no subscribers succeeds and the event is dropped, the same way a
//! pub/sub server behaves.
//!
//! A subscriber that falls more than `capacity` events behind loses the
//! oldest ones (at-most-once delivery); the loss is logged.

use crate::application::ports::{BusError, EventBus, Subscription};
use crate::shared::protocol::Event;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use parking_lot::RwLock;
use std::collections::HashSet;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{trace, warn};

/// 默认通道容量
pub const DEFAULT_BUS_CAPACITY: usize = 1024;

pub struct InMemoryEventBus {
    // None after close(); dropping the sender ends every subscription
    sender: RwLock<Option<broadcast::Sender<Event>>>,
}

impl InMemoryEventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: RwLock::new(Some(sender)),
        }
    }

    /// Shuts the bus down: later publishes fail and open subscriptions end.
    pub fn close(&self) {
        self.sender.write().take();
    }

    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender
            .read()
            .as_ref()
            .map(|s| s.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new(DEFAULT_BUS_CAPACITY)
    }
}

#[async_trait]
impl EventBus for InMemoryEventBus {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError> {
        let guard = self.sender.read();
        let sender = guard.as_ref().ok_or(BusError::Closed)?;

        // Err 仅表示当前没有订阅者
        let receivers = sender.send(Event::new(topic, payload)).unwrap_or(0);
        trace!(topic, receivers, "event published");
        Ok(())
    }

    async fn subscribe(&self, topics: &[&str]) -> Result<Subscription, BusError> {
        let receiver = self
            .sender
            .read()
            .as_ref()
            .ok_or(BusError::Closed)?
            .subscribe();
        let topics: HashSet<String> = topics.iter().map(|t| t.to_string()).collect();

        let events = stream::unfold((receiver, topics), |(mut receiver, topics)| async move {
            loop {
                match receiver.recv().await {
                    Ok(event) if topics.contains(&event.topic) => {
                        return Some((event, (receiver, topics)));
                    }
                    Ok(_) => continue,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "bus subscriber lagged, events dropped");
                    }
                    Err(RecvError::Closed) => return None,
                }
            }
        });

        Ok(Box::pin(events))
    }
}
