//! WebSocket connections for the fan-out hub
//!
//! The streaming channel is outbound-only: the read half exists purely to
//! notice when the client goes away, and whatever it sends is discarded.

use super::{ConnectionError, ConnectionId, FanOutHub, Subscriber};
use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Write half of an upgraded WebSocket
pub struct WsSubscriber {
    // tokio Mutex: held across the send await
    sink: Mutex<SplitSink<WebSocket, Message>>,
}

impl WsSubscriber {
    pub fn new(sink: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sink: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl Subscriber for WsSubscriber {
    async fn send_text(&self, payload: &str) -> Result<(), ConnectionError> {
        self.sink
            .lock()
            .await
            .send(Message::Text(payload.to_owned()))
            .await
            .map_err(|e| ConnectionError::Send(e.to_string()))
    }

    async fn close(&self) {
        let mut sink = self.sink.lock().await;
        if let Err(e) = sink.send(Message::Close(None)).await {
            debug!(error = %e, "close frame not sent");
        }
        let _ = sink.close().await;
    }
}

/// Registers an upgraded socket and runs its liveness loop
///
/// Returns once the client closes, errors, or the stream ends; the
/// connection is unregistered before returning.
pub async fn serve_connection(hub: Arc<FanOutHub>, socket: WebSocket) -> ConnectionId {
    let (sink, mut stream) = socket.split();
    let id = hub.register(Arc::new(WsSubscriber::new(sink)));
    info!(conn_id = %id, "stream client connected");

    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Close(_)) => break,
            // 入站消息一律丢弃
            Ok(_) => {}
            Err(e) => {
                debug!(conn_id = %id, error = %e, "stream read failed");
                break;
            }
        }
    }

    hub.unregister(id);
    info!(conn_id = %id, "stream client disconnected");
    id
}
