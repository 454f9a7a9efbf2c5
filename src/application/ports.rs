/// Ports - interfaces to the external collaborators
///
/// The order lifecycle use case only talks to a durable keyed store and a
/// topic-based event bus. Both are injected as trait objects; the in-memory
/// adapters live in `infrastructure`.

use crate::shared::protocol::{Event, Order, OrderId, OrderStatus};
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use thiserror::Error;

/// Store failures. Any of these aborts admission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// insert-if-absent found an existing record
    #[error("order {0} already exists")]
    Duplicate(OrderId),

    #[error("order {0} not found")]
    NotFound(OrderId),

    #[error("order {id}: illegal transition {from} -> {to}")]
    IllegalTransition {
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    },

    #[error("order store unavailable: {0}")]
    Unavailable(String),
}

/// Bus failures at publish or subscribe time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BusError {
    #[error("event bus is closed")]
    Closed,

    #[error("event bus unavailable: {0}")]
    Unavailable(String),
}

/// Durable keyed order records.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Inserts a new record; fails with `Duplicate` if the id is taken.
    async fn save(&self, order: &Order) -> Result<(), StoreError>;

    /// Moves a stored order to `status` and returns the updated snapshot.
    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, StoreError>;

    /// 读取订单当前持久化状态
    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError>;
}

/// Stream of events delivered to one subscription, in bus order.
pub type Subscription = BoxStream<'static, Event>;

/// Topic-based publish/subscribe transport.
///
/// Delivery is at-most-once and best-effort; there is no ordering
/// guarantee across topics.
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn publish(&self, topic: &str, payload: Bytes) -> Result<(), BusError>;

    async fn subscribe(&self, topics: &[&str]) -> Result<Subscription, BusError>;
}
