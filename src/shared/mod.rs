/// Shared utilities and types used across all layers
///
/// This module contains:
/// - Protocol definitions (orders, ticks, bus events, topics)
/// - Prometheus metrics

pub mod protocol;
pub mod metrics;

// Re-export commonly used types
pub use protocol::{
    Event, Order, OrderId, OrderRequest, OrderStatus, OrderType, Side, Tick,
    MARKET_TICKS_TOPIC, ORDER_UPDATES_TOPIC, STREAM_TOPICS,
};

pub use metrics::METRICS;
