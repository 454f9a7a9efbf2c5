//! Prometheus Metrics Module
//!
//! 订单生命周期与扇出广播的核心指标
//!
//! ## 指标类型
//! - **Counter**: 订单受理/拒绝数、成交数、发布失败数、广播数、断开连接数
//! - **Gauge**: 活跃流连接数、在途模拟执行任务数
//!
//! ## 使用示例
//! ```rust,ignore
//! use order_stream::shared::metrics::METRICS;
//!
//! METRICS.orders_total.with_label_values(&["BUY"]).inc();
//! METRICS.active_connections.set(3.0);
//! ```

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, Counter, CounterVec, Encoder, Gauge,
    TextEncoder,
};

lazy_static! {
    /// 全局Metrics实例
    pub static ref METRICS: Metrics = Metrics::new();
}

/// 服务核心指标
pub struct Metrics {
    /// 受理订单总数 (按方向: BUY/SELL)
    pub orders_total: CounterVec,

    /// 受理被拒绝的请求 (按原因: validation/persistence)
    pub order_rejections_total: CounterVec,

    /// 模拟成交总数
    pub fills_total: Counter,

    /// 模拟成交时存储更新失败次数
    pub fill_failures_total: Counter,

    /// 事件总线发布失败次数 (按主题)
    pub publish_failures_total: CounterVec,

    /// 从总线摄入的事件数 (按主题)
    pub events_ingested_total: CounterVec,

    /// 广播的消息数
    pub broadcasts_total: Counter,

    /// 因写失败被移除的连接数
    pub connection_drops_total: Counter,

    /// 当前活跃的流连接数
    pub active_connections: Gauge,

    /// 在途的模拟执行任务数
    pub executions_in_flight: Gauge,
}

impl Metrics {
    /// 注册全部指标，仅由 `METRICS` 调用一次
    fn new() -> Self {
        Self {
            orders_total: register_counter_vec!(
                "order_stream_orders_total",
                "Total number of admitted orders",
                &["side"]
            )
            .expect("orders_total registers once"),

            order_rejections_total: register_counter_vec!(
                "order_stream_order_rejections_total",
                "Total number of order requests that were not admitted",
                &["reason"]
            )
            .expect("order_rejections_total registers once"),

            fills_total: register_counter!(
                "order_stream_fills_total",
                "Total number of simulated fills"
            )
            .expect("fills_total registers once"),

            fill_failures_total: register_counter!(
                "order_stream_fill_failures_total",
                "Simulated fills whose store update failed"
            )
            .expect("fill_failures_total registers once"),

            publish_failures_total: register_counter_vec!(
                "order_stream_publish_failures_total",
                "Event bus publications that failed",
                &["topic"]
            )
            .expect("publish_failures_total registers once"),

            events_ingested_total: register_counter_vec!(
                "order_stream_events_ingested_total",
                "Events received from the bus for broadcast",
                &["topic"]
            )
            .expect("events_ingested_total registers once"),

            broadcasts_total: register_counter!(
                "order_stream_broadcasts_total",
                "Payloads broadcast to streaming connections"
            )
            .expect("broadcasts_total registers once"),

            connection_drops_total: register_counter!(
                "order_stream_connection_drops_total",
                "Streaming connections removed after a failed write"
            )
            .expect("connection_drops_total registers once"),

            active_connections: register_gauge!(
                "order_stream_active_connections",
                "Number of live streaming connections"
            )
            .expect("active_connections registers once"),

            executions_in_flight: register_gauge!(
                "order_stream_executions_in_flight",
                "Simulated-execution tasks not yet finished"
            )
            .expect("executions_in_flight registers once"),
        }
    }

    /// 导出Prometheus格式的指标
    pub fn export(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = prometheus::gather();
        let mut buffer = vec![];
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::warn!(error = %e, "failed to encode metrics");
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
