//! Order Stream - order lifecycle manager with real-time fan-out
//!
//! Layers (inside → outside):
//! - `shared`: wire types (orders, ticks, bus events) and metrics
//! - `domain`: order state machine and admission validation
//! - `application`: ports (store, bus) and the order lifecycle use case
//! - `infrastructure`: in-memory bus/store adapters, the fan-out hub,
//!   the simulated tick feed and health checks
//! - `interfaces`: HTTP/WebSocket routes and the CLI entry point

// 全局内存分配器：使用 jemalloc 提升性能
// 每个连接、每笔订单快照都在堆上分配，jemalloc 在多线程扇出时碎片更少
#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

pub mod shared;
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod interfaces;
pub mod runtime;

pub use application::{OrderError, OrderLifecycleManager};
pub use infrastructure::hub::FanOutHub;
pub use runtime::{ServiceConfig, ServiceRuntime};
pub use shared::protocol::{Order, OrderRequest, OrderStatus, OrderType, Side};
