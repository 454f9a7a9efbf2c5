//! Observability Module
//!
//! 提供系统可观测性功能：
//! - Prometheus metrics导出（见 `shared::metrics`）
//! - 健康检查
//!
//! HTTP 端点由 `interfaces::http` 挂载。

pub mod health;

pub use health::{HealthChecker, HealthDetails, HealthResponse, HealthStatus};
