//! Health Check
//!
//! 服务健康状态，供负载均衡器和监控系统使用
//!
//! ## 健康检查端点
//! - `/health` - 详细健康信息
//! - `/health/ready` - 就绪检查（总线已桥接、可以接受流量）
//! - `/health/live` - 存活检查
//!
//! ## 响应格式
//! ```json
//! {
//!   "status": "healthy",
//!   "uptime_seconds": 3600,
//!   "version": "0.1.0",
//!   "timestamp": 1234567890,
//!   "details": { "active_connections": 2, "executions_in_flight": 1, ... }
//! }
//! ```

use crate::shared::metrics::METRICS;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// 健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// 启动中（总线尚未桥接）
    Starting,
    /// 健康
    Healthy,
    /// 降级（例如总线桥接已结束）
    Degraded,
    /// 关闭中
    Unhealthy,
}

/// 健康检查响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    /// 运行时间（秒）
    pub uptime_seconds: u64,
    pub version: String,
    /// Unix 秒
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

/// 详细健康信息
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthDetails {
    /// 活跃流连接数
    pub active_connections: usize,
    /// 在途模拟执行任务数
    pub executions_in_flight: usize,
    /// 受理订单总数
    pub total_orders: u64,
    /// 模拟成交总数
    pub total_fills: u64,
}

impl HealthDetails {
    /// 从全局指标补齐累计值
    pub fn collect(active_connections: usize, executions_in_flight: usize) -> Self {
        let total_orders = ["BUY", "SELL"]
            .iter()
            .map(|side| METRICS.orders_total.with_label_values(&[*side]).get() as u64)
            .sum();

        Self {
            active_connections,
            executions_in_flight,
            total_orders,
            total_fills: METRICS.fills_total.get() as u64,
        }
    }
}

/// 健康检查器
pub struct HealthChecker {
    start_time: SystemTime,
    status: Arc<RwLock<HealthStatus>>,
    version: String,
}

impl HealthChecker {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            start_time: SystemTime::now(),
            status: Arc::new(RwLock::new(HealthStatus::Starting)),
            version: version.into(),
        }
    }

    /// 获取运行时间（秒）
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time
            .elapsed()
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    fn current_timestamp() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }

    pub fn set_status(&self, status: HealthStatus) {
        *self.status.write() = status;
    }

    pub fn get_status(&self) -> HealthStatus {
        *self.status.read()
    }

    pub fn check_health(&self) -> HealthResponse {
        HealthResponse {
            status: self.get_status(),
            uptime_seconds: self.uptime_seconds(),
            version: self.version.clone(),
            timestamp: Self::current_timestamp(),
            details: None,
        }
    }

    pub fn check_health_detailed(&self, details: HealthDetails) -> HealthResponse {
        HealthResponse {
            details: Some(details),
            ..self.check_health()
        }
    }

    /// 存活检查（liveness probe）
    pub fn check_liveness(&self) -> bool {
        // 只要能返回就说明进程还活着
        true
    }

    /// 就绪检查（readiness probe）
    pub fn check_readiness(&self) -> bool {
        matches!(self.get_status(), HealthStatus::Healthy)
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new(env!("CARGO_PKG_VERSION"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_checker_starts_not_ready() {
        let checker = HealthChecker::new("1.0.0");
        assert_eq!(checker.version, "1.0.0");
        assert_eq!(checker.get_status(), HealthStatus::Starting);
        assert!(!checker.check_readiness());
        assert!(checker.check_liveness());
    }

    #[test]
    fn test_readiness_probe() {
        let checker = HealthChecker::new("1.0.0");

        checker.set_status(HealthStatus::Healthy);
        assert!(checker.check_readiness());

        checker.set_status(HealthStatus::Degraded);
        assert!(!checker.check_readiness());

        // 即使不健康，存活检查也应该通过
        checker.set_status(HealthStatus::Unhealthy);
        assert!(!checker.check_readiness());
        assert!(checker.check_liveness());
    }

    #[test]
    fn test_health_response_detailed() {
        let checker = HealthChecker::new("1.0.0");
        checker.set_status(HealthStatus::Healthy);

        let response = checker.check_health_detailed(HealthDetails {
            active_connections: 3,
            executions_in_flight: 1,
            total_orders: 10,
            total_fills: 9,
        });

        assert_eq!(response.status, HealthStatus::Healthy);
        assert!(response.timestamp > 0);
        let details = response.details.unwrap();
        assert_eq!(details.active_connections, 3);
        assert_eq!(details.executions_in_flight, 1);
    }

    #[test]
    fn test_serialization() {
        let response = HealthResponse {
            status: HealthStatus::Healthy,
            uptime_seconds: 3600,
            version: "1.0.0".to_string(),
            timestamp: 1234567890,
            details: None,
        };

        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"healthy\""));
        assert!(json.contains("3600"));
        assert!(!json.contains("details"));
    }
}
