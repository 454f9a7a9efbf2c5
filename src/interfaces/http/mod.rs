//! HTTP / WebSocket interface
//!
//! ## 端点
//! - `POST /orders` - 提交订单，返回 PENDING 快照
//! - `GET /orders/:id` - 查询订单
//! - `GET /stream` - WebSocket 推送（`market_ticks` 与 `order_updates`）
//! - `GET /metrics` - Prometheus格式的指标
//! - `GET /health`, `/health/ready`, `/health/live` - 健康检查

use crate::application::{OrderError, OrderLifecycleManager};
use crate::infrastructure::hub::{serve_connection, FanOutHub};
use crate::infrastructure::observability::{HealthChecker, HealthDetails, HealthStatus};
use crate::shared::metrics::METRICS;
use crate::shared::protocol::{OrderId, OrderRequest};
use axum::{
    extract::{rejection::JsonRejection, ws::WebSocketUpgrade, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub manager: OrderLifecycleManager,
    pub hub: Arc<FanOutHub>,
    pub health: Arc<HealthChecker>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/orders", post(submit_order_handler))
        .route("/orders/:id", get(get_order_handler))
        .route("/stream", get(stream_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/health/live", get(liveness_handler))
        .with_state(state)
}

impl IntoResponse for OrderError {
    fn into_response(self) -> Response {
        let status = match &self {
            OrderError::Validation(_) => StatusCode::BAD_REQUEST,
            OrderError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

/// 提交订单
///
/// An undecodable body is a validation failure like any other: 400 with
/// an `error` message, nothing stored or published.
async fn submit_order_handler(
    State(state): State<AppState>,
    payload: Result<Json<OrderRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(request) => request,
        Err(rejection) => {
            debug!(error = %rejection.body_text(), "undecodable order request");
            METRICS
                .order_rejections_total
                .with_label_values(&["validation"])
                .inc();
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": rejection.body_text() })),
            )
                .into_response();
        }
    };

    match state.manager.submit_order(request).await {
        Ok(order) => Json(order).into_response(),
        Err(e) => e.into_response(),
    }
}

async fn get_order_handler(State(state): State<AppState>, Path(id): Path<OrderId>) -> Response {
    match state.manager.get_order(id).await {
        Ok(Some(order)) => Json(order).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": format!("order {id} not found") })),
        )
            .into_response(),
        Err(e) => {
            error!(order_id = %id, error = %e, "order lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": format!("order lookup failed: {e}") })),
            )
                .into_response()
        }
    }
}

/// 升级为 WebSocket 并注册到扇出中心
async fn stream_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    ws.on_failed_upgrade(|e| warn!(error = %e, "websocket upgrade failed"))
        .on_upgrade(move |socket| async move {
            serve_connection(hub, socket).await;
        })
}

/// Prometheus metrics端点
async fn metrics_handler() -> Response {
    (StatusCode::OK, METRICS.export()).into_response()
}

/// 健康检查端点
async fn health_handler(State(state): State<AppState>) -> Response {
    let details = HealthDetails::collect(
        state.hub.connection_count(),
        state.manager.executions().in_flight(),
    );
    let response = state.health.check_health_detailed(details);

    let status_code = match response.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Starting | HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(response)).into_response()
}

/// 就绪检查端点（用于Kubernetes readiness probe）
async fn readiness_handler(State(state): State<AppState>) -> StatusCode {
    if state.health.check_readiness() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

/// 存活检查端点（用于Kubernetes liveness probe）
async fn liveness_handler(State(state): State<AppState>) -> StatusCode {
    if state.health.check_liveness() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
