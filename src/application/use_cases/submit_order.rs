/// Submit Order Use Case - the order lifecycle manager
///
/// Owns admission and the PENDING → FILLED transition. It is the only
/// writer of order records.
///
/// ## Workflow
/// 1. Validate the request (nothing is written on failure)
/// 2. Admit: fresh id, `created_at`, status PENDING, `store.save`
/// 3. Publish the snapshot on `order_updates` (failure logged, not surfaced)
/// 4. Schedule the simulated-execution task and return immediately
///
/// The execution task sleeps a fixed latency, marks the order FILLED in the
/// store and publishes the updated snapshot. It never retries: if the store
/// update fails the order stays PENDING and nothing is published.
///
/// ## Example
/// ```rust,ignore
/// let manager = OrderLifecycleManager::new(store, bus);
/// let order = manager.submit_order(request).await?;
/// assert_eq!(order.status, OrderStatus::Pending);
/// ```

use crate::application::ports::{EventBus, OrderStore, StoreError};
use crate::application::services::ExecutionRegistry;
use crate::domain::validation::{OrderValidator, ValidationError};
use crate::shared::metrics::METRICS;
use crate::shared::protocol::{Order, OrderId, OrderRequest, OrderStatus, ORDER_UPDATES_TOPIC};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// 模拟成交延迟（默认 2 秒）
pub const DEFAULT_FILL_LATENCY: Duration = Duration::from_secs(2);

/// Errors surfaced to the caller of `submit_order`
#[derive(Debug, Error)]
pub enum OrderError {
    /// Request was malformed; nothing was stored or published
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Store rejected the write; the order was not admitted
    #[error("order not admitted: {0}")]
    Persistence(#[from] StoreError),
}

/// Order Lifecycle Manager
///
/// Cheap to clone; all clones share the same store, bus and execution
/// registry.
#[derive(Clone)]
pub struct OrderLifecycleManager {
    store: Arc<dyn OrderStore>,
    bus: Arc<dyn EventBus>,
    validator: Arc<OrderValidator>,
    executions: ExecutionRegistry,
    fill_latency: Duration,
}

impl OrderLifecycleManager {
    /// Creates a manager with the default validator and fill latency
    pub fn new(store: Arc<dyn OrderStore>, bus: Arc<dyn EventBus>) -> Self {
        Self {
            store,
            bus,
            validator: Arc::new(OrderValidator::new()),
            executions: ExecutionRegistry::new(),
            fill_latency: DEFAULT_FILL_LATENCY,
        }
    }

    pub fn with_validator(mut self, validator: OrderValidator) -> Self {
        self.validator = Arc::new(validator);
        self
    }

    pub fn with_fill_latency(mut self, fill_latency: Duration) -> Self {
        self.fill_latency = fill_latency;
        self
    }

    pub fn fill_latency(&self) -> Duration {
        self.fill_latency
    }

    /// In-flight simulated executions, keyed by order id
    pub fn executions(&self) -> &ExecutionRegistry {
        &self.executions
    }

    /// Admits a new order
    ///
    /// Returns the PENDING order as soon as it is persisted; the caller
    /// never waits for the fill. Must be called from within a tokio runtime.
    pub async fn submit_order(&self, request: OrderRequest) -> Result<Order, OrderError> {
        let ticket = self.validator.validate(&request).map_err(|e| {
            METRICS.order_rejections_total.with_label_values(&["validation"]).inc();
            debug!(error = %e, symbol = %request.symbol, "order request rejected");
            e
        })?;

        let order = Order::admit(ticket);

        if let Err(e) = self.store.save(&order).await {
            METRICS.order_rejections_total.with_label_values(&["persistence"]).inc();
            error!(order_id = %order.id, error = %e, "failed to persist order");
            return Err(e.into());
        }

        METRICS.orders_total.with_label_values(&[order.side.as_str()]).inc();
        info!(
            order_id = %order.id,
            symbol = %order.symbol,
            side = %order.side,
            order_type = %order.order_type,
            quantity = order.quantity,
            price = %order.price,
            "order admitted"
        );

        publish_snapshot(self.bus.as_ref(), &order).await;
        self.schedule_execution(order.id);

        Ok(order)
    }

    /// Reads the persisted state of an order
    pub async fn get_order(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        self.store.get(id).await
    }

    fn schedule_execution(&self, id: OrderId) {
        let store = Arc::clone(&self.store);
        let bus = Arc::clone(&self.bus);
        let latency = self.fill_latency;

        let scheduled = self
            .executions
            .spawn(id, simulate_execution(store, bus, id, latency));

        if !scheduled {
            // uuid v4 冲突会先在 store.save 处失败，这里理论上不可达
            warn!(order_id = %id, "execution already scheduled for order");
        }
    }
}

/// Simulated-execution task: fixed delay, then PENDING → FILLED
async fn simulate_execution(
    store: Arc<dyn OrderStore>,
    bus: Arc<dyn EventBus>,
    id: OrderId,
    latency: Duration,
) {
    tokio::time::sleep(latency).await;

    match store.update_status(id, OrderStatus::Filled).await {
        Ok(filled) => {
            METRICS.fills_total.inc();
            info!(order_id = %id, "order filled");
            publish_snapshot(bus.as_ref(), &filled).await;
        }
        Err(e) => {
            METRICS.fill_failures_total.inc();
            error!(order_id = %id, error = %e, "failed to mark order filled, order left pending");
        }
    }
}

/// Publishes an immutable snapshot of `order` on `order_updates`
async fn publish_snapshot(bus: &dyn EventBus, order: &Order) {
    let payload = match serde_json::to_vec(order) {
        Ok(payload) => Bytes::from(payload),
        Err(e) => {
            error!(order_id = %order.id, error = %e, "failed to encode order snapshot");
            return;
        }
    };

    if let Err(e) = bus.publish(ORDER_UPDATES_TOPIC, payload).await {
        METRICS
            .publish_failures_total
            .with_label_values(&[ORDER_UPDATES_TOPIC])
            .inc();
        warn!(
            order_id = %order.id,
            status = %order.status,
            error = %e,
            "failed to publish order update"
        );
    }
}
