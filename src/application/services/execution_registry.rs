/// Execution Registry - tracked simulated-execution tasks
///
/// Every admitted order gets exactly one background task. The registry
/// keeps its `JoinHandle` keyed by order id from the moment it is spawned
/// until the task finishes, so a second task for the same id is refused and
/// the set of in-flight executions is observable.

use crate::shared::metrics::METRICS;
use crate::shared::protocol::OrderId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::task::JoinHandle;

#[derive(Clone, Default)]
pub struct ExecutionRegistry {
    tasks: Arc<Mutex<HashMap<OrderId, JoinHandle<()>>>>,
}

impl ExecutionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawns `task` for `id` unless one is already tracked.
    ///
    /// Returns `false` (and drops `task` unstarted) on a duplicate id.
    /// Must be called from within a tokio runtime.
    pub fn spawn<F>(&self, id: OrderId, task: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        // 持锁期间完成 spawn + insert，任务结束时的 remove 必然排在 insert 之后
        let mut tasks = self.tasks.lock();
        if tasks.contains_key(&id) {
            return false;
        }

        let registry = Arc::clone(&self.tasks);
        let handle = tokio::spawn(async move {
            task.await;
            registry.lock().remove(&id);
            METRICS.executions_in_flight.dec();
        });

        tasks.insert(id, handle);
        METRICS.executions_in_flight.inc();
        true
    }

    /// Number of tasks spawned and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tasks.lock().len()
    }

    pub fn is_tracked(&self, id: &OrderId) -> bool {
        self.tasks.lock().contains_key(id)
    }

    pub fn tracked_ids(&self) -> Vec<OrderId> {
        self.tasks.lock().keys().copied().collect()
    }
}
