//! In-memory order store
//!
//! Keyed by order id, insert-if-absent on `save`, state-machine checked
//! `update_status`. Stands in for the durable store at the `OrderStore`
//! port.

use crate::application::ports::{OrderStore, StoreError};
use crate::shared::protocol::{Order, OrderId, OrderStatus};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.orders.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.read().is_empty()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn save(&self, order: &Order) -> Result<(), StoreError> {
        match self.orders.write().entry(order.id) {
            Entry::Occupied(_) => Err(StoreError::Duplicate(order.id)),
            Entry::Vacant(slot) => {
                slot.insert(order.clone());
                Ok(())
            }
        }
    }

    async fn update_status(&self, id: OrderId, status: OrderStatus) -> Result<Order, StoreError> {
        let mut orders = self.orders.write();
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        order
            .transition(status)
            .map_err(|e| StoreError::IllegalTransition {
                id: e.id,
                from: e.from,
                to: e.to,
            })?;

        Ok(order.clone())
    }

    async fn get(&self, id: OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().get(&id).cloned())
    }
}
