use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::order::order::Order;
use crate::domain::order::order_state::OrderState;
use crate::domain::storage::{OrderStorage, StorageResult};
use crate::domain::utils::id::OrderId;
use crate::domain::utils::lock;
use crate::error::StorageError;

/// Process-local storage. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryOrderStorage {
    orders: Mutex<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored copy of an order, deactivated ones included.
    pub fn stored(&self, order_id: &OrderId) -> Option<Order> {
        lock::lock(&self.orders).get(order_id).cloned()
    }
}

impl OrderStorage for InMemoryOrderStorage {
    fn save(&self, order: &Order) -> StorageResult<()> {
        lock::lock(&self.orders).insert(order.id().clone(), order.clone());
        Ok(())
    }

    fn update(&self, order: &Order) -> StorageResult<()> {
        let mut orders = lock::lock(&self.orders);
        match orders.get_mut(order.id()) {
            Some(stored) => {
                *stored = order.clone();
                Ok(())
            }
            None => Err(StorageError::NotFound(order.id().clone())),
        }
    }

    fn load_active(&self) -> StorageResult<Vec<Order>> {
        let orders = lock::lock(&self.orders);
        let mut active: Vec<Order> =
            orders.values().filter(|order| order.state() != OrderState::Deactivated).cloned().collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(active)
    }
}
