use std::collections::HashMap;
use std::sync::RwLock;

use crate::domain::order::order::OrderHandle;
use crate::domain::order::order_state::OrderState;
use crate::domain::registry::order_list::SynchronizedOrderList;
use crate::domain::storage::OrderStorage;
use crate::domain::utils::id::OrderId;
use crate::domain::utils::lock;
use crate::error::{Error, Result};

/// Process-wide table of active orders plus one bucket per order state.
///
/// Lock order: an order's own lock may be taken before the map or a bucket
/// lock, never the other way around.
#[derive(Debug, Default)]
pub struct SharedOrderRegistry {
    active_orders: RwLock<HashMap<OrderId, OrderHandle>>,
    open: SynchronizedOrderList,
    spawning: SynchronizedOrderList,
    fulfilled: SynchronizedOrderList,
    failed: SynchronizedOrderList,
    closed: SynchronizedOrderList,
}

impl SharedOrderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the registry from every non-deactivated order in `storage`.
    ///
    /// # Returns
    /// The registry with each stored order in the bucket of its stored state.
    pub fn recover(storage: &dyn OrderStorage) -> Result<Self> {
        let registry = SharedOrderRegistry::new();

        for order in storage.load_active()? {
            let state = order.state();
            let handle = OrderHandle::new(order);
            registry.insert_active(handle.clone())?;
            registry.bucket(state)?.append(handle);
        }

        for state in OrderState::BUCKET_STATES {
            let bucket = registry.bucket(state)?;
            if !bucket.is_empty() {
                log::info!("Recovered {} {} orders from storage.", bucket.len(), state);
            }
        }

        Ok(registry)
    }

    /// The bucket owning orders in `state`.
    pub fn bucket(&self, state: OrderState) -> Result<&SynchronizedOrderList> {
        match state {
            OrderState::Open => Ok(&self.open),
            OrderState::Spawning => Ok(&self.spawning),
            OrderState::Fulfilled => Ok(&self.fulfilled),
            OrderState::Failed => Ok(&self.failed),
            OrderState::Closed => Ok(&self.closed),
            OrderState::Deactivated => Err(Error::Unexpected("Deactivated orders have no bucket".to_string())),
        }
    }

    pub fn get(&self, order_id: &OrderId) -> Option<OrderHandle> {
        lock::read(&self.active_orders).get(order_id).cloned()
    }

    pub fn contains(&self, order_id: &OrderId) -> bool {
        lock::read(&self.active_orders).contains_key(order_id)
    }

    pub fn active_count(&self) -> usize {
        lock::read(&self.active_orders).len()
    }

    pub fn active_handles(&self) -> Vec<OrderHandle> {
        lock::read(&self.active_orders).values().cloned().collect()
    }

    /// Ids of the orders currently queued in the bucket of `state`, head first.
    pub fn order_ids_in(&self, state: OrderState) -> Vec<OrderId> {
        self.bucket(state).map(|bucket| bucket.order_ids()).unwrap_or_default()
    }

    /// Whether `handle` itself, not merely an order with its id, is active.
    pub fn is_registered(&self, handle: &OrderHandle) -> bool {
        lock::read(&self.active_orders).get(handle.id()).is_some_and(|active| active.same_order(handle))
    }

    /// Claims the order's id. Fails if another order already holds it.
    pub(crate) fn insert_active(&self, handle: OrderHandle) -> Result<()> {
        let mut active = lock::write(&self.active_orders);
        if active.contains_key(handle.id()) {
            return Err(Error::OrderAlreadyActive(handle.id().clone()));
        }
        active.insert(handle.id().clone(), handle);
        Ok(())
    }

    /// Drops `handle` from the active map. An order that reuses the id in
    /// the meantime is left alone.
    pub(crate) fn remove_registered(&self, handle: &OrderHandle) -> bool {
        let mut active = lock::write(&self.active_orders);
        let registered = active.get(handle.id()).is_some_and(|current| current.same_order(handle));
        if registered {
            active.remove(handle.id());
        }
        registered
    }

    /// Active orders missing from the bucket of their own state, which is
    /// where a transition leaves an order whose persistence failed.
    pub fn unbucketed(&self) -> Vec<OrderId> {
        let mut missing = Vec::new();
        for handle in self.active_handles() {
            let order = handle.lock();
            if !self.is_registered(&handle) {
                continue;
            }
            let in_bucket = self.bucket(order.state()).map(|bucket| bucket.contains(order.id())).unwrap_or(false);
            if !in_bucket {
                missing.push(order.id().clone());
            }
        }
        missing
    }

    /// Puts every un-bucketed active order back into the bucket of its state.
    ///
    /// # Returns
    /// Ids of the orders that were re-queued.
    pub fn reconcile_unbucketed(&self) -> Vec<OrderId> {
        let mut requeued = Vec::new();
        for handle in self.active_handles() {
            let order = handle.lock();
            // Dropped while we waited for its lock.
            if !self.is_registered(&handle) {
                continue;
            }
            let Ok(bucket) = self.bucket(order.state()) else {
                continue;
            };
            if bucket.append(handle.clone()) {
                log::warn!("Re-queued un-bucketed order {} in {}.", order.id(), order.state());
                requeued.push(order.id().clone());
            }
        }
        requeued
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::identity::RequesterIdentity;
    use crate::domain::order::order::Order;
    use crate::domain::order::resource::ResourceSpec;
    use crate::domain::storage::in_memory::InMemoryOrderStorage;
    use crate::domain::utils::id::{CloudName, MemberId};

    fn order(id: &str) -> Order {
        Order::new(
            OrderId::new(id),
            ResourceSpec::Network {
                cidr: "10.0.0.0/24".to_string(),
                gateway: None,
                allocation_mode: crate::domain::order::resource::NetworkAllocationMode::Dynamic,
            },
            MemberId::new("site-a"),
            MemberId::new("site-a"),
            CloudName::new("default"),
            RequesterIdentity::new("alice", "ldap", "token"),
        )
    }

    #[test]
    fn recover_places_orders_by_stored_state() {
        let storage = InMemoryOrderStorage::new();
        let open = order("open");
        let fulfilled = order("fulfilled");
        let deactivated = order("deactivated");
        for o in [&open, &fulfilled, &deactivated] {
            storage.save(o).unwrap();
        }
        storage.update(&fulfilled.snapshot_in(OrderState::Fulfilled)).unwrap();
        storage.update(&deactivated.snapshot_in(OrderState::Deactivated)).unwrap();

        let registry = SharedOrderRegistry::recover(&storage).unwrap();

        assert_eq!(registry.active_count(), 2);
        assert_eq!(registry.order_ids_in(OrderState::Open), vec![OrderId::new("open")]);
        assert_eq!(registry.order_ids_in(OrderState::Fulfilled), vec![OrderId::new("fulfilled")]);
        assert!(!registry.contains(&OrderId::new("deactivated")));
        assert!(registry.unbucketed().is_empty());
    }

    #[test]
    fn duplicate_activation_is_rejected() {
        let registry = SharedOrderRegistry::new();
        registry.insert_active(OrderHandle::new(order("a"))).unwrap();
        let err = registry.insert_active(OrderHandle::new(order("a"))).unwrap_err();
        assert!(matches!(err, Error::OrderAlreadyActive(_)));
    }

    #[test]
    fn reconcile_requeues_missing_orders_only() {
        let registry = SharedOrderRegistry::new();
        let queued = OrderHandle::new(order("queued"));
        let lost = OrderHandle::new(order("lost"));
        registry.insert_active(queued.clone()).unwrap();
        registry.insert_active(lost.clone()).unwrap();
        registry.bucket(OrderState::Open).unwrap().append(queued);

        assert_eq!(registry.unbucketed(), vec![OrderId::new("lost")]);
        assert_eq!(registry.reconcile_unbucketed(), vec![OrderId::new("lost")]);
        assert!(registry.unbucketed().is_empty());
        assert_eq!(registry.bucket(OrderState::Open).unwrap().len(), 2);
    }

    #[test]
    fn deactivated_has_no_bucket() {
        let registry = SharedOrderRegistry::new();
        assert!(registry.bucket(OrderState::Deactivated).is_err());
    }
}
