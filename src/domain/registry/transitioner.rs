use std::sync::Arc;

use crate::domain::order::order::{LockedOrder, Order, OrderHandle};
use crate::domain::order::order_state::OrderState;
use crate::domain::registry::order_registry::SharedOrderRegistry;
use crate::domain::storage::OrderStorage;
use crate::error::{Error, Result};
use crate::logger::AUDIT_TARGET;

/// The only component allowed to move orders between state buckets.
pub struct OrderStateTransitioner {
    registry: Arc<SharedOrderRegistry>,
    storage: Arc<dyn OrderStorage>,
}

impl OrderStateTransitioner {
    pub fn new(registry: Arc<SharedOrderRegistry>, storage: Arc<dyn OrderStorage>) -> Self {
        OrderStateTransitioner { registry, storage }
    }

    pub fn registry(&self) -> &Arc<SharedOrderRegistry> {
        &self.registry
    }

    /// Persists a brand-new order and queues it in OPEN.
    ///
    /// The id is claimed in the active map before anything is written, so a
    /// second activation of the same id fails without touching storage. The
    /// claim is released again if the save fails.
    ///
    /// # Returns
    /// The handle now shared by the active map and the OPEN bucket.
    pub fn activate_new_order(&self, order: Order) -> Result<OrderHandle> {
        if order.state() != OrderState::Open {
            return Err(Error::InvalidTransition {
                order_id: order.id().clone(),
                from: order.state(),
                to: OrderState::Open,
            });
        }

        let handle = OrderHandle::new(order);
        let order = handle.lock();
        self.registry.insert_active(handle.clone())?;

        if let Err(e) = self.storage.save(&order) {
            self.registry.remove_registered(&handle);
            log::error!("Could not persist new order {}: {}", order.id(), e);
            return Err(e.into());
        }

        self.registry.bucket(OrderState::Open)?.append(handle.clone());

        tracing::info!(
            target: AUDIT_TARGET,
            order_id = %order.id(),
            resource_type = %order.resource_type(),
            provider = %order.provider_member,
            to = %OrderState::Open,
            "order activated"
        );
        drop(order);

        Ok(handle)
    }

    /// Moves a locked order into `new_state`.
    ///
    /// The order leaves its bucket, the new state is persisted, then the
    /// order enters the new bucket. If persisting fails the order keeps its
    /// old state and stays out of every bucket until it is reconciled or the
    /// process restarts from storage.
    pub fn transition(&self, order: &mut LockedOrder<'_>, new_state: OrderState) -> Result<()> {
        let from = order.state();

        if from == OrderState::Fulfilled && new_state == OrderState::Fulfilled {
            return Ok(());
        }
        if !from.can_transition_to(new_state) {
            return Err(Error::InvalidTransition { order_id: order.id().clone(), from, to: new_state });
        }
        if !self.registry.is_registered(order.handle()) {
            return Err(Error::OrderNotActive(order.id().clone()));
        }

        if !self.registry.bucket(from)?.remove(order.id()) {
            log::warn!("Order {} was not queued in {} when leaving it.", order.id(), from);
        }

        if let Err(e) = self.storage.update(&order.snapshot_in(new_state)) {
            log::error!(
                "Could not persist order {} moving {} -> {}, leaving it un-bucketed: {}",
                order.id(),
                from,
                new_state,
                e
            );
            return Err(e.into());
        }

        order.set_state(new_state);
        self.registry.bucket(new_state)?.append(order.handle().clone());

        tracing::info!(
            target: AUDIT_TARGET,
            order_id = %order.id(),
            resource_type = %order.resource_type(),
            provider = %order.provider_member,
            from = %from,
            to = %new_state,
            "order transitioned"
        );
        log::debug!("Order {} moved {} -> {}.", order.id(), from, new_state);

        Ok(())
    }

    /// Drops a CLOSED order whose teardown finished. The order is persisted
    /// as DEACTIVATED first; if that fails it stays queued in CLOSED.
    pub fn deactivate_order(&self, order: &mut LockedOrder<'_>) -> Result<()> {
        let from = order.state();
        if from != OrderState::Closed {
            return Err(Error::InvalidTransition { order_id: order.id().clone(), from, to: OrderState::Deactivated });
        }
        if !self.registry.is_registered(order.handle()) {
            return Err(Error::OrderNotActive(order.id().clone()));
        }

        if let Err(e) = self.storage.update(&order.snapshot_in(OrderState::Deactivated)) {
            log::error!("Could not persist deactivation of order {}: {}", order.id(), e);
            return Err(e.into());
        }

        self.registry.bucket(OrderState::Closed)?.remove(order.id());
        self.registry.remove_registered(order.handle());
        order.set_state(OrderState::Deactivated);

        tracing::info!(
            target: AUDIT_TARGET,
            order_id = %order.id(),
            resource_type = %order.resource_type(),
            provider = %order.provider_member,
            from = %from,
            to = %OrderState::Deactivated,
            "order deactivated"
        );

        Ok(())
    }
}
