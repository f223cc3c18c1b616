use std::sync::Arc;

use crate::domain::connector::connector_factory::ConnectorFactory;
use crate::domain::order::order::LockedOrder;
use crate::domain::order::order_state::OrderState;
use crate::domain::processor::OrderProcessor;
use crate::domain::registry::order_registry::SharedOrderRegistry;
use crate::domain::registry::transitioner::OrderStateTransitioner;
use crate::error::Result;

/// Requests a cloud instance for every OPEN order.
pub struct OpenProcessor {
    transitioner: Arc<OrderStateTransitioner>,
    connectors: Arc<ConnectorFactory>,
}

impl OpenProcessor {
    pub fn new(transitioner: Arc<OrderStateTransitioner>, connectors: Arc<ConnectorFactory>) -> Self {
        OpenProcessor { transitioner, connectors }
    }
}

impl OrderProcessor for OpenProcessor {
    fn name(&self) -> &'static str {
        "open-proc"
    }

    fn state(&self) -> OrderState {
        OrderState::Open
    }

    fn registry(&self) -> &SharedOrderRegistry {
        self.transitioner.registry()
    }

    fn process_order(&self, order: &mut LockedOrder<'_>) -> Result<()> {
        if order.instance_id().is_some() {
            // Requested before, but the move to SPAWNING was never persisted.
            return self.transitioner.transition(order, OrderState::Spawning);
        }

        let connector = self.connectors.for_order(order);
        match connector.request_instance(order) {
            Ok(instance_id) => {
                order.set_instance_id(instance_id)?;
                self.transitioner.transition(order, OrderState::Spawning)
            }
            Err(e) if e.is_remote_unreachable() => {
                log::warn!("Order {} stays OPEN, provider unreachable: {}", order.id(), e);
                Ok(())
            }
            Err(e) => {
                log::error!("Request for order {} failed: {}", order.id(), e);
                order.fault_message = Some(e.to_string());
                self.transitioner.transition(order, OrderState::Failed)
            }
        }
    }
}
