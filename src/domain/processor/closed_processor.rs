use std::sync::Arc;

use crate::domain::connector::connector_factory::ConnectorFactory;
use crate::domain::order::order::LockedOrder;
use crate::domain::order::order_state::OrderState;
use crate::domain::processor::OrderProcessor;
use crate::domain::registry::order_registry::SharedOrderRegistry;
use crate::domain::registry::transitioner::OrderStateTransitioner;
use crate::error::Result;

/// Tears down the cloud instance of CLOSED orders and deactivates them.
/// A failed delete keeps the order queued, it is retried every sweep.
pub struct ClosedProcessor {
    transitioner: Arc<OrderStateTransitioner>,
    connectors: Arc<ConnectorFactory>,
}

impl ClosedProcessor {
    pub fn new(transitioner: Arc<OrderStateTransitioner>, connectors: Arc<ConnectorFactory>) -> Self {
        ClosedProcessor { transitioner, connectors }
    }
}

impl OrderProcessor for ClosedProcessor {
    fn name(&self) -> &'static str {
        "closed-proc"
    }

    fn state(&self) -> OrderState {
        OrderState::Closed
    }

    fn registry(&self) -> &SharedOrderRegistry {
        self.transitioner.registry()
    }

    fn process_order(&self, order: &mut LockedOrder<'_>) -> Result<()> {
        if order.instance_id().is_some() && !order.teardown_confirmed() {
            let connector = self.connectors.for_order(order);
            match connector.delete_instance(order) {
                Ok(()) => {}
                Err(e) if e.is_instance_not_found() => {
                    log::info!("Instance of order {} was already gone.", order.id());
                }
                Err(e) => {
                    log::error!("Deleting instance of order {} failed, retrying next sweep: {}", order.id(), e);
                    return Ok(());
                }
            }
            order.confirm_teardown();
        }

        self.transitioner.deactivate_order(order)
    }
}
