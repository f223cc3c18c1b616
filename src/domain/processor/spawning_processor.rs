use std::sync::Arc;

use crate::domain::cloud::connectivity::ConnectivityChecker;
use crate::domain::connector::connector_factory::ConnectorFactory;
use crate::domain::order::instance::InstanceState;
use crate::domain::order::order::LockedOrder;
use crate::domain::order::order_state::OrderState;
use crate::domain::order::resource::ResourceType;
use crate::domain::processor::OrderProcessor;
use crate::domain::registry::order_registry::SharedOrderRegistry;
use crate::domain::registry::transitioner::OrderStateTransitioner;
use crate::error::Result;

/// Polls SPAWNING orders until their instance is ready or failed.
///
/// There is no attempt limit: an order whose instance never settles stays
/// here until it is deleted.
pub struct SpawningProcessor {
    transitioner: Arc<OrderStateTransitioner>,
    connectors: Arc<ConnectorFactory>,
    connectivity: Arc<dyn ConnectivityChecker>,
}

impl SpawningProcessor {
    pub fn new(
        transitioner: Arc<OrderStateTransitioner>,
        connectors: Arc<ConnectorFactory>,
        connectivity: Arc<dyn ConnectivityChecker>,
    ) -> Self {
        SpawningProcessor { transitioner, connectors, connectivity }
    }
}

impl OrderProcessor for SpawningProcessor {
    fn name(&self) -> &'static str {
        "spawning-proc"
    }

    fn state(&self) -> OrderState {
        OrderState::Spawning
    }

    fn registry(&self) -> &SharedOrderRegistry {
        self.transitioner.registry()
    }

    fn process_order(&self, order: &mut LockedOrder<'_>) -> Result<()> {
        let connector = self.connectors.for_order(order);
        let instance = match connector.get_instance(order) {
            Ok(instance) => instance,
            Err(e) => {
                log::warn!("Could not read instance of SPAWNING order {}: {}", order.id(), e);
                return Ok(());
            }
        };

        match instance.state {
            InstanceState::Failed => {
                order.fault_message = Some(format!("instance {} reported {}", instance.instance_id, instance.raw_status));
                self.transitioner.transition(order, OrderState::Failed)
            }
            InstanceState::Ready => {
                if order.resource_type() == ResourceType::Compute && !self.connectivity.is_reachable(order, &instance) {
                    log::debug!("Compute order {} is ready but not reachable yet.", order.id());
                    return Ok(());
                }
                self.transitioner.transition(order, OrderState::Fulfilled)
            }
            InstanceState::Creating | InstanceState::Unavailable | InstanceState::Inconsistent => {
                log::trace!("Order {} still {}.", order.id(), instance.state);
                Ok(())
            }
        }
    }
}
