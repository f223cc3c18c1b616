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
use crate::domain::utils::id::MemberId;
use crate::error::Result;

/// Steady-state monitor of FULFILLED orders served by this member. Orders
/// served by a remote member are left to that member's own monitor.
pub struct FulfilledProcessor {
    local_member: MemberId,
    transitioner: Arc<OrderStateTransitioner>,
    connectors: Arc<ConnectorFactory>,
    connectivity: Arc<dyn ConnectivityChecker>,
}

impl FulfilledProcessor {
    pub fn new(
        local_member: MemberId,
        transitioner: Arc<OrderStateTransitioner>,
        connectors: Arc<ConnectorFactory>,
        connectivity: Arc<dyn ConnectivityChecker>,
    ) -> Self {
        FulfilledProcessor { local_member, transitioner, connectors, connectivity }
    }

    /// `Some(reason)` when the order's instance is no longer healthy.
    fn unhealthy_reason(&self, order: &LockedOrder<'_>) -> Option<String> {
        let connector = self.connectors.for_order(order);
        match connector.get_instance(order) {
            Ok(instance) => match instance.state {
                InstanceState::Failed => {
                    Some(format!("instance {} reported {}", instance.instance_id, instance.raw_status))
                }
                InstanceState::Ready
                    if order.resource_type() == ResourceType::Compute
                        && !self.connectivity.is_reachable(order, &instance) =>
                {
                    Some(format!("instance {} is not reachable", instance.instance_id))
                }
                _ => None,
            },
            Err(e) if e.is_instance_not_found() => Some(format!("instance is gone: {}", e)),
            Err(e) => {
                log::warn!("Health check of order {} inconclusive: {}", order.id(), e);
                None
            }
        }
    }
}

impl OrderProcessor for FulfilledProcessor {
    fn name(&self) -> &'static str {
        "fulfilled-proc"
    }

    fn state(&self) -> OrderState {
        OrderState::Fulfilled
    }

    fn registry(&self) -> &SharedOrderRegistry {
        self.transitioner.registry()
    }

    fn process_order(&self, order: &mut LockedOrder<'_>) -> Result<()> {
        if !order.is_provider_local(&self.local_member) {
            return Ok(());
        }

        match self.unhealthy_reason(order) {
            Some(reason) => {
                log::warn!("Order {} degraded: {}", order.id(), reason);
                order.fault_message = Some(reason);
                self.transitioner.transition(order, OrderState::Failed)
            }
            None => Ok(()),
        }
    }
}
