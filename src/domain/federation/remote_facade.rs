use std::sync::Arc;

use crate::domain::broker::OrderBroker;
use crate::domain::connector::CloudConnector;
use crate::domain::federation::protocol::{FederationRequest, FederationResponse, RemoteFailureKind};
use crate::domain::order::instance::{InstanceState, OrderInstance};
use crate::domain::order::order::{LockedOrder, Order};
use crate::domain::order::order_state::OrderState;
use crate::domain::utils::id::{InstanceId, MemberId, OrderId};
use crate::error::Error;

/// Provider-side handling of requests forwarded by other members.
pub struct RemoteFacade {
    broker: Arc<OrderBroker>,
}

impl RemoteFacade {
    pub fn new(broker: Arc<OrderBroker>) -> Self {
        RemoteFacade { broker }
    }

    pub fn local_member(&self) -> &MemberId {
        self.broker.local_member()
    }

    pub fn handle(&self, sender: &MemberId, request: FederationRequest) -> FederationResponse {
        match request {
            FederationRequest::CreateOrder { order } => self.create_order(sender, order),
            FederationRequest::GetInstance { order_id } => self.get_instance(sender, &order_id),
            FederationRequest::DeleteOrder { order_id } => self.delete_order(sender, &order_id),
        }
    }

    fn create_order(&self, sender: &MemberId, order: Order) -> FederationResponse {
        if order.requester_member != *sender {
            return FederationResponse::failed(
                RemoteFailureKind::Unauthorized,
                format!("member {} can not create orders on behalf of {}", sender, order.requester_member),
            );
        }
        if !order.is_provider_local(self.local_member()) {
            return FederationResponse::failed(
                RemoteFailureKind::Rejected,
                format!("order {} is meant for member {}", order.id(), order.provider_member),
            );
        }

        let acknowledged = FederationResponse::Created { instance_id: InstanceId::new(order.id().as_str()) };

        if let Some(existing) = self.broker.get_order(order.id()) {
            return if existing.requester_member == *sender {
                log::debug!("Order {} from {} is already active, acknowledging again.", order.id(), sender);
                acknowledged
            } else {
                FederationResponse::failed(RemoteFailureKind::Rejected, format!("order id {} is taken", order.id()))
            };
        }

        match self.broker.activate_new_order(order.forwarded_copy()) {
            Ok(order_id) => {
                log::info!("Activated order {} forwarded by {}.", order_id, sender);
                acknowledged
            }
            // Another forward of the same id won the race for it.
            Err(Error::OrderAlreadyActive(order_id)) => match self.broker.get_order(&order_id) {
                Some(existing) if existing.requester_member == *sender => acknowledged,
                _ => FederationResponse::failed(RemoteFailureKind::Rejected, format!("order id {} is taken", order_id)),
            },
            Err(e) => {
                log::error!("Could not activate order forwarded by {}: {}", sender, e);
                FederationResponse::from_error(&e)
            }
        }
    }

    fn get_instance(&self, sender: &MemberId, order_id: &OrderId) -> FederationResponse {
        let Some(handle) = self.broker.registry().get(order_id) else {
            return FederationResponse::from_error(&Error::OrderNotFound(order_id.clone()));
        };
        let order = handle.lock();
        if order.requester_member != *sender {
            return FederationResponse::failed(RemoteFailureKind::Unauthorized, format!("order {} is not yours", order_id));
        }

        match self.instance_view(&order) {
            Ok(instance) => FederationResponse::Instance { instance },
            Err(e) => FederationResponse::from_error(&e),
        }
    }

    /// While the order is being provisioned or monitored the cloud's own
    /// report is returned, otherwise the provider's lifecycle state stands in.
    fn instance_view(&self, order: &LockedOrder<'_>) -> crate::error::Result<OrderInstance> {
        let monitored = matches!(order.state(), OrderState::Spawning | OrderState::Fulfilled);
        if monitored && order.instance_id().is_some() {
            return self.broker.connectors().local().get_instance(order);
        }

        let state = match order.state() {
            OrderState::Open | OrderState::Spawning => InstanceState::Creating,
            OrderState::Fulfilled => InstanceState::Ready,
            OrderState::Failed => InstanceState::Failed,
            OrderState::Closed | OrderState::Deactivated => InstanceState::Unavailable,
        };
        let mut instance = OrderInstance {
            instance_id: InstanceId::new(order.id().as_str()),
            state,
            raw_status: order.state().to_string(),
            detail: Default::default(),
        };
        if let Some(fault) = &order.fault_message {
            instance.detail.insert("fault".to_string(), fault.clone());
        }
        Ok(instance)
    }

    fn delete_order(&self, sender: &MemberId, order_id: &OrderId) -> FederationResponse {
        match self.broker.get_order(order_id) {
            None => {
                log::debug!("Deletion of unknown order {} from {}, nothing to do.", order_id, sender);
                FederationResponse::Deleted
            }
            Some(order) if order.requester_member != *sender => {
                FederationResponse::failed(RemoteFailureKind::Unauthorized, format!("order {} is not yours", order_id))
            }
            Some(_) => match self.broker.request_deletion(order_id) {
                Ok(()) | Err(Error::OrderNotFound(_) | Error::OrderNotActive(_)) => FederationResponse::Deleted,
                Err(e) => FederationResponse::from_error(&e),
            },
        }
    }
}
