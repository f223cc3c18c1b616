use std::sync::Arc;

use crate::domain::connector::CloudConnector;
use crate::domain::order::instance::OrderInstance;
use crate::domain::order::order::Order;
use crate::domain::utils::id::{InstanceId, MemberId, OrderId};
use crate::error::{Error, Result};

/// Carries the dispatch operations to another federation member.
///
/// Implementations report transport failures (no route, refused connection,
/// timeout, broken frame) as [`Error::RemoteUnreachable`] and failures the
/// peer itself answered with as [`Error::Cloud`].
pub trait RemoteTransport: Send + Sync {
    /// Hands `order` over to `member`, which activates it in its own registry.
    fn create_order(&self, member: &MemberId, order: &Order) -> Result<InstanceId>;

    fn get_instance(&self, member: &MemberId, order_id: &OrderId) -> Result<OrderInstance>;

    fn delete_order(&self, member: &MemberId, order_id: &OrderId) -> Result<()>;
}

/// Transport used when no federation is configured. Every member is unreachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoFederation;

impl NoFederation {
    fn unreachable(member: &MemberId) -> Error {
        Error::RemoteUnreachable { member: member.clone(), reason: "no federation members configured".to_string() }
    }
}

impl RemoteTransport for NoFederation {
    fn create_order(&self, member: &MemberId, _order: &Order) -> Result<InstanceId> {
        Err(Self::unreachable(member))
    }

    fn get_instance(&self, member: &MemberId, _order_id: &OrderId) -> Result<OrderInstance> {
        Err(Self::unreachable(member))
    }

    fn delete_order(&self, member: &MemberId, _order_id: &OrderId) -> Result<()> {
        Err(Self::unreachable(member))
    }
}

/// Dispatches to the order's provider member.
pub struct RemoteConnector {
    transport: Arc<dyn RemoteTransport>,
}

impl RemoteConnector {
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        RemoteConnector { transport }
    }
}

impl CloudConnector for RemoteConnector {
    fn request_instance(&self, order: &Order) -> Result<InstanceId> {
        let instance_id = self.transport.create_order(&order.provider_member, order)?;
        log::info!("Member {} accepted order {}.", order.provider_member, order.id());
        Ok(instance_id)
    }

    fn get_instance(&self, order: &Order) -> Result<OrderInstance> {
        self.transport.get_instance(&order.provider_member, order.id())
    }

    fn delete_instance(&self, order: &Order) -> Result<()> {
        self.transport.delete_order(&order.provider_member, order.id())?;
        log::info!("Member {} accepted deletion of order {}.", order.provider_member, order.id());
        Ok(())
    }
}
