use std::sync::Arc;

use crate::domain::connector::CloudConnector;
use crate::domain::connector::local_connector::LocalConnector;
use crate::domain::connector::remote_connector::RemoteConnector;
use crate::domain::order::order::Order;
use crate::domain::utils::id::MemberId;

/// Picks the connector for an order. This is the only place that looks at
/// whether the provider is the local member.
pub struct ConnectorFactory {
    local_member: MemberId,
    local: Arc<LocalConnector>,
    remote: Arc<RemoteConnector>,
}

impl ConnectorFactory {
    pub fn new(local_member: MemberId, local: Arc<LocalConnector>, remote: Arc<RemoteConnector>) -> Self {
        ConnectorFactory { local_member, local, remote }
    }

    pub fn local_member(&self) -> &MemberId {
        &self.local_member
    }

    pub fn for_order(&self, order: &Order) -> Arc<dyn CloudConnector> {
        if order.is_provider_local(&self.local_member) {
            self.local.clone() as Arc<dyn CloudConnector>
        } else {
            self.remote.clone() as Arc<dyn CloudConnector>
        }
    }

    pub fn local(&self) -> Arc<LocalConnector> {
        self.local.clone()
    }
}
