use std::sync::Arc;

use crate::domain::cloud::credential::CredentialMapper;
use crate::domain::cloud::plugin::DispatchRequest;
use crate::domain::cloud::plugin_registry::PluginRegistry;
use crate::domain::connector::CloudConnector;
use crate::domain::order::instance::OrderInstance;
use crate::domain::order::order::Order;
use crate::domain::registry::order_registry::SharedOrderRegistry;
use crate::domain::utils::id::InstanceId;
use crate::error::{CloudError, Result};

/// Dispatches to the in-process plugin registered for the order's resource
/// type and cloud.
pub struct LocalConnector {
    plugins: Arc<PluginRegistry>,
    credentials: Arc<dyn CredentialMapper>,
    registry: Arc<SharedOrderRegistry>,
}

impl LocalConnector {
    pub fn new(
        plugins: Arc<PluginRegistry>,
        credentials: Arc<dyn CredentialMapper>,
        registry: Arc<SharedOrderRegistry>,
    ) -> Self {
        LocalConnector { plugins, credentials, registry }
    }

    /// Resolves the orders `order` depends on to their instance ids.
    ///
    /// Referenced orders are locked one at a time while `order` stays locked
    /// by the caller. References only point from attachments and public ips
    /// to computes and volumes, and from computes to networks, so these
    /// nested locks never form a cycle.
    fn resolve<'a>(&self, order: &'a Order) -> Result<DispatchRequest<'a>> {
        let mut request = DispatchRequest::new(order);

        for (referenced_id, expected_type) in order.spec().referenced_orders() {
            if referenced_id == order.id() {
                return Err(CloudError::Rejected(format!("order {} references itself", order.id())).into());
            }

            let handle = self.registry.get(referenced_id).ok_or_else(|| {
                CloudError::Rejected(format!("referenced order {} is not active", referenced_id))
            })?;
            if handle.resource_type() != expected_type {
                return Err(CloudError::Rejected(format!(
                    "referenced order {} is a {} order, expected {}",
                    referenced_id,
                    handle.resource_type(),
                    expected_type
                ))
                .into());
            }

            let referenced = handle.lock();
            if !referenced.requester.same_owner(&order.requester) {
                return Err(CloudError::Unauthorized(format!(
                    "referenced order {} belongs to another requester",
                    referenced_id
                ))
                .into());
            }
            if referenced.provider_member != order.provider_member || referenced.cloud_name != order.cloud_name {
                return Err(CloudError::Rejected(format!(
                    "referenced order {} is served by {}/{}, not {}/{}",
                    referenced_id, referenced.provider_member, referenced.cloud_name, order.provider_member, order.cloud_name
                ))
                .into());
            }
            let instance_id = referenced.instance_id().cloned().ok_or_else(|| {
                CloudError::Rejected(format!("referenced order {} has no instance yet", referenced_id))
            })?;

            request.resolved_references.insert(referenced_id.clone(), instance_id);
        }

        Ok(request)
    }
}

impl CloudConnector for LocalConnector {
    fn request_instance(&self, order: &Order) -> Result<InstanceId> {
        let plugin = self.plugins.get(order.resource_type(), &order.cloud_name)?;
        let credential = self.credentials.map(&order.requester, &order.cloud_name)?;
        let request = self.resolve(order)?;

        let instance_id = plugin.request_instance(&request, &credential)?;
        log::info!("Cloud '{}' accepted order {} as instance {}.", order.cloud_name, order.id(), instance_id);
        Ok(instance_id)
    }

    fn get_instance(&self, order: &Order) -> Result<OrderInstance> {
        let instance_id = order
            .instance_id()
            .ok_or_else(|| CloudError::InstanceNotFound(format!("order {} has no instance", order.id())))?;
        let plugin = self.plugins.get(order.resource_type(), &order.cloud_name)?;
        let credential = self.credentials.map(&order.requester, &order.cloud_name)?;

        let raw = plugin.get_instance(order, instance_id, &credential)?;
        Ok(OrderInstance::from_raw(raw, plugin.status_mapper()))
    }

    fn delete_instance(&self, order: &Order) -> Result<()> {
        let Some(instance_id) = order.instance_id() else {
            log::debug!("Order {} never got an instance, nothing to delete.", order.id());
            return Ok(());
        };
        let plugin = self.plugins.get(order.resource_type(), &order.cloud_name)?;
        let credential = self.credentials.map(&order.requester, &order.cloud_name)?;

        plugin.delete_instance(order, instance_id, &credential)?;
        log::info!("Deleted instance {} of order {}.", instance_id, order.id());
        Ok(())
    }
}
