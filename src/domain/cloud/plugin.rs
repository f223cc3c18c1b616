use std::collections::HashMap;

use crate::domain::order::identity::CloudCredential;
use crate::domain::order::instance::{InstanceStatusMapper, RawInstance};
use crate::domain::order::order::Order;
use crate::domain::utils::id::{InstanceId, OrderId};
use crate::error::CloudError;

pub type CloudResult<T> = std::result::Result<T, CloudError>;

/// An order ready for dispatch, with the orders it depends on resolved to
/// their cloud instance ids.
#[derive(Debug)]
pub struct DispatchRequest<'a> {
    pub order: &'a Order,
    pub resolved_references: HashMap<OrderId, InstanceId>,
}

impl<'a> DispatchRequest<'a> {
    pub fn new(order: &'a Order) -> Self {
        DispatchRequest { order, resolved_references: HashMap::new() }
    }

    pub fn referenced_instance(&self, order_id: &OrderId) -> Option<&InstanceId> {
        self.resolved_references.get(order_id)
    }
}

/// Instance management contract of one cloud for one or more resource types.
///
/// Calls are synchronous and may be slow; they run on the calling
/// processor's thread.
pub trait CloudPlugin: Send + Sync {
    fn request_instance(&self, request: &DispatchRequest<'_>, credential: &CloudCredential) -> CloudResult<InstanceId>;

    fn get_instance(&self, order: &Order, instance_id: &InstanceId, credential: &CloudCredential)
    -> CloudResult<RawInstance>;

    fn delete_instance(&self, order: &Order, instance_id: &InstanceId, credential: &CloudCredential) -> CloudResult<()>;

    fn status_mapper(&self) -> &dyn InstanceStatusMapper;
}
