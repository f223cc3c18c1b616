pub mod connector_factory;
pub mod local_connector;
pub mod remote_connector;

use crate::domain::order::instance::OrderInstance;
use crate::domain::order::order::Order;
use crate::domain::utils::id::InstanceId;
use crate::error::Result;

/// What processors call to act on an order's cloud instance, wherever the
/// provider lives.
pub trait CloudConnector: Send + Sync {
    fn request_instance(&self, order: &Order) -> Result<InstanceId>;

    fn get_instance(&self, order: &Order) -> Result<OrderInstance>;

    fn delete_instance(&self, order: &Order) -> Result<()>;
}
