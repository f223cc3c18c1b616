use thiserror::Error;

use crate::domain::order::order_state::OrderState;
use crate::domain::order::resource::ResourceType;
use crate::domain::utils::id::{CloudName, InstanceId, MemberId, OrderId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("File not found or could not be read: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    DeserializationError(#[from] serde_json::Error),

    #[error("Invalid broker configuration: {0}")]
    ConfigError(String),

    #[error("Cloud operation failed: {0}")]
    Cloud(#[from] CloudError),

    /// The provider member could not be reached, its view of the order is unknown.
    #[error("Remote member {member} is unreachable: {reason}")]
    RemoteUnreachable { member: MemberId, reason: String },

    #[error("Order persistence failed: {0}")]
    Persistence(#[from] StorageError),

    #[error("Order {order_id} can not move from {from} to {to}")]
    InvalidTransition { order_id: OrderId, from: OrderState, to: OrderState },

    #[error("Order {0} is already active")]
    OrderAlreadyActive(OrderId),

    #[error("Order {0} not found")]
    OrderNotFound(OrderId),

    /// The handle is not (or no longer) registered as an active order.
    #[error("Order {0} is not active in the registry")]
    OrderNotActive(OrderId),

    #[error("No plugin registered for {resource_type} orders on cloud '{cloud_name}'")]
    PluginNotFound { resource_type: ResourceType, cloud_name: CloudName },

    #[error("Order {order_id} already holds instance {current}, refusing to set {requested}")]
    InstanceIdAlreadySet { order_id: OrderId, current: InstanceId, requested: InstanceId },

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl Error {
    pub fn is_remote_unreachable(&self) -> bool {
        matches!(self, Error::RemoteUnreachable { .. })
    }

    pub fn is_instance_not_found(&self) -> bool {
        matches!(self, Error::Cloud(cloud_error) if cloud_error.is_instance_not_found())
    }
}

/// Errors raised by cloud plugins through the dispatch contract.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CloudError {
    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    /// Timeouts, throttling, 5xx answers. Retried on the next sweep.
    #[error("Cloud unavailable: {0}")]
    Unavailable(String),

    /// Bad image, quota exceeded, invalid references.
    #[error("Request rejected by cloud: {0}")]
    Rejected(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unexpected cloud error: {0}")]
    Unexpected(String),
}

impl CloudError {
    pub fn is_instance_not_found(&self) -> bool {
        matches!(self, CloudError::InstanceNotFound(_))
    }
}

/// Errors raised by the order persistence contract.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize stored orders: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Order {0} was never saved")]
    NotFound(OrderId),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, Error>;
