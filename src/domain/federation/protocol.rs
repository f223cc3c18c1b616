use serde::{Deserialize, Serialize};

use crate::domain::order::instance::OrderInstance;
use crate::domain::order::order::Order;
use crate::domain::utils::id::{InstanceId, MemberId, OrderId};
use crate::error::{CloudError, Error};

/// Operations a requesting member asks of the provider member.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum FederationRequest {
    /// Provision `order` at the provider. Repeating it for an order the
    /// provider already holds acknowledges it again.
    CreateOrder { order: Order },
    GetInstance { order_id: OrderId },
    DeleteOrder { order_id: OrderId },
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub enum FederationResponse {
    Created { instance_id: InstanceId },
    Instance { instance: OrderInstance },
    Deleted,
    Failed { kind: RemoteFailureKind, message: String },
}

/// How the provider failed an operation it did receive.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteFailureKind {
    NotFound,
    Unavailable,
    Rejected,
    Unauthorized,
    Unexpected,
}

impl RemoteFailureKind {
    pub fn into_cloud_error(self, message: String) -> CloudError {
        match self {
            RemoteFailureKind::NotFound => CloudError::InstanceNotFound(message),
            RemoteFailureKind::Unavailable => CloudError::Unavailable(message),
            RemoteFailureKind::Rejected => CloudError::Rejected(message),
            RemoteFailureKind::Unauthorized => CloudError::Unauthorized(message),
            RemoteFailureKind::Unexpected => CloudError::Unexpected(message),
        }
    }
}

impl FederationResponse {
    pub fn failed(kind: RemoteFailureKind, message: impl Into<String>) -> Self {
        FederationResponse::Failed { kind, message: message.into() }
    }

    /// Turns a provider-side error into the answer sent back to the requester.
    pub fn from_error(error: &Error) -> Self {
        let kind = match error {
            Error::Cloud(CloudError::InstanceNotFound(_)) | Error::OrderNotFound(_) | Error::OrderNotActive(_) => {
                RemoteFailureKind::NotFound
            }
            Error::Cloud(CloudError::Unavailable(_)) | Error::RemoteUnreachable { .. } | Error::Persistence(_) => {
                RemoteFailureKind::Unavailable
            }
            Error::Cloud(CloudError::Rejected(_))
            | Error::PluginNotFound { .. }
            | Error::InvalidTransition { .. }
            | Error::OrderAlreadyActive(_)
            | Error::InstanceIdAlreadySet { .. } => RemoteFailureKind::Rejected,
            Error::Cloud(CloudError::Unauthorized(_)) => RemoteFailureKind::Unauthorized,
            _ => RemoteFailureKind::Unexpected,
        };
        FederationResponse::failed(kind, error.to_string())
    }
}

/// Routing wrapper carried by every frame.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Envelope<T> {
    pub target_id: MemberId,
    pub sender_id: MemberId,
    pub payload: T,
}

impl<T> Envelope<T> {
    pub fn new(sender_id: MemberId, target_id: MemberId, payload: T) -> Self {
        Envelope { target_id, sender_id, payload }
    }
}
