use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::utils::id::OrderId;
use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Compute,
    Volume,
    Network,
    Attachment,
    PublicIp,
}

impl ResourceType {
    pub const ALL: [ResourceType; 5] =
        [ResourceType::Compute, ResourceType::Volume, ResourceType::Network, ResourceType::Attachment, ResourceType::PublicIp];
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceType::Compute => "COMPUTE",
            ResourceType::Volume => "VOLUME",
            ResourceType::Network => "NETWORK",
            ResourceType::Attachment => "ATTACHMENT",
            ResourceType::PublicIp => "PUBLIC_IP",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for ResourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "COMPUTE" => Ok(ResourceType::Compute),
            "VOLUME" => Ok(ResourceType::Volume),
            "NETWORK" => Ok(ResourceType::Network),
            "ATTACHMENT" => Ok(ResourceType::Attachment),
            "PUBLIC_IP" | "PUBLICIP" => Ok(ResourceType::PublicIp),
            other => Err(Error::ConfigError(format!("Unknown resource type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkAllocationMode {
    Dynamic,
    Static,
}

/// Resource-specific payload. The engine only reads the variant tag and the
/// order references held by dependent resources; everything else is passed
/// through to the cloud plugin untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ResourceSpec {
    Compute { vcpu: u32, memory_mb: u64, disk_gb: u64, image_id: String, network_order_ids: Vec<OrderId> },
    Volume { size_gb: u64 },
    Network { cidr: String, gateway: Option<String>, allocation_mode: NetworkAllocationMode },
    Attachment { compute_order_id: OrderId, volume_order_id: OrderId, device: Option<String> },
    PublicIp { compute_order_id: OrderId },
}

impl ResourceSpec {
    pub fn resource_type(&self) -> ResourceType {
        match self {
            ResourceSpec::Compute { .. } => ResourceType::Compute,
            ResourceSpec::Volume { .. } => ResourceType::Volume,
            ResourceSpec::Network { .. } => ResourceType::Network,
            ResourceSpec::Attachment { .. } => ResourceType::Attachment,
            ResourceSpec::PublicIp { .. } => ResourceType::PublicIp,
        }
    }

    /// Other orders this resource can only be created against, with the
    /// resource type each of them must have.
    pub fn referenced_orders(&self) -> Vec<(&OrderId, ResourceType)> {
        match self {
            ResourceSpec::Compute { network_order_ids, .. } => {
                network_order_ids.iter().map(|id| (id, ResourceType::Network)).collect()
            }
            ResourceSpec::Attachment { compute_order_id, volume_order_id, .. } => {
                vec![(compute_order_id, ResourceType::Compute), (volume_order_id, ResourceType::Volume)]
            }
            ResourceSpec::PublicIp { compute_order_id } => vec![(compute_order_id, ResourceType::Compute)],
            ResourceSpec::Volume { .. } | ResourceSpec::Network { .. } => Vec::new(),
        }
    }
}
