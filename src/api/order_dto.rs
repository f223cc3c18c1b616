use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One entry of an orders file handed to the daemon with `--orders`.
#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDto {
    #[serde(default)]
    pub id: Option<String>,
    /// Defaults to the local member.
    #[serde(default)]
    pub provider_member: Option<String>,
    /// Defaults to the configured default cloud.
    #[serde(default)]
    pub cloud_name: Option<String>,
    pub requester: RequesterDto,
    #[serde(default)]
    pub requirements: HashMap<String, String>,
    pub resource: ResourceDto,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequesterDto {
    pub user_id: String,
    #[serde(default)]
    pub identity_provider: String,
    #[serde(default)]
    pub token: String,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ResourceDto {
    Compute {
        vcpu: u32,
        memory_mb: u64,
        disk_gb: u64,
        image_id: String,
        #[serde(default)]
        network_order_ids: Vec<String>,
    },
    Volume {
        size_gb: u64,
    },
    Network {
        cidr: String,
        #[serde(default)]
        gateway: Option<String>,
        #[serde(default)]
        allocation_mode: Option<String>,
    },
    Attachment {
        compute_order_id: String,
        volume_order_id: String,
        #[serde(default)]
        device: Option<String>,
    },
    PublicIp {
        compute_order_id: String,
    },
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrdersFileDto {
    pub orders: Vec<OrderDto>,
}
