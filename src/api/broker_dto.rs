use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokerConfigDto {
    pub local_member_id: String,
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    #[serde(default)]
    pub processors: ProcessorsDto,
    #[serde(default = "default_clouds")]
    pub clouds: Vec<CloudDto>,
    #[serde(default)]
    pub default_cloud: Option<String>,
    #[serde(default)]
    pub federation: FederationDto,
    #[serde(default)]
    pub storage: StorageDto,
    #[serde(default)]
    pub audit_log: Option<String>,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessorsDto {
    #[serde(default = "default_open_sleep_ms")]
    pub open_sleep_ms: u64,
    #[serde(default = "default_sleep_ms")]
    pub spawning_sleep_ms: u64,
    #[serde(default = "default_sleep_ms")]
    pub fulfilled_sleep_ms: u64,
    #[serde(default = "default_sleep_ms")]
    pub closed_sleep_ms: u64,
}

impl Default for ProcessorsDto {
    fn default() -> Self {
        ProcessorsDto {
            open_sleep_ms: default_open_sleep_ms(),
            spawning_sleep_ms: default_sleep_ms(),
            fulfilled_sleep_ms: default_sleep_ms(),
            closed_sleep_ms: default_sleep_ms(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudDto {
    pub name: String,
    #[serde(default = "default_cloud_kind")]
    pub kind: String,
    /// Empty means every resource type.
    #[serde(default)]
    pub resource_types: Vec<String>,
    #[serde(default)]
    pub credential: CredentialDto,
    #[serde(default = "default_ready_after_polls")]
    pub ready_after_polls: u32,
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CredentialDto {
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationDto {
    #[serde(default)]
    pub members: Vec<FederationMemberDto>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for FederationDto {
    fn default() -> Self {
        FederationDto { members: Vec::new(), request_timeout_ms: default_request_timeout_ms() }
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FederationMemberDto {
    pub id: String,
    pub address: String,
}

#[derive(Debug, Deserialize, Clone, Serialize, Default)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum StorageDto {
    #[default]
    Memory,
    JsonFile {
        path: String,
    },
}

fn default_listen_addr() -> String {
    "0.0.0.0:7100".to_string()
}

fn default_open_sleep_ms() -> u64 {
    1000
}

fn default_sleep_ms() -> u64 {
    2000
}

fn default_cloud_kind() -> String {
    "emulated".to_string()
}

fn default_ready_after_polls() -> u32 {
    1
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_clouds() -> Vec<CloudDto> {
    vec![CloudDto {
        name: "default".to_string(),
        kind: default_cloud_kind(),
        resource_types: Vec::new(),
        credential: CredentialDto::default(),
        ready_after_polls: default_ready_after_polls(),
    }]
}
