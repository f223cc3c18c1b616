use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::api::broker_dto::{BrokerConfigDto, CloudDto, StorageDto};
use crate::domain::order::identity::CloudCredential;
use crate::domain::order::resource::ResourceType;
use crate::domain::utils::id::{CloudName, MemberId};
use crate::error::{Error, Result};

/// Cloud adapter families the broker can instantiate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudKind {
    Emulated,
}

impl FromStr for CloudKind {
    type Err = Error;

    fn from_str(kind: &str) -> Result<Self> {
        match kind.to_ascii_lowercase().as_str() {
            "emulated" => Ok(CloudKind::Emulated),
            other => Err(Error::ConfigError(format!("Unknown cloud kind '{}'", other))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CloudConfig {
    pub name: CloudName,
    pub kind: CloudKind,
    pub resource_types: Vec<ResourceType>,
    pub credential: CloudCredential,
    pub ready_after_polls: u32,
}

impl CloudConfig {
    pub fn emulated(name: &str, ready_after_polls: u32) -> Self {
        CloudConfig {
            name: CloudName::new(name),
            kind: CloudKind::Emulated,
            resource_types: ResourceType::ALL.to_vec(),
            credential: CloudCredential::new("emulated", ""),
            ready_after_polls,
        }
    }

    fn from_dto(dto: CloudDto) -> Result<Self> {
        let kind = CloudKind::from_str(&dto.kind)?;
        let resource_types = if dto.resource_types.is_empty() {
            ResourceType::ALL.to_vec()
        } else {
            dto.resource_types.iter().map(|name| ResourceType::from_str(name)).collect::<Result<Vec<_>>>()?
        };

        Ok(CloudConfig {
            name: CloudName::new(dto.name),
            kind,
            resource_types,
            credential: CloudCredential::new(dto.credential.user, dto.credential.secret),
            ready_after_polls: dto.ready_after_polls,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorTimings {
    pub open_sleep: Duration,
    pub spawning_sleep: Duration,
    pub fulfilled_sleep: Duration,
    pub closed_sleep: Duration,
}

impl Default for ProcessorTimings {
    fn default() -> Self {
        ProcessorTimings {
            open_sleep: Duration::from_millis(1000),
            spawning_sleep: Duration::from_millis(2000),
            fulfilled_sleep: Duration::from_millis(2000),
            closed_sleep: Duration::from_millis(2000),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FederationConfig {
    pub members: HashMap<MemberId, SocketAddr>,
    pub request_timeout: Duration,
}

impl Default for FederationConfig {
    fn default() -> Self {
        FederationConfig { members: HashMap::new(), request_timeout: Duration::from_millis(5000) }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Memory,
    JsonFile(PathBuf),
}

/// Validated broker configuration.
#[derive(Debug, Clone)]
pub struct BrokerConfig {
    pub local_member_id: MemberId,
    pub listen_addr: SocketAddr,
    pub processors: ProcessorTimings,
    pub clouds: Vec<CloudConfig>,
    pub default_cloud: CloudName,
    pub federation: FederationConfig,
    pub storage: StorageConfig,
    pub audit_log: Option<PathBuf>,
}

impl BrokerConfig {
    /// Single-site configuration with one emulated cloud named `default`.
    pub fn new(local_member_id: &str) -> Self {
        BrokerConfig {
            local_member_id: MemberId::new(local_member_id),
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 7100)),
            processors: ProcessorTimings::default(),
            clouds: vec![CloudConfig::emulated("default", 1)],
            default_cloud: CloudName::new("default"),
            federation: FederationConfig::default(),
            storage: StorageConfig::Memory,
            audit_log: None,
        }
    }

    pub fn from_dto(dto: BrokerConfigDto) -> Result<Self> {
        if dto.local_member_id.trim().is_empty() {
            return Err(Error::ConfigError("localMemberId must not be empty".to_string()));
        }

        let listen_addr = parse_addr(&dto.listen_addr, "listenAddr")?;

        if dto.clouds.is_empty() {
            return Err(Error::ConfigError("at least one cloud must be configured".to_string()));
        }
        let clouds = dto.clouds.into_iter().map(CloudConfig::from_dto).collect::<Result<Vec<_>>>()?;
        for (index, cloud) in clouds.iter().enumerate() {
            if clouds[..index].iter().any(|other| other.name == cloud.name) {
                return Err(Error::ConfigError(format!("cloud '{}' is configured twice", cloud.name)));
            }
        }

        let default_cloud = match dto.default_cloud {
            Some(name) => {
                let name = CloudName::new(name);
                if !clouds.iter().any(|cloud| cloud.name == name) {
                    return Err(Error::ConfigError(format!("defaultCloud '{}' is not among the configured clouds", name)));
                }
                name
            }
            None => clouds[0].name.clone(),
        };

        let mut members = HashMap::new();
        for member in dto.federation.members {
            let address = parse_addr(&member.address, &format!("federation member '{}'", member.id))?;
            members.insert(MemberId::new(member.id), address);
        }

        let storage = match dto.storage {
            StorageDto::Memory => StorageConfig::Memory,
            StorageDto::JsonFile { path } => StorageConfig::JsonFile(PathBuf::from(path)),
        };

        Ok(BrokerConfig {
            local_member_id: MemberId::new(dto.local_member_id),
            listen_addr,
            processors: ProcessorTimings {
                open_sleep: Duration::from_millis(dto.processors.open_sleep_ms),
                spawning_sleep: Duration::from_millis(dto.processors.spawning_sleep_ms),
                fulfilled_sleep: Duration::from_millis(dto.processors.fulfilled_sleep_ms),
                closed_sleep: Duration::from_millis(dto.processors.closed_sleep_ms),
            },
            clouds,
            default_cloud,
            federation: FederationConfig {
                members,
                request_timeout: Duration::from_millis(dto.federation.request_timeout_ms),
            },
            storage,
            audit_log: dto.audit_log.map(PathBuf::from),
        })
    }

    pub fn credentials(&self) -> HashMap<CloudName, CloudCredential> {
        self.clouds.iter().map(|cloud| (cloud.name.clone(), cloud.credential.clone())).collect()
    }
}

fn parse_addr(value: &str, what: &str) -> Result<SocketAddr> {
    value.parse::<SocketAddr>().map_err(|e| Error::ConfigError(format!("{} '{}' is not a socket address: {}", what, value, e)))
}
