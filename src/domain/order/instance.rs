use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::utils::id::InstanceId;

/// Canonical vocabulary every cloud's raw instance status is mapped into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceState {
    Ready,
    Failed,
    Creating,
    Unavailable,
    Inconsistent,
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InstanceState::Ready => "READY",
            InstanceState::Failed => "FAILED",
            InstanceState::Creating => "CREATING",
            InstanceState::Unavailable => "UNAVAILABLE",
            InstanceState::Inconsistent => "INCONSISTENT",
        };
        write!(f, "{}", name)
    }
}

/// Maps a cloud's raw status strings into [`InstanceState`].
///
/// Implementors only provide `canonicalize`; the helpers are derived from it
/// so they can never disagree with the mapping.
pub trait InstanceStatusMapper: Send + Sync {
    fn canonicalize(&self, raw_status: &str) -> InstanceState;

    fn is_ready(&self, raw_status: &str) -> bool {
        self.canonicalize(raw_status) == InstanceState::Ready
    }

    fn has_failed(&self, raw_status: &str) -> bool {
        self.canonicalize(raw_status) == InstanceState::Failed
    }
}

/// What a plugin reports about a cloud instance, before canonicalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawInstance {
    pub instance_id: InstanceId,
    pub raw_status: String,
    pub detail: BTreeMap<String, String>,
}

impl RawInstance {
    pub fn new(instance_id: InstanceId, raw_status: impl Into<String>) -> Self {
        RawInstance { instance_id, raw_status: raw_status.into(), detail: BTreeMap::new() }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.detail.insert(key.into(), value.into());
        self
    }
}

/// Instance view handed to processors: canonical state plus the raw detail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderInstance {
    pub instance_id: InstanceId,
    pub state: InstanceState,
    pub raw_status: String,
    pub detail: BTreeMap<String, String>,
}

impl OrderInstance {
    pub fn from_raw(raw: RawInstance, mapper: &dyn InstanceStatusMapper) -> Self {
        let state = mapper.canonicalize(&raw.raw_status);
        OrderInstance { instance_id: raw.instance_id, state, raw_status: raw.raw_status, detail: raw.detail }
    }
}
