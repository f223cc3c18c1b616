use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::api::order_dto::{OrderDto, ResourceDto};
use crate::domain::order::identity::RequesterIdentity;
use crate::domain::order::order_state::OrderState;
use crate::domain::order::resource::{NetworkAllocationMode, ResourceSpec, ResourceType};
use crate::domain::utils::id::{CloudName, InstanceId, MemberId, OrderId};
use crate::domain::utils::lock;
use crate::error::{Error, Result};

/// A request for one cloud resource.
///
/// `state` is only written by the state transitioner, `instance_id` only
/// ever goes from unset to one fixed value. Both are mutated while the
/// order's own lock is held (see [`OrderHandle::lock`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    spec: ResourceSpec,
    state: OrderState,
    pub requester_member: MemberId,
    pub provider_member: MemberId,
    pub cloud_name: CloudName,
    instance_id: Option<InstanceId>,
    pub requester: RequesterIdentity,
    pub requirements: HashMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub fault_message: Option<String>,
    #[serde(default)]
    teardown_confirmed: bool,
}

impl Order {
    pub fn new(
        id: OrderId,
        spec: ResourceSpec,
        requester_member: MemberId,
        provider_member: MemberId,
        cloud_name: CloudName,
        requester: RequesterIdentity,
    ) -> Self {
        Order {
            id,
            spec,
            state: OrderState::Open,
            requester_member,
            provider_member,
            cloud_name,
            instance_id: None,
            requester,
            requirements: HashMap::new(),
            created_at: Utc::now(),
            fault_message: None,
            teardown_confirmed: false,
        }
    }

    /// Builds an order from an orders-file entry. Missing ids are generated,
    /// a missing provider means the local member and a missing cloud the
    /// default cloud.
    pub fn from_dto(dto: OrderDto, local_member: &MemberId, default_cloud: &CloudName) -> Result<Self> {
        let spec = match dto.resource {
            ResourceDto::Compute { vcpu, memory_mb, disk_gb, image_id, network_order_ids } => ResourceSpec::Compute {
                vcpu,
                memory_mb,
                disk_gb,
                image_id,
                network_order_ids: network_order_ids.into_iter().map(OrderId::new).collect(),
            },
            ResourceDto::Volume { size_gb } => ResourceSpec::Volume { size_gb },
            ResourceDto::Network { cidr, gateway, allocation_mode } => {
                let allocation_mode = match allocation_mode.as_deref().map(str::to_ascii_lowercase).as_deref() {
                    None | Some("dynamic") => NetworkAllocationMode::Dynamic,
                    Some("static") => NetworkAllocationMode::Static,
                    Some(other) => {
                        return Err(Error::ConfigError(format!("Unknown network allocation mode '{}'", other)));
                    }
                };
                ResourceSpec::Network { cidr, gateway, allocation_mode }
            }
            ResourceDto::Attachment { compute_order_id, volume_order_id, device } => ResourceSpec::Attachment {
                compute_order_id: OrderId::new(compute_order_id),
                volume_order_id: OrderId::new(volume_order_id),
                device,
            },
            ResourceDto::PublicIp { compute_order_id } => {
                ResourceSpec::PublicIp { compute_order_id: OrderId::new(compute_order_id) }
            }
        };

        let id = dto.id.map(OrderId::new).unwrap_or_else(OrderId::generate);
        let provider = dto.provider_member.map(MemberId::new).unwrap_or_else(|| local_member.clone());
        let cloud_name = dto.cloud_name.map(CloudName::new).unwrap_or_else(|| default_cloud.clone());
        let requester =
            RequesterIdentity::new(dto.requester.user_id, dto.requester.identity_provider, dto.requester.token);

        let mut order = Order::new(id, spec, local_member.clone(), provider, cloud_name, requester);
        order.requirements = dto.requirements;
        Ok(order)
    }

    /// The order as a provider member receives it: OPEN, with none of the
    /// requester-side progress.
    pub(crate) fn forwarded_copy(&self) -> Order {
        let mut copy = self.clone();
        copy.state = OrderState::Open;
        copy.instance_id = None;
        copy.fault_message = None;
        copy.teardown_confirmed = false;
        copy
    }

    pub fn with_requirement(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.requirements.insert(key.into(), value.into());
        self
    }

    pub fn id(&self) -> &OrderId {
        &self.id
    }

    pub fn spec(&self) -> &ResourceSpec {
        &self.spec
    }

    pub fn resource_type(&self) -> ResourceType {
        self.spec.resource_type()
    }

    pub fn state(&self) -> OrderState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: OrderState) {
        self.state = state;
    }

    pub fn instance_id(&self) -> Option<&InstanceId> {
        self.instance_id.as_ref()
    }

    /// Records the cloud instance backing this order. Setting the same id
    /// again is accepted, replacing it with a different one is not.
    pub fn set_instance_id(&mut self, instance_id: InstanceId) -> Result<()> {
        match &self.instance_id {
            Some(current) if *current != instance_id => Err(Error::InstanceIdAlreadySet {
                order_id: self.id.clone(),
                current: current.clone(),
                requested: instance_id,
            }),
            _ => {
                self.instance_id = Some(instance_id);
                Ok(())
            }
        }
    }

    pub fn is_provider_local(&self, local_member: &MemberId) -> bool {
        self.provider_member == *local_member
    }

    /// Set once the cloud confirmed the instance is gone, so a retried
    /// deactivation does not delete twice.
    pub fn teardown_confirmed(&self) -> bool {
        self.teardown_confirmed
    }

    pub(crate) fn confirm_teardown(&mut self) {
        self.teardown_confirmed = true;
    }

    /// Copy of the order as it will look once it is in `state`.
    pub(crate) fn snapshot_in(&self, state: OrderState) -> Order {
        let mut snapshot = self.clone();
        snapshot.state = state;
        snapshot
    }
}

/// Shared reference to an active order. The registry map and the state
/// buckets hold clones of the same handle.
#[derive(Debug, Clone)]
pub struct OrderHandle {
    id: OrderId,
    resource_type: ResourceType,
    inner: Arc<Mutex<Order>>,
}

impl OrderHandle {
    pub fn new(order: Order) -> Self {
        OrderHandle { id: order.id.clone(), resource_type: order.resource_type(), inner: Arc::new(Mutex::new(order)) }
    }

    pub fn id(&self) -> &OrderId {
        &self.id
    }

    /// Readable without taking the order lock, the resource type never changes.
    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn lock(&self) -> LockedOrder<'_> {
        LockedOrder { handle: self, guard: lock::lock(&self.inner) }
    }

    pub fn snapshot(&self) -> Order {
        self.lock().clone()
    }

    pub fn same_order(&self, other: &OrderHandle) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// An order whose lock is held by the current thread.
pub struct LockedOrder<'a> {
    handle: &'a OrderHandle,
    guard: MutexGuard<'a, Order>,
}

impl<'a> LockedOrder<'a> {
    pub fn handle(&self) -> &'a OrderHandle {
        self.handle
    }
}

impl Deref for LockedOrder<'_> {
    type Target = Order;

    fn deref(&self) -> &Order {
        &self.guard
    }
}

impl DerefMut for LockedOrder<'_> {
    fn deref_mut(&mut self) -> &mut Order {
        &mut self.guard
    }
}
