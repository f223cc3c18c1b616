use std::collections::HashMap;
use std::sync::Mutex;

use crate::domain::cloud::plugin::{CloudPlugin, CloudResult, DispatchRequest};
use crate::domain::order::identity::CloudCredential;
use crate::domain::order::instance::{InstanceState, InstanceStatusMapper, RawInstance};
use crate::domain::order::order::Order;
use crate::domain::order::resource::{ResourceSpec, ResourceType};
use crate::domain::utils::id::{CloudName, InstanceId};
use crate::domain::utils::lock;
use crate::error::CloudError;

pub const STATUS_CREATING: &str = "creating";
pub const STATUS_ACTIVE: &str = "active";
pub const STATUS_ERROR: &str = "error";
pub const STATUS_UNAVAILABLE: &str = "unavailable";

/// Status mapping of the emulated cloud.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmulatedStatusMapper;

impl InstanceStatusMapper for EmulatedStatusMapper {
    fn canonicalize(&self, raw_status: &str) -> InstanceState {
        match raw_status {
            STATUS_ACTIVE | "available" | "in-use" => InstanceState::Ready,
            STATUS_CREATING | "building" | "attaching" => InstanceState::Creating,
            STATUS_ERROR | "failed" => InstanceState::Failed,
            STATUS_UNAVAILABLE | "stopped" => InstanceState::Unavailable,
            _ => InstanceState::Inconsistent,
        }
    }
}

#[derive(Debug)]
struct EmulatedInstance {
    resource_type: ResourceType,
    polls: u32,
    forced_status: Option<String>,
    detail: Vec<(String, String)>,
}

#[derive(Debug, Default)]
struct EmulatedState {
    instances: HashMap<InstanceId, EmulatedInstance>,
    counters: HashMap<ResourceType, u64>,
    fail_next_request: Option<CloudError>,
    fail_next_get: Option<CloudError>,
    fail_next_delete: Option<CloudError>,
    delete_calls: usize,
}

/// In-memory cloud serving every resource type.
///
/// Instances report `creating` until they were polled `ready_after_polls`
/// times and `active` afterwards. Statuses and failures can be forced to
/// exercise the lifecycle without a real cloud.
#[derive(Debug)]
pub struct EmulatedCloudPlugin {
    cloud_name: CloudName,
    ready_after_polls: u32,
    mapper: EmulatedStatusMapper,
    state: Mutex<EmulatedState>,
}

impl EmulatedCloudPlugin {
    pub fn new(cloud_name: CloudName, ready_after_polls: u32) -> Self {
        EmulatedCloudPlugin {
            cloud_name,
            ready_after_polls,
            mapper: EmulatedStatusMapper,
            state: Mutex::new(EmulatedState::default()),
        }
    }

    pub fn cloud_name(&self) -> &CloudName {
        &self.cloud_name
    }

    fn prefix(resource_type: ResourceType) -> &'static str {
        match resource_type {
            ResourceType::Compute => "vm",
            ResourceType::Volume => "vol",
            ResourceType::Network => "net",
            ResourceType::Attachment => "att",
            ResourceType::PublicIp => "ip",
        }
    }

    /// Pins the raw status an instance reports from now on.
    pub fn set_status(&self, instance_id: &InstanceId, raw_status: &str) -> bool {
        let mut state = lock::lock(&self.state);
        match state.instances.get_mut(instance_id) {
            Some(instance) => {
                instance.forced_status = Some(raw_status.to_string());
                true
            }
            None => false,
        }
    }

    /// Drops an instance behind the broker's back.
    pub fn remove_instance(&self, instance_id: &InstanceId) -> bool {
        lock::lock(&self.state).instances.remove(instance_id).is_some()
    }

    pub fn fail_next_request(&self, error: CloudError) {
        lock::lock(&self.state).fail_next_request = Some(error);
    }

    pub fn fail_next_get(&self, error: CloudError) {
        lock::lock(&self.state).fail_next_get = Some(error);
    }

    pub fn fail_next_delete(&self, error: CloudError) {
        lock::lock(&self.state).fail_next_delete = Some(error);
    }

    pub fn has_instance(&self, instance_id: &InstanceId) -> bool {
        lock::lock(&self.state).instances.contains_key(instance_id)
    }

    pub fn instance_count(&self) -> usize {
        lock::lock(&self.state).instances.len()
    }

    /// Delete attempts received so far, failed ones included.
    pub fn delete_calls(&self) -> usize {
        lock::lock(&self.state).delete_calls
    }
}

impl CloudPlugin for EmulatedCloudPlugin {
    fn request_instance(&self, request: &DispatchRequest<'_>, credential: &CloudCredential) -> CloudResult<InstanceId> {
        let mut state = lock::lock(&self.state);
        if let Some(error) = state.fail_next_request.take() {
            return Err(error);
        }

        let order = request.order;
        let mut detail = vec![("owner".to_string(), credential.user.clone())];
        match order.spec() {
            ResourceSpec::Compute { image_id, .. } if image_id.is_empty() => {
                return Err(CloudError::Rejected("compute order names no image".to_string()));
            }
            ResourceSpec::Attachment { compute_order_id, volume_order_id, .. } => {
                for (key, referenced) in [("compute", compute_order_id), ("volume", volume_order_id)] {
                    let instance = request.referenced_instance(referenced).ok_or_else(|| {
                        CloudError::Rejected(format!("attachment references unresolved order {}", referenced))
                    })?;
                    if !state.instances.contains_key(instance) {
                        return Err(CloudError::InstanceNotFound(instance.to_string()));
                    }
                    detail.push((key.to_string(), instance.to_string()));
                }
            }
            ResourceSpec::PublicIp { compute_order_id } => {
                let instance = request.referenced_instance(compute_order_id).ok_or_else(|| {
                    CloudError::Rejected(format!("public ip references unresolved order {}", compute_order_id))
                })?;
                detail.push(("compute".to_string(), instance.to_string()));
            }
            _ => {}
        }

        let resource_type = order.resource_type();
        let counter = state.counters.entry(resource_type).or_insert(0);
        *counter += 1;
        let instance_id = InstanceId::new(format!("{}-{}", Self::prefix(resource_type), counter));

        state
            .instances
            .insert(instance_id.clone(), EmulatedInstance { resource_type, polls: 0, forced_status: None, detail });
        log::debug!("Emulated cloud '{}' created {} for order {}.", self.cloud_name, instance_id, order.id());

        Ok(instance_id)
    }

    fn get_instance(
        &self,
        _order: &Order,
        instance_id: &InstanceId,
        _credential: &CloudCredential,
    ) -> CloudResult<RawInstance> {
        let mut state = lock::lock(&self.state);
        if let Some(error) = state.fail_next_get.take() {
            return Err(error);
        }

        let ready_after_polls = self.ready_after_polls;
        let instance =
            state.instances.get_mut(instance_id).ok_or_else(|| CloudError::InstanceNotFound(instance_id.to_string()))?;
        instance.polls = instance.polls.saturating_add(1);

        let raw_status = match &instance.forced_status {
            Some(status) => status.clone(),
            None if instance.polls >= ready_after_polls => STATUS_ACTIVE.to_string(),
            None => STATUS_CREATING.to_string(),
        };

        let mut raw = RawInstance::new(instance_id.clone(), raw_status)
            .with_detail("resourceType", instance.resource_type.to_string())
            .with_detail("cloud", self.cloud_name.to_string());
        for (key, value) in &instance.detail {
            raw = raw.with_detail(key.clone(), value.clone());
        }
        Ok(raw)
    }

    fn delete_instance(&self, _order: &Order, instance_id: &InstanceId, _credential: &CloudCredential) -> CloudResult<()> {
        let mut state = lock::lock(&self.state);
        state.delete_calls += 1;
        if let Some(error) = state.fail_next_delete.take() {
            return Err(error);
        }

        match state.instances.remove(instance_id) {
            Some(_) => Ok(()),
            None => Err(CloudError::InstanceNotFound(instance_id.to_string())),
        }
    }

    fn status_mapper(&self) -> &dyn InstanceStatusMapper {
        &self.mapper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::identity::RequesterIdentity;
    use crate::domain::utils::id::{MemberId, OrderId};

    fn compute(id: &str) -> Order {
        Order::new(
            OrderId::new(id),
            ResourceSpec::Compute {
                vcpu: 1,
                memory_mb: 512,
                disk_gb: 10,
                image_id: "debian-12".to_string(),
                network_order_ids: vec![],
            },
            MemberId::new("site-a"),
            MemberId::new("site-a"),
            CloudName::new("default"),
            RequesterIdentity::new("alice", "ldap", "token"),
        )
    }

    fn credential() -> CloudCredential {
        CloudCredential::new("svc", "secret")
    }

    #[test]
    fn instances_become_active_after_enough_polls() {
        let plugin = EmulatedCloudPlugin::new(CloudName::new("default"), 2);
        let order = compute("c-1");
        let id = plugin.request_instance(&DispatchRequest::new(&order), &credential()).unwrap();
        assert_eq!(id, InstanceId::new("vm-1"));

        let first = plugin.get_instance(&order, &id, &credential()).unwrap();
        assert_eq!(first.raw_status, STATUS_CREATING);
        let second = plugin.get_instance(&order, &id, &credential()).unwrap();
        assert_eq!(second.raw_status, STATUS_ACTIVE);
        assert!(plugin.status_mapper().is_ready(&second.raw_status));
    }

    #[test]
    fn forced_failures_are_consumed_once() {
        let plugin = EmulatedCloudPlugin::new(CloudName::new("default"), 1);
        let order = compute("c-1");
        plugin.fail_next_request(CloudError::Unavailable("throttled".to_string()));

        assert!(plugin.request_instance(&DispatchRequest::new(&order), &credential()).is_err());
        assert!(plugin.request_instance(&DispatchRequest::new(&order), &credential()).is_ok());
    }

    #[test]
    fn deleting_twice_reports_not_found() {
        let plugin = EmulatedCloudPlugin::new(CloudName::new("default"), 1);
        let order = compute("c-1");
        let id = plugin.request_instance(&DispatchRequest::new(&order), &credential()).unwrap();

        plugin.delete_instance(&order, &id, &credential()).unwrap();
        let err = plugin.delete_instance(&order, &id, &credential()).unwrap_err();
        assert!(err.is_instance_not_found());
        assert_eq!(plugin.delete_calls(), 2);
    }

    #[test]
    fn mapper_covers_the_canonical_states() {
        let mapper = EmulatedStatusMapper;
        assert_eq!(mapper.canonicalize(STATUS_ERROR), InstanceState::Failed);
        assert_eq!(mapper.canonicalize(STATUS_UNAVAILABLE), InstanceState::Unavailable);
        assert_eq!(mapper.canonicalize("what"), InstanceState::Inconsistent);
        assert!(mapper.has_failed("failed"));
    }
}
