use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::cloud::emulated::EmulatedCloudPlugin;
use crate::domain::cloud::plugin::CloudPlugin;
use crate::domain::config::{CloudConfig, CloudKind};
use crate::domain::order::resource::ResourceType;
use crate::domain::utils::id::CloudName;
use crate::error::{Error, Result};

/// Explicit `(resource type, cloud)` to plugin mapping, built once at startup.
#[derive(Default, Clone)]
pub struct PluginRegistry {
    plugins: HashMap<(ResourceType, CloudName), Arc<dyn CloudPlugin>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(clouds: &[CloudConfig]) -> Result<Self> {
        let mut registry = PluginRegistry::new();

        for cloud in clouds {
            let plugin: Arc<dyn CloudPlugin> = match cloud.kind {
                CloudKind::Emulated => Arc::new(EmulatedCloudPlugin::new(cloud.name.clone(), cloud.ready_after_polls)),
            };
            for resource_type in &cloud.resource_types {
                registry.register(*resource_type, cloud.name.clone(), plugin.clone());
            }
            log::info!("Cloud '{}' ({:?}) serves {:?}.", cloud.name, cloud.kind, cloud.resource_types);
        }

        Ok(registry)
    }

    /// Registers `plugin` for one resource type on one cloud, replacing any
    /// previous registration.
    pub fn register(&mut self, resource_type: ResourceType, cloud_name: CloudName, plugin: Arc<dyn CloudPlugin>) {
        self.plugins.insert((resource_type, cloud_name), plugin);
    }

    /// Registers `plugin` for every resource type on `cloud_name`.
    pub fn register_all(&mut self, cloud_name: CloudName, plugin: Arc<dyn CloudPlugin>) {
        for resource_type in ResourceType::ALL {
            self.register(resource_type, cloud_name.clone(), plugin.clone());
        }
    }

    pub fn get(&self, resource_type: ResourceType, cloud_name: &CloudName) -> Result<Arc<dyn CloudPlugin>> {
        self.plugins
            .get(&(resource_type, cloud_name.clone()))
            .cloned()
            .ok_or_else(|| Error::PluginNotFound { resource_type, cloud_name: cloud_name.clone() })
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_keyed_by_type_and_cloud() {
        let mut cloud = CloudConfig::emulated("east", 1);
        cloud.resource_types = vec![ResourceType::Compute, ResourceType::Volume];
        let registry = PluginRegistry::from_config(&[cloud]).unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.get(ResourceType::Compute, &CloudName::new("east")).is_ok());

        let missing_type = registry.get(ResourceType::Network, &CloudName::new("east"));
        assert!(matches!(missing_type, Err(Error::PluginNotFound { .. })));
        let missing_cloud = registry.get(ResourceType::Compute, &CloudName::new("west"));
        assert!(matches!(missing_cloud, Err(Error::PluginNotFound { .. })));
    }
}
