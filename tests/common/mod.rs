#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use resource_broker::domain::broker::{BrokerParts, OrderBroker};
use resource_broker::domain::cloud::connectivity::{AlwaysReachable, ConnectivityChecker};
use resource_broker::domain::cloud::credential::ConfiguredCredentialMapper;
use resource_broker::domain::cloud::emulated::EmulatedCloudPlugin;
use resource_broker::domain::cloud::plugin::CloudPlugin;
use resource_broker::domain::cloud::plugin_registry::PluginRegistry;
use resource_broker::domain::config::BrokerConfig;
use resource_broker::domain::connector::remote_connector::{NoFederation, RemoteTransport};
use resource_broker::domain::order::identity::RequesterIdentity;
use resource_broker::domain::order::instance::OrderInstance;
use resource_broker::domain::order::order::Order;
use resource_broker::domain::order::resource::ResourceSpec;
use resource_broker::domain::storage::OrderStorage;
use resource_broker::domain::storage::in_memory::InMemoryOrderStorage;
use resource_broker::domain::utils::id::{CloudName, OrderId};

/// One member with an emulated cloud the test can steer.
pub struct Site {
    pub broker: OrderBroker,
    pub cloud: Arc<EmulatedCloudPlugin>,
}

pub fn alice() -> RequesterIdentity {
    RequesterIdentity::new("alice", "ldap", "alice-token")
}

pub fn bob() -> RequesterIdentity {
    RequesterIdentity::new("bob", "ldap", "bob-token")
}

pub fn compute_spec() -> ResourceSpec {
    ResourceSpec::Compute {
        vcpu: 2,
        memory_mb: 4096,
        disk_gb: 20,
        image_id: "ubuntu-22.04".to_string(),
        network_order_ids: Vec::new(),
    }
}

pub fn site(member: &str) -> Site {
    site_with(member, Arc::new(InMemoryOrderStorage::new()), Arc::new(NoFederation), Arc::new(AlwaysReachable))
}

pub fn site_with(
    member: &str,
    storage: Arc<dyn OrderStorage>,
    remote: Arc<dyn RemoteTransport>,
    connectivity: Arc<dyn ConnectivityChecker>,
) -> Site {
    let config = BrokerConfig::new(member);
    let cloud = Arc::new(EmulatedCloudPlugin::new(CloudName::new("default"), 1));

    let mut plugins = PluginRegistry::new();
    plugins.register_all(CloudName::new("default"), cloud.clone() as Arc<dyn CloudPlugin>);

    let parts = BrokerParts {
        plugins,
        storage,
        remote,
        connectivity,
        credentials: Arc::new(ConfiguredCredentialMapper::new(config.credentials())),
    };

    Site { broker: OrderBroker::with_parts(config, parts).unwrap(), cloud }
}

impl Site {
    pub fn order(&self, spec: ResourceSpec) -> Order {
        self.broker.local_order(spec, alice())
    }

    pub fn submit(&self, spec: ResourceSpec) -> OrderId {
        self.broker.activate_new_order(self.order(spec)).unwrap()
    }

    pub fn snapshot(&self, order_id: &OrderId) -> Order {
        self.broker.get_order(order_id).unwrap()
    }
}

/// Reachability answer the test flips at will.
#[derive(Debug)]
pub struct ToggleReachability {
    reachable: AtomicBool,
}

impl ToggleReachability {
    pub fn new(reachable: bool) -> Self {
        ToggleReachability { reachable: AtomicBool::new(reachable) }
    }

    pub fn set(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

impl ConnectivityChecker for ToggleReachability {
    fn is_reachable(&self, _order: &Order, _instance: &OrderInstance) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }
}
