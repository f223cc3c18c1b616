mod common;

use common::{alice, compute_spec};
use resource_broker::domain::broker::OrderBroker;
use resource_broker::domain::config::{BrokerConfig, StorageConfig};
use resource_broker::domain::order::order_state::OrderState;
use resource_broker::domain::order::resource::ResourceSpec;
use resource_broker::domain::storage::OrderStorage;
use resource_broker::domain::storage::json_file::JsonFileOrderStorage;

fn config_in(dir: &tempfile::TempDir) -> BrokerConfig {
    let mut config = BrokerConfig::new("site-a");
    config.storage = StorageConfig::JsonFile(dir.path().join("orders.json"));
    config
}

#[test]
fn restarted_broker_rebuilds_buckets_from_storage() {
    let dir = tempfile::tempdir().unwrap();

    let (spawning, open, deleted) = {
        let broker = OrderBroker::new(config_in(&dir)).unwrap();
        let spawning = broker.activate_new_order(broker.local_order(compute_spec(), alice())).unwrap();
        let deleted = broker.activate_new_order(broker.local_order(ResourceSpec::Volume { size_gb: 1 }, alice())).unwrap();
        broker.sweep(OrderState::Open).unwrap();

        let open = broker.activate_new_order(broker.local_order(ResourceSpec::Volume { size_gb: 2 }, alice())).unwrap();
        broker.request_deletion(&deleted).unwrap();
        broker.sweep(OrderState::Closed).unwrap();
        (spawning, open, deleted)
    };

    let broker = OrderBroker::new(config_in(&dir)).unwrap();

    assert_eq!(broker.active_order_count(), 2);
    assert_eq!(broker.orders_in_state(OrderState::Spawning), vec![spawning.clone()]);
    assert_eq!(broker.orders_in_state(OrderState::Open), vec![open]);
    assert!(broker.get_order(&deleted).is_none());
    assert!(broker.registry().unbucketed().is_empty());

    let recovered = broker.get_order(&spawning).unwrap();
    assert!(recovered.instance_id().is_some());
    assert_eq!(recovered.requester.user_id.as_str(), "alice");
}

#[test]
fn deactivated_orders_stay_on_disk_but_are_not_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let order_id = {
        let broker = OrderBroker::new(config_in(&dir)).unwrap();
        let order_id = broker.activate_new_order(broker.local_order(ResourceSpec::Volume { size_gb: 1 }, alice())).unwrap();
        broker.request_deletion(&order_id).unwrap();
        broker.sweep(OrderState::Closed).unwrap();
        order_id
    };

    let storage = JsonFileOrderStorage::open(dir.path().join("orders.json")).unwrap();
    assert!(storage.load_active().unwrap().iter().all(|order| order.id() != &order_id));

    let raw = std::fs::read_to_string(dir.path().join("orders.json")).unwrap();
    assert!(raw.contains(order_id.as_str()));
    assert!(raw.contains("DEACTIVATED"));
}
