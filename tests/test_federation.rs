mod common;

use std::sync::Arc;
use std::time::Duration;

use common::alice;
use resource_broker::domain::broker::OrderBroker;
use resource_broker::domain::config::BrokerConfig;
use resource_broker::domain::federation::remote_facade::RemoteFacade;
use resource_broker::domain::federation::server::FederationServer;
use resource_broker::domain::order::order::Order;
use resource_broker::domain::order::order_state::OrderState;
use resource_broker::domain::order::resource::ResourceSpec;
use resource_broker::domain::utils::id::{CloudName, InstanceId, MemberId, OrderId};
use tokio::runtime::Runtime;
use tokio::sync::Notify;

/// Provider member served over loopback TCP from its own runtime.
struct ProviderSite {
    broker: Arc<OrderBroker>,
    address: std::net::SocketAddr,
    shutdown: Arc<Notify>,
    runtime: Runtime,
}

impl ProviderSite {
    fn start(member: &str) -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread().worker_threads(2).enable_all().build().unwrap();
        let broker = Arc::new(OrderBroker::new(BrokerConfig::new(member)).unwrap());
        let facade = Arc::new(RemoteFacade::new(broker.clone()));

        let server = runtime.block_on(FederationServer::bind("127.0.0.1:0".parse().unwrap(), facade)).unwrap();
        let address = server.local_addr().unwrap();
        let shutdown = server.shutdown_handle();
        runtime.spawn(server.run());

        ProviderSite { broker, address, shutdown, runtime }
    }

    fn stop(self) {
        self.shutdown.notify_one();
        self.runtime.shutdown_timeout(Duration::from_secs(1));
    }
}

fn requester_site(member: &str, provider: &ProviderSite, provider_id: &str) -> OrderBroker {
    let mut config = BrokerConfig::new(member);
    config.federation.members.insert(MemberId::new(provider_id), provider.address);
    config.federation.request_timeout = Duration::from_secs(2);
    OrderBroker::new(config).unwrap()
}

fn remote_volume(order_id: &str) -> Order {
    Order::new(
        OrderId::new(order_id),
        ResourceSpec::Volume { size_gb: 20 },
        MemberId::new("site-a"),
        MemberId::new("site-b"),
        CloudName::new("default"),
        alice(),
    )
}

#[test]
fn remote_order_lifecycle_over_loopback() {
    let provider = ProviderSite::start("site-b");
    let requester = requester_site("site-a", &provider, "site-b");

    let order_id = requester.activate_new_order(remote_volume("shared-volume")).unwrap();

    // The provider acknowledges with the shared order id.
    requester.sweep(OrderState::Open).unwrap();
    let local_view = requester.get_order(&order_id).unwrap();
    assert_eq!(local_view.state(), OrderState::Spawning);
    assert_eq!(local_view.instance_id(), Some(&InstanceId::new("shared-volume")));
    assert_eq!(provider.broker.get_order(&order_id).unwrap().state(), OrderState::Open);

    // Still provisioning on the provider side.
    requester.sweep(OrderState::Spawning).unwrap();
    assert_eq!(requester.get_order(&order_id).unwrap().state(), OrderState::Spawning);

    provider.broker.sweep(OrderState::Open).unwrap();
    provider.broker.sweep(OrderState::Spawning).unwrap();
    assert_eq!(provider.broker.get_order(&order_id).unwrap().state(), OrderState::Fulfilled);

    requester.sweep(OrderState::Spawning).unwrap();
    assert_eq!(requester.get_order(&order_id).unwrap().state(), OrderState::Fulfilled);

    // Remote orders are monitored by their provider, not here.
    requester.sweep(OrderState::Fulfilled).unwrap();
    assert_eq!(requester.get_order(&order_id).unwrap().state(), OrderState::Fulfilled);

    requester.request_deletion(&order_id).unwrap();
    requester.sweep(OrderState::Closed).unwrap();
    assert!(requester.get_order(&order_id).is_none());
    assert_eq!(provider.broker.get_order(&order_id).unwrap().state(), OrderState::Closed);

    provider.broker.sweep(OrderState::Closed).unwrap();
    assert_eq!(provider.broker.active_order_count(), 0);

    drop(requester);
    provider.stop();
}

#[test]
fn forwarded_create_is_idempotent() {
    let provider = ProviderSite::start("site-b");
    let requester = requester_site("site-a", &provider, "site-b");

    let order_id = requester.activate_new_order(remote_volume("retried-volume")).unwrap();
    requester.sweep(OrderState::Open).unwrap();

    // A second requester broker forwarding the same order, as after a lost answer.
    let retry = requester_site("site-a", &provider, "site-b");
    retry.activate_new_order(remote_volume("retried-volume")).unwrap();
    retry.sweep(OrderState::Open).unwrap();

    assert_eq!(retry.get_order(&order_id).unwrap().state(), OrderState::Spawning);
    assert_eq!(provider.broker.active_order_count(), 1);

    drop(retry);
    drop(requester);
    provider.stop();
}

#[test]
fn stopped_provider_leaves_orders_open() {
    let provider = ProviderSite::start("site-b");
    let requester = requester_site("site-a", &provider, "site-b");
    provider.stop();

    let order_id = requester.activate_new_order(remote_volume("stranded-volume")).unwrap();
    requester.sweep(OrderState::Open).unwrap();

    let order = requester.get_order(&order_id).unwrap();
    assert_eq!(order.state(), OrderState::Open);
    assert!(order.fault_message.is_none());
}
