mod common;

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use common::{alice, compute_spec};
use resource_broker::domain::broker::{BrokerParts, OrderBroker};
use resource_broker::domain::cloud::connectivity::AlwaysReachable;
use resource_broker::domain::cloud::credential::ConfiguredCredentialMapper;
use resource_broker::domain::cloud::emulated::EmulatedCloudPlugin;
use resource_broker::domain::cloud::plugin::{CloudPlugin, CloudResult, DispatchRequest};
use resource_broker::domain::cloud::plugin_registry::PluginRegistry;
use resource_broker::domain::config::{BrokerConfig, ProcessorTimings};
use resource_broker::domain::connector::remote_connector::NoFederation;
use resource_broker::domain::order::identity::CloudCredential;
use resource_broker::domain::order::instance::{InstanceStatusMapper, RawInstance};
use resource_broker::domain::order::order::Order;
use resource_broker::domain::order::order_state::OrderState;
use resource_broker::domain::order::resource::ResourceSpec;
use resource_broker::domain::storage::in_memory::InMemoryOrderStorage;
use resource_broker::domain::utils::id::{CloudName, InstanceId, OrderId};

struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// Emulated cloud whose next `request_instance` can be held open.
struct GatedCloud {
    inner: EmulatedCloudPlugin,
    gate: Mutex<Option<Gate>>,
}

impl GatedCloud {
    fn new() -> Self {
        GatedCloud { inner: EmulatedCloudPlugin::new(CloudName::new("default"), 1), gate: Mutex::new(None) }
    }

    /// Returns the receiver signalled once the request is in flight and the
    /// sender that lets it finish.
    fn hold_next_request(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        *self.gate.lock().unwrap() = Some(Gate { entered: entered_tx, release: release_rx });
        (entered_rx, release_tx)
    }
}

impl CloudPlugin for GatedCloud {
    fn request_instance(&self, request: &DispatchRequest<'_>, credential: &CloudCredential) -> CloudResult<InstanceId> {
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.send(()).unwrap();
            gate.release.recv().unwrap();
        }
        self.inner.request_instance(request, credential)
    }

    fn get_instance(&self, order: &Order, instance_id: &InstanceId, credential: &CloudCredential) -> CloudResult<RawInstance> {
        self.inner.get_instance(order, instance_id, credential)
    }

    fn delete_instance(&self, order: &Order, instance_id: &InstanceId, credential: &CloudCredential) -> CloudResult<()> {
        self.inner.delete_instance(order, instance_id, credential)
    }

    fn status_mapper(&self) -> &dyn InstanceStatusMapper {
        self.inner.status_mapper()
    }
}

fn broker_on(cloud: Arc<GatedCloud>, processors: ProcessorTimings) -> Arc<OrderBroker> {
    let mut config = BrokerConfig::new("site-a");
    config.processors = processors;

    let mut plugins = PluginRegistry::new();
    plugins.register_all(CloudName::new("default"), cloud as Arc<dyn CloudPlugin>);

    let parts = BrokerParts {
        plugins,
        storage: Arc::new(InMemoryOrderStorage::new()),
        remote: Arc::new(NoFederation),
        connectivity: Arc::new(AlwaysReachable),
        credentials: Arc::new(ConfiguredCredentialMapper::new(config.credentials())),
    };
    Arc::new(OrderBroker::with_parts(config, parts).unwrap())
}

fn fast_timings() -> ProcessorTimings {
    ProcessorTimings {
        open_sleep: Duration::from_millis(1),
        spawning_sleep: Duration::from_millis(1),
        fulfilled_sleep: Duration::from_millis(1),
        closed_sleep: Duration::from_millis(1),
    }
}

fn buckets_holding(broker: &OrderBroker, order_id: &OrderId) -> Vec<OrderState> {
    OrderState::BUCKET_STATES
        .into_iter()
        .filter(|state| broker.orders_in_state(*state).contains(order_id))
        .collect()
}

#[test]
fn deletion_waits_for_an_in_flight_request() {
    let cloud = Arc::new(GatedCloud::new());
    let broker = broker_on(cloud.clone(), ProcessorTimings::default());
    let order_id = broker.activate_new_order(broker.local_order(compute_spec(), alice())).unwrap();

    let (entered, release) = cloud.hold_next_request();
    let sweeper = {
        let broker = broker.clone();
        thread::spawn(move || broker.sweep(OrderState::Open).unwrap())
    };
    entered.recv().unwrap();

    let (deleted_tx, deleted_rx) = mpsc::channel();
    let deleter = {
        let broker = broker.clone();
        let order_id = order_id.clone();
        thread::spawn(move || deleted_tx.send(broker.request_deletion(&order_id)).unwrap())
    };

    // The Open processor holds the order lock while the cloud call runs.
    assert!(matches!(deleted_rx.recv_timeout(Duration::from_millis(200)), Err(RecvTimeoutError::Timeout)));

    release.send(()).unwrap();
    sweeper.join().unwrap();
    deleted_rx.recv().unwrap().unwrap();
    deleter.join().unwrap();

    let order = broker.get_order(&order_id).unwrap();
    assert_eq!(order.state(), OrderState::Closed);
    let instance_id = order.instance_id().cloned().unwrap();
    assert!(cloud.inner.has_instance(&instance_id));
    assert_eq!(buckets_holding(&broker, &order_id), vec![OrderState::Closed]);
    assert!(broker.registry().unbucketed().is_empty());

    broker.sweep(OrderState::Closed).unwrap();
    assert!(broker.get_order(&order_id).is_none());
    assert!(!cloud.inner.has_instance(&instance_id));
    assert_eq!(cloud.inner.delete_calls(), 1);
}

#[test]
fn deletions_racing_running_processors_leave_no_instance_behind() {
    let cloud = Arc::new(GatedCloud::new());
    let broker = broker_on(cloud.clone(), fast_timings());

    let order_ids: Vec<_> = (0..20)
        .map(|i| {
            let spec = if i % 2 == 0 { compute_spec() } else { ResourceSpec::Volume { size_gb: 1 + i } };
            broker.activate_new_order(broker.local_order(spec, alice())).unwrap()
        })
        .collect();

    broker.start_processors().unwrap();
    for (i, order_id) in order_ids.iter().enumerate() {
        if i % 4 == 0 {
            thread::sleep(Duration::from_millis(2));
        }
        broker.request_deletion(order_id).unwrap();
    }

    let start = Instant::now();
    while broker.active_order_count() > 0 && start.elapsed() < Duration::from_secs(10) {
        thread::sleep(Duration::from_millis(10));
    }
    broker.stop_processors();

    assert_eq!(broker.active_order_count(), 0);
    assert_eq!(cloud.inner.instance_count(), 0);
}
