use std::sync::{Arc, Mutex};

use crate::api::order_dto::OrderDto;
use crate::domain::cloud::connectivity::{AlwaysReachable, ConnectivityChecker};
use crate::domain::cloud::credential::{ConfiguredCredentialMapper, CredentialMapper};
use crate::domain::cloud::plugin_registry::PluginRegistry;
use crate::domain::config::{BrokerConfig, StorageConfig};
use crate::domain::connector::connector_factory::ConnectorFactory;
use crate::domain::connector::local_connector::LocalConnector;
use crate::domain::connector::remote_connector::{NoFederation, RemoteConnector, RemoteTransport};
use crate::domain::federation::client::TcpFederationClient;
use crate::domain::order::identity::RequesterIdentity;
use crate::domain::order::order::Order;
use crate::domain::order::order_state::OrderState;
use crate::domain::order::resource::ResourceSpec;
use crate::domain::processor::closed_processor::ClosedProcessor;
use crate::domain::processor::fulfilled_processor::FulfilledProcessor;
use crate::domain::processor::open_processor::OpenProcessor;
use crate::domain::processor::processors_controller::ProcessorsController;
use crate::domain::processor::spawning_processor::SpawningProcessor;
use crate::domain::processor::{OrderProcessor, sweep_once};
use crate::domain::registry::order_registry::SharedOrderRegistry;
use crate::domain::registry::transitioner::OrderStateTransitioner;
use crate::domain::storage::OrderStorage;
use crate::domain::storage::in_memory::InMemoryOrderStorage;
use crate::domain::storage::json_file::JsonFileOrderStorage;
use crate::domain::utils::id::{MemberId, OrderId};
use crate::domain::utils::lock;
use crate::error::{Error, Result};

/// The collaborators a broker is wired from. [`BrokerParts::from_config`]
/// gives the stock set; any part can be swapped before building the broker.
pub struct BrokerParts {
    pub plugins: PluginRegistry,
    pub storage: Arc<dyn OrderStorage>,
    pub remote: Arc<dyn RemoteTransport>,
    pub connectivity: Arc<dyn ConnectivityChecker>,
    pub credentials: Arc<dyn CredentialMapper>,
}

impl BrokerParts {
    pub fn from_config(config: &BrokerConfig) -> Result<Self> {
        let plugins = PluginRegistry::from_config(&config.clouds)?;

        let storage: Arc<dyn OrderStorage> = match &config.storage {
            StorageConfig::Memory => Arc::new(InMemoryOrderStorage::new()),
            StorageConfig::JsonFile(path) => Arc::new(JsonFileOrderStorage::open(path)?),
        };

        let remote: Arc<dyn RemoteTransport> = if config.federation.members.is_empty() {
            Arc::new(NoFederation)
        } else {
            Arc::new(TcpFederationClient::new(
                config.local_member_id.clone(),
                config.federation.members.clone(),
                config.federation.request_timeout,
            )?)
        };

        Ok(BrokerParts {
            plugins,
            storage,
            remote,
            connectivity: Arc::new(AlwaysReachable),
            credentials: Arc::new(ConfiguredCredentialMapper::new(config.credentials())),
        })
    }
}

/// Entry point of the lifecycle engine for one federation member.
pub struct OrderBroker {
    config: BrokerConfig,
    registry: Arc<SharedOrderRegistry>,
    transitioner: Arc<OrderStateTransitioner>,
    connectors: Arc<ConnectorFactory>,
    open: Arc<OpenProcessor>,
    spawning: Arc<SpawningProcessor>,
    fulfilled: Arc<FulfilledProcessor>,
    closed: Arc<ClosedProcessor>,
    controller: Mutex<Option<ProcessorsController>>,
}

impl OrderBroker {
    pub fn new(config: BrokerConfig) -> Result<Self> {
        let parts = BrokerParts::from_config(&config)?;
        Self::with_parts(config, parts)
    }

    /// Builds the broker and recovers the orders found in `parts.storage`.
    pub fn with_parts(config: BrokerConfig, parts: BrokerParts) -> Result<Self> {
        let registry = Arc::new(SharedOrderRegistry::recover(parts.storage.as_ref())?);
        let transitioner = Arc::new(OrderStateTransitioner::new(registry.clone(), parts.storage));

        let local = Arc::new(LocalConnector::new(Arc::new(parts.plugins), parts.credentials, registry.clone()));
        let remote = Arc::new(RemoteConnector::new(parts.remote));
        let connectors = Arc::new(ConnectorFactory::new(config.local_member_id.clone(), local, remote));

        let open = Arc::new(OpenProcessor::new(transitioner.clone(), connectors.clone()));
        let spawning =
            Arc::new(SpawningProcessor::new(transitioner.clone(), connectors.clone(), parts.connectivity.clone()));
        let fulfilled = Arc::new(FulfilledProcessor::new(
            config.local_member_id.clone(),
            transitioner.clone(),
            connectors.clone(),
            parts.connectivity,
        ));
        let closed = Arc::new(ClosedProcessor::new(transitioner.clone(), connectors.clone()));

        log::info!(
            "Broker for member {} ready with {} recovered orders.",
            config.local_member_id,
            registry.active_count()
        );

        Ok(OrderBroker {
            config,
            registry,
            transitioner,
            connectors,
            open,
            spawning,
            fulfilled,
            closed,
            controller: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &BrokerConfig {
        &self.config
    }

    pub fn local_member(&self) -> &MemberId {
        &self.config.local_member_id
    }

    pub fn registry(&self) -> &Arc<SharedOrderRegistry> {
        &self.registry
    }

    pub(crate) fn connectors(&self) -> &Arc<ConnectorFactory> {
        &self.connectors
    }

    /// An order requested and served by this member on the default cloud.
    pub fn local_order(&self, spec: ResourceSpec, requester: RequesterIdentity) -> Order {
        Order::new(
            OrderId::generate(),
            spec,
            self.local_member().clone(),
            self.local_member().clone(),
            self.config.default_cloud.clone(),
            requester,
        )
    }

    pub fn order_from_dto(&self, dto: OrderDto) -> Result<Order> {
        Order::from_dto(dto, self.local_member(), &self.config.default_cloud)
    }

    /// Persists a new order and queues it in OPEN.
    pub fn activate_new_order(&self, order: Order) -> Result<OrderId> {
        let handle = self.transitioner.activate_new_order(order)?;
        log::info!("Order {} ({}) accepted.", handle.id(), handle.resource_type());
        Ok(handle.id().clone())
    }

    /// Marks an order for teardown by the Closed processor. Asking again for
    /// an order that is already CLOSED changes nothing.
    pub fn request_deletion(&self, order_id: &OrderId) -> Result<()> {
        let handle = self.registry.get(order_id).ok_or_else(|| Error::OrderNotFound(order_id.clone()))?;
        let mut order = handle.lock();

        match order.state() {
            OrderState::Closed => Ok(()),
            // Deactivated between the lookup and the lock.
            OrderState::Deactivated => Err(Error::OrderNotFound(order_id.clone())),
            _ => {
                self.transitioner.transition(&mut order, OrderState::Closed)?;
                log::info!("Order {} marked for deletion.", order_id);
                Ok(())
            }
        }
    }

    /// Point-in-time copy of an active order.
    pub fn get_order(&self, order_id: &OrderId) -> Option<Order> {
        self.registry.get(order_id).map(|handle| handle.snapshot())
    }

    pub fn orders_in_state(&self, state: OrderState) -> Vec<OrderId> {
        self.registry.order_ids_in(state)
    }

    pub fn active_order_count(&self) -> usize {
        self.registry.active_count()
    }

    /// Re-queues active orders a failed persistence left outside their bucket.
    pub fn reconcile_unbucketed(&self) -> Vec<OrderId> {
        self.registry.reconcile_unbucketed()
    }

    fn processor_for(&self, state: OrderState) -> Option<Arc<dyn OrderProcessor>> {
        match state {
            OrderState::Open => Some(self.open.clone() as Arc<dyn OrderProcessor>),
            OrderState::Spawning => Some(self.spawning.clone() as Arc<dyn OrderProcessor>),
            OrderState::Fulfilled => Some(self.fulfilled.clone() as Arc<dyn OrderProcessor>),
            OrderState::Closed => Some(self.closed.clone() as Arc<dyn OrderProcessor>),
            OrderState::Failed | OrderState::Deactivated => None,
        }
    }

    /// Runs one full pass of the processor owning `state` on the calling
    /// thread. FAILED has no processor, its orders wait for deletion.
    ///
    /// # Returns
    /// How many orders were visited.
    pub fn sweep(&self, state: OrderState) -> Result<usize> {
        match self.processor_for(state) {
            Some(processor) => sweep_once(processor.as_ref()),
            None => Ok(0),
        }
    }

    /// One pass of every processor, in lifecycle order.
    pub fn sweep_all(&self) -> Result<usize> {
        let mut visited = 0;
        for state in [OrderState::Open, OrderState::Spawning, OrderState::Fulfilled, OrderState::Closed] {
            visited += self.sweep(state)?;
        }
        Ok(visited)
    }

    /// Starts the four processor threads. Calling it while they run is a no-op.
    pub fn start_processors(&self) -> Result<()> {
        let mut controller = lock::lock(&self.controller);
        if controller.is_some() {
            return Ok(());
        }

        let timings = &self.config.processors;
        let processors = vec![
            (self.open.clone() as Arc<dyn OrderProcessor>, timings.open_sleep),
            (self.spawning.clone() as Arc<dyn OrderProcessor>, timings.spawning_sleep),
            (self.fulfilled.clone() as Arc<dyn OrderProcessor>, timings.fulfilled_sleep),
            (self.closed.clone() as Arc<dyn OrderProcessor>, timings.closed_sleep),
        ];
        *controller = Some(ProcessorsController::start(processors)?);
        Ok(())
    }

    pub fn stop_processors(&self) {
        if let Some(mut controller) = lock::lock(&self.controller).take() {
            controller.stop();
        }
    }
}

impl Drop for OrderBroker {
    fn drop(&mut self) {
        self.stop_processors();
    }
}
