//! The member node: its shared context and the request entry point.

use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

use tracing::{debug, info};

use hazelgrid_core::{GridError, Protocol, Result, SerializationService};

use crate::cluster::{PartitionTable, PartitionTableProvider, SharedPartitionTable};
use crate::config::MemberConfig;
use crate::connection::{RemoteTransport, TcpTransport};
use crate::handler::CommandDispatcher;
use crate::proxy::{MapProxy, ProxyRegistry};
use crate::storage::MapStorage;

/// Everything a component of this member needs, passed explicitly.
pub struct NodeEngine {
    config: MemberConfig,
    address: SocketAddr,
    serialization: Arc<SerializationService>,
    partitions: Arc<dyn PartitionTableProvider>,
    storage: MapStorage,
    transport: Arc<dyn RemoteTransport>,
}

impl NodeEngine {
    /// Returns the member configuration.
    pub fn config(&self) -> &MemberConfig {
        &self.config
    }

    /// Returns this member's address, its identity in the partition table.
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    /// Returns the serialization service.
    pub fn serialization(&self) -> &Arc<SerializationService> {
        &self.serialization
    }

    /// Returns the partition table provider.
    pub fn partitions(&self) -> &Arc<dyn PartitionTableProvider> {
        &self.partitions
    }

    /// Returns local map storage.
    pub fn storage(&self) -> &MapStorage {
        &self.storage
    }

    /// Returns the transport used to reach other members.
    pub fn transport(&self) -> &Arc<dyn RemoteTransport> {
        &self.transport
    }
}

impl fmt::Debug for NodeEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeEngine")
            .field("address", &self.address)
            .field("cluster_name", &self.config.cluster_name())
            .field("partition_count", &self.config.partition_count())
            .finish_non_exhaustive()
    }
}

/// A member of the grid.
#[derive(Debug)]
pub struct Node {
    engine: Arc<NodeEngine>,
    proxies: ProxyRegistry,
    dispatcher: CommandDispatcher,
}

impl Node {
    /// Returns a builder for a node configured by `config`.
    pub fn builder(config: MemberConfig) -> NodeBuilder {
        NodeBuilder::new(config)
    }

    /// Returns the shared node context.
    pub fn engine(&self) -> &Arc<NodeEngine> {
        &self.engine
    }

    /// Returns this member's address.
    pub fn address(&self) -> SocketAddr {
        self.engine.address()
    }

    /// Returns the member configuration.
    pub fn config(&self) -> &MemberConfig {
        self.engine.config()
    }

    /// Returns the serialization service.
    pub fn serialization(&self) -> &Arc<SerializationService> {
        self.engine.serialization()
    }

    /// Returns the partition table provider.
    pub fn partitions(&self) -> &Arc<dyn PartitionTableProvider> {
        self.engine.partitions()
    }

    /// Returns local map storage.
    pub fn storage(&self) -> &MapStorage {
        self.engine.storage()
    }

    /// Returns the proxy registry.
    pub fn proxies(&self) -> &ProxyRegistry {
        &self.proxies
    }

    /// Returns the proxy for the map called `name`.
    pub fn get_map(&self, name: &str) -> Arc<MapProxy> {
        self.proxies.get_or_create(name)
    }

    /// Returns the command dispatcher.
    pub fn dispatcher(&self) -> &CommandDispatcher {
        &self.dispatcher
    }

    /// Handles one request and returns its response.
    ///
    /// Never fails: every error is reported as a failure response.
    pub async fn process(&self, request: Protocol) -> Protocol {
        debug!(
            command = %request.command(),
            correlation_id = request.correlation_id(),
            "processing request"
        );
        self.dispatcher.dispatch(self, &request).await
    }
}

/// Builder for [`Node`].
///
/// Every collaborator has a default derived from the configuration: a
/// serialization service with the built-in serializers in the configured
/// byte order, a round-robin partition table over the configured members,
/// the TCP transport and the default command handlers.
pub struct NodeBuilder {
    config: MemberConfig,
    serialization: Option<Arc<SerializationService>>,
    partitions: Option<Arc<dyn PartitionTableProvider>>,
    transport: Option<Arc<dyn RemoteTransport>>,
    dispatcher: Option<CommandDispatcher>,
}

impl NodeBuilder {
    /// Creates a builder with every collaborator defaulted.
    pub fn new(config: MemberConfig) -> Self {
        Self {
            config,
            serialization: None,
            partitions: None,
            transport: None,
            dispatcher: None,
        }
    }

    /// Uses `service`, which must use the configured byte order.
    pub fn serialization(mut self, service: Arc<SerializationService>) -> Self {
        self.serialization = Some(service);
        self
    }

    /// Uses `provider` as the source of partition tables.
    pub fn partition_provider(mut self, provider: Arc<dyn PartitionTableProvider>) -> Self {
        self.partitions = Some(provider);
        self
    }

    /// Starts from a fixed table, published through a [`SharedPartitionTable`].
    pub fn partition_table(self, table: PartitionTable) -> Self {
        self.partition_provider(Arc::new(SharedPartitionTable::new(table)))
    }

    /// Uses `transport` to reach other members.
    pub fn transport(mut self, transport: Arc<dyn RemoteTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Uses `dispatcher` instead of the default handlers.
    pub fn dispatcher(mut self, dispatcher: CommandDispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    /// Builds the node.
    ///
    /// Fails with [`GridError::Configuration`] when the serialization
    /// service's byte order or the partition table's size disagrees with the
    /// configuration.
    pub fn build(self) -> Result<Node> {
        let config = self.config;

        let serialization = match self.serialization {
            Some(service) => service,
            None => Arc::new(
                SerializationService::builder()
                    .byte_order(config.byte_order())
                    .with_builtin_serializers()?
                    .build(),
            ),
        };
        if serialization.byte_order() != config.byte_order() {
            return Err(GridError::Configuration(format!(
                "serialization service uses {} byte order but the member is configured for {}",
                serialization.byte_order(),
                config.byte_order()
            )));
        }

        let partitions = self.partitions.unwrap_or_else(|| {
            Arc::new(SharedPartitionTable::new(PartitionTable::round_robin(
                config.partition_count(),
                config.members(),
            )))
        });
        let partition_count = partitions.snapshot().partition_count();
        if partition_count != config.partition_count() {
            return Err(GridError::Configuration(format!(
                "partition table has {} partitions but the member is configured for {}",
                partition_count,
                config.partition_count()
            )));
        }

        let transport = self.transport.unwrap_or_else(|| {
            Arc::new(TcpTransport::new(
                config.connect_timeout(),
                config.max_frame_size(),
            ))
        });

        let address = config.listen_address();
        let engine = Arc::new(NodeEngine {
            storage: MapStorage::new(config.partition_count()),
            address,
            serialization,
            partitions,
            transport,
            config,
        });

        let owned = engine.partitions().snapshot().partitions_owned_by(address).len();
        info!(
            address = %address,
            cluster = %engine.config().cluster_name(),
            partitions = partition_count,
            owned,
            "member node created"
        );

        Ok(Node {
            proxies: ProxyRegistry::new(Arc::clone(&engine)),
            dispatcher: self.dispatcher.unwrap_or_default(),
            engine,
        })
    }
}

impl fmt::Debug for NodeBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeBuilder")
            .field("config", &self.config)
            .field("dispatcher", &self.dispatcher)
            .finish_non_exhaustive()
    }
}
