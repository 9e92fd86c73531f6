//! Member data plane for the hazelgrid data grid.
//!
//! A member stores the map partitions it owns and answers requests for all
//! others by forwarding them to the owning member. Requests arrive as
//! [`Protocol`](hazelgrid_core::Protocol) messages over TCP; each one is
//! dispatched to a [`CommandHandler`] by command name.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use hazelgrid_member::{MemberConfig, MemberServer, Node};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = MemberConfig::builder()
//!         .listen_address("10.0.0.1:5701".parse()?)
//!         .add_member("10.0.0.2:5701".parse()?)
//!         .build()?;
//!
//!     let server = MemberServer::bind(config.listen_address()).await?;
//!     let node = Arc::new(Node::builder(config).build()?);
//!     server.run(node, async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await?;
//!     Ok(())
//! }
//! ```
//!
//! # Request Routing
//!
//! | Command | Arguments | Buffers | Response value |
//! |---------|-----------|---------|----------------|
//! | `get` | map name | key | stored value, or none |
//! | `put` | map name | key, value | previous value, or none |
//! | `remove` | map name | key | removed value, or none |
//! | `containsKey` | map name | key | one byte, `0` or `1` |
//! | `ping` | | | `PONG` |
//! | `internal.map` | map name, operation, partition id | key (and value) in `Data` framing | operation result |
//!
//! A key is routed by the partition of its payload hash. The [`MapProxy`]
//! reads one [`PartitionTable`] snapshot per call; when another member owns
//! the partition the operation is forwarded as `internal.map` through the
//! node's [`RemoteTransport`] and bounded by the invocation timeout.
//!
//! # Configuration
//!
//! [`MemberConfig::from_env`] reads the `HAZELGRID_*` environment variables;
//! with the `config-file` feature, `MemberConfig::from_toml` loads a TOML file.

#![warn(missing_docs)]

pub mod cluster;
pub mod config;
#[cfg(feature = "config-file")]
pub mod config_file;
pub mod connection;
pub mod handler;
pub mod node;
pub mod proxy;
pub mod server;
pub mod storage;

pub use cluster::{MigrationEvent, PartitionTable, PartitionTableProvider, SharedPartitionTable};
pub use config::{ConfigError, MemberConfig, MemberConfigBuilder};
#[cfg(feature = "config-file")]
pub use config_file::FileConfig;
pub use connection::{InProcessTransport, RemoteTransport, TcpTransport};
pub use handler::{CommandDispatcher, CommandDispatcherBuilder, CommandHandler};
pub use hazelgrid_core as core;
pub use node::{Node, NodeBuilder, NodeEngine};
pub use proxy::{MapOperation, MapProxy, OperationOutcome, ProxyRegistry};
pub use server::MemberServer;
pub use storage::{MapStorage, RecordStore};
