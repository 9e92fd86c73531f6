//! Transport between members living in the same process.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock, Weak};

use async_trait::async_trait;
use tracing::trace;

use hazelgrid_core::{GridError, Protocol, Result};

use super::RemoteTransport;
use crate::node::Node;

/// Routes requests directly to [`Node`]s registered under their address.
///
/// Registrations hold weak references, so a dropped node simply becomes
/// unreachable.
#[derive(Debug, Default)]
pub struct InProcessTransport {
    nodes: RwLock<HashMap<SocketAddr, Weak<Node>>>,
}

impl InProcessTransport {
    /// Creates a transport with no registered nodes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `node` reachable at its member address.
    pub fn register(&self, node: &Arc<Node>) {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        nodes.insert(node.address(), Arc::downgrade(node));
    }

    /// Removes the node registered at `address`.
    pub fn unregister(&self, address: SocketAddr) {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        nodes.remove(&address);
    }

    fn lookup(&self, address: SocketAddr) -> Option<Arc<Node>> {
        let nodes = self.nodes.read().unwrap_or_else(PoisonError::into_inner);
        nodes.get(&address).and_then(Weak::upgrade)
    }
}

#[async_trait]
impl RemoteTransport for InProcessTransport {
    async fn invoke(&self, target: SocketAddr, request: Protocol) -> Result<Protocol> {
        let node = self.lookup(target).ok_or_else(|| {
            GridError::Connection(format!("no member reachable at {}", target))
        })?;
        trace!(member = %target, command = request.command(), "delivering in-process request");
        Ok(node.process(request).await)
    }
}
