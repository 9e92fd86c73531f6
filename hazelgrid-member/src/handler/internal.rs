//! Execution of map operations forwarded by other members.

use async_trait::async_trait;
use bytes::Bytes;
use tracing::debug;

use hazelgrid_core::{GridError, Protocol, Result};

use super::CommandHandler;
use crate::node::Node;
use crate::proxy::MapOperation;

/// `internal.map`: runs a forwarded operation on local storage.
///
/// The operation is refused with [`GridError::PartitionUnavailable`] unless
/// this member owns the target partition in its current table, so a request
/// routed with a stale table is retried instead of served from the wrong
/// member.
#[derive(Debug, Clone, Copy, Default)]
pub struct InternalMapHandler;

#[async_trait]
impl CommandHandler for InternalMapHandler {
    async fn handle(&self, node: &Node, request: &Protocol) -> Result<Option<Bytes>> {
        let serialization = node.serialization();
        let forwarded = MapOperation::from_request(request, serialization)?;

        let table = node.partitions().snapshot();
        if table.owner_of(forwarded.partition_id) != Some(node.address()) {
            debug!(
                map = %forwarded.map,
                partition_id = forwarded.partition_id,
                "refusing forwarded operation for a partition owned elsewhere"
            );
            return Err(GridError::PartitionUnavailable(forwarded.partition_id));
        }

        let store = node.storage().record_store(&forwarded.map);
        let outcome = forwarded.operation.execute(&store, forwarded.partition_id)?;
        outcome.encode(serialization)
    }
}
