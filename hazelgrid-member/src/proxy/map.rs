//! Distributed map proxy with partition routing.

use std::sync::Arc;

use tracing::{debug, warn};

use hazelgrid_core::{Data, GridError, Result};

use super::operation::{MapOperation, OperationOutcome};
use crate::node::NodeEngine;

/// A handle on one named map.
///
/// Every operation is routed by its key: the proxy resolves the partition
/// owner from the current partition table and either runs the operation on
/// local storage or forwards it to the owner and waits for the answer.
#[derive(Debug)]
pub struct MapProxy {
    name: String,
    engine: Arc<NodeEngine>,
}

impl MapProxy {
    pub(crate) fn new(name: impl Into<String>, engine: Arc<NodeEngine>) -> Self {
        Self {
            name: name.into(),
            engine,
        }
    }

    /// Returns the name of this map.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Retrieves the value associated with `key`.
    ///
    /// Returns `None` if the key has no mapping.
    pub async fn get(&self, key: &Data) -> Result<Option<Data>> {
        self.invoke(MapOperation::Get { key: key.clone() })
            .await
            .map(OperationOutcome::into_value)
    }

    /// Associates `value` with `key`, returning the previous value.
    pub async fn put(&self, key: Data, value: Data) -> Result<Option<Data>> {
        self.invoke(MapOperation::Put { key, value })
            .await
            .map(OperationOutcome::into_value)
    }

    /// Removes the mapping for `key`, returning the value it held.
    pub async fn remove(&self, key: &Data) -> Result<Option<Data>> {
        self.invoke(MapOperation::Remove { key: key.clone() })
            .await
            .map(OperationOutcome::into_value)
    }

    /// Returns `true` if `key` has a mapping.
    pub async fn contains_key(&self, key: &Data) -> Result<bool> {
        self.invoke(MapOperation::ContainsKey { key: key.clone() })
            .await
            .map(OperationOutcome::into_flag)
    }

    /// Routes `operation` to the owner of its key's partition and returns the outcome.
    ///
    /// The partition table is read once; an ownership change that lands while
    /// the call is in flight is not observed. Fails with
    /// [`GridError::PartitionUnavailable`] when the partition has no owner and
    /// with [`GridError::RemoteCallTimeout`] when the owner does not answer
    /// within the invocation timeout.
    pub async fn invoke(&self, operation: MapOperation) -> Result<OperationOutcome> {
        let table = self.engine.partitions().snapshot();
        let partition_id = operation.key().partition_id(table.partition_count());
        let owner = table
            .owner_of(partition_id)
            .ok_or(GridError::PartitionUnavailable(partition_id))?;

        if owner == self.engine.address() {
            debug!(map = %self.name, partition_id, operation = %operation, "executing locally");
            let store = self.engine.storage().record_store(&self.name);
            return operation.execute(&store, partition_id);
        }

        let serialization = self.engine.serialization();
        let request = operation.to_request(&self.name, partition_id, serialization)?;
        let timeout = self.engine.config().invocation_timeout();
        debug!(
            map = %self.name,
            partition_id,
            operation = %operation,
            owner = %owner,
            "forwarding to partition owner"
        );

        let response = tokio::time::timeout(
            timeout,
            self.engine.transport().invoke(owner, request),
        )
        .await
        .map_err(|_| {
            warn!(map = %self.name, partition_id, owner = %owner, "forwarded call timed out");
            GridError::RemoteCallTimeout(format!(
                "{} on map '{}' to {} exceeded {:?}",
                operation.name(),
                self.name,
                owner,
                timeout
            ))
        })??;

        let value = response.into_result()?;
        operation.decode_outcome(value.as_ref(), serialization)
    }
}
