//! Partitioned in-memory storage for map entries owned by this member.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use tracing::debug;

use hazelgrid_core::{Data, GridError, Result};

type Partition = RwLock<HashMap<Data, Data>>;

/// The entries of one map, split by partition.
#[derive(Debug)]
pub struct RecordStore {
    name: String,
    partitions: Vec<Partition>,
}

impl RecordStore {
    /// Creates an empty store with `partition_count` partitions.
    pub fn new(name: impl Into<String>, partition_count: i32) -> Self {
        let partitions = (0..partition_count.max(0))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self {
            name: name.into(),
            partitions,
        }
    }

    /// Returns the map name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, partition_id: i32, key: &Data) -> Result<Option<Data>> {
        let partition = self.partition(partition_id)?;
        let entries = partition.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn put(&self, partition_id: i32, key: Data, value: Data) -> Result<Option<Data>> {
        let partition = self.partition(partition_id)?;
        let mut entries = partition.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.insert(key, value))
    }

    /// Removes `key`, returning the value it held.
    pub fn remove(&self, partition_id: i32, key: &Data) -> Result<Option<Data>> {
        let partition = self.partition(partition_id)?;
        let mut entries = partition.write().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.remove(key))
    }

    /// Returns `true` if `key` is present.
    pub fn contains_key(&self, partition_id: i32, key: &Data) -> Result<bool> {
        let partition = self.partition(partition_id)?;
        let entries = partition.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.contains_key(key))
    }

    /// Returns the number of entries across all partitions.
    pub fn size(&self) -> usize {
        self.partitions
            .iter()
            .map(|p| p.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    /// Returns the number of entries in one partition.
    pub fn partition_size(&self, partition_id: i32) -> Result<usize> {
        let partition = self.partition(partition_id)?;
        let entries = partition.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.len())
    }

    fn partition(&self, partition_id: i32) -> Result<&Partition> {
        usize::try_from(partition_id)
            .ok()
            .and_then(|index| self.partitions.get(index))
            .ok_or(GridError::PartitionUnavailable(partition_id))
    }
}

/// All record stores of this member, keyed by map name.
#[derive(Debug)]
pub struct MapStorage {
    partition_count: i32,
    stores: RwLock<HashMap<String, Arc<RecordStore>>>,
}

impl MapStorage {
    /// Creates empty storage whose record stores have `partition_count` partitions.
    pub fn new(partition_count: i32) -> Self {
        Self {
            partition_count,
            stores: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the partition count used for new record stores.
    pub fn partition_count(&self) -> i32 {
        self.partition_count
    }

    /// Returns the record store for `name`, creating it on first use.
    pub fn record_store(&self, name: &str) -> Arc<RecordStore> {
        if let Some(store) = self.existing_record_store(name) {
            return store;
        }
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(stores.entry(name.to_string()).or_insert_with(|| {
            debug!(map = name, "creating record store");
            Arc::new(RecordStore::new(name, self.partition_count))
        }))
    }

    /// Returns the record store for `name` if one has been created.
    pub fn existing_record_store(&self, name: &str) -> Option<Arc<RecordStore>> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.get(name).cloned()
    }

    /// Returns the names of all maps with a record store.
    pub fn map_names(&self) -> Vec<String> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = stores.keys().cloned().collect();
        names.sort();
        names
    }
}
