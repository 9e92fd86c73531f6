//! Partition ownership snapshots and the shared table that publishes them.

use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::broadcast;
use tracing::debug;

use hazelgrid_core::{GridError, Result};

const MIGRATION_CHANNEL_CAPACITY: usize = 256;

/// An immutable view of which member owns each partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartitionTable {
    version: u64,
    owners: Vec<Option<SocketAddr>>,
}

impl PartitionTable {
    /// Creates a table of `partition_count` partitions with no owners.
    pub fn unassigned(partition_count: i32) -> Self {
        Self {
            version: 0,
            owners: vec![None; partition_count.max(0) as usize],
        }
    }

    /// Creates a table from an explicit owner per partition.
    pub fn from_owners(owners: Vec<Option<SocketAddr>>) -> Self {
        Self { version: 0, owners }
    }

    /// Assigns partitions to `members` in turn: partition `p` is owned by
    /// `members[p % members.len()]`.
    ///
    /// With no members every partition is left unassigned.
    pub fn round_robin(partition_count: i32, members: &[SocketAddr]) -> Self {
        if members.is_empty() {
            return Self::unassigned(partition_count);
        }
        let owners = (0..partition_count.max(0) as usize)
            .map(|p| Some(members[p % members.len()]))
            .collect();
        Self::from_owners(owners)
    }

    /// Returns the version of this snapshot.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the number of partitions.
    pub fn partition_count(&self) -> i32 {
        self.owners.len() as i32
    }

    /// Returns the owner of `partition_id`, or `None` while it is unassigned
    /// or when the id is out of range.
    pub fn owner_of(&self, partition_id: i32) -> Option<SocketAddr> {
        usize::try_from(partition_id)
            .ok()
            .and_then(|index| self.owners.get(index).copied().flatten())
    }

    /// Returns the ids of the partitions owned by `address`.
    pub fn partitions_owned_by(&self, address: SocketAddr) -> Vec<i32> {
        self.owners
            .iter()
            .enumerate()
            .filter(|(_, owner)| **owner == Some(address))
            .map(|(id, _)| id as i32)
            .collect()
    }

    /// Returns a copy of this table with `partition_id` reassigned and the
    /// version bumped.
    pub fn with_owner(&self, partition_id: i32, owner: Option<SocketAddr>) -> Result<Self> {
        let index = usize::try_from(partition_id)
            .ok()
            .filter(|index| *index < self.owners.len())
            .ok_or(GridError::PartitionUnavailable(partition_id))?;
        let mut owners = self.owners.clone();
        owners[index] = owner;
        Ok(Self {
            version: self.version + 1,
            owners,
        })
    }
}

/// Source of the partition table consulted when routing an operation.
///
/// Implementations must hand out complete snapshots: a caller never observes
/// a table that is halfway through an update.
pub trait PartitionTableProvider: Send + Sync {
    /// Returns the current snapshot.
    fn snapshot(&self) -> Arc<PartitionTable>;
}

impl PartitionTableProvider for PartitionTable {
    fn snapshot(&self) -> Arc<PartitionTable> {
        Arc::new(self.clone())
    }
}

/// An ownership change of a single partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationEvent {
    /// The partition that changed hands.
    pub partition_id: i32,
    /// The previous owner, if any.
    pub old_owner: Option<SocketAddr>,
    /// The new owner, if any.
    pub new_owner: Option<SocketAddr>,
}

impl fmt::Display for MigrationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn owner(addr: &Option<SocketAddr>) -> String {
            addr.map_or_else(|| "unassigned".to_string(), |a| a.to_string())
        }
        write!(
            f,
            "MigrationEvent[partition={}, from={}, to={}]",
            self.partition_id,
            owner(&self.old_owner),
            owner(&self.new_owner)
        )
    }
}

/// A partition table that is swapped as a whole whenever ownership changes.
#[derive(Debug)]
pub struct SharedPartitionTable {
    current: RwLock<Arc<PartitionTable>>,
    migration_sender: broadcast::Sender<MigrationEvent>,
}

impl SharedPartitionTable {
    /// Creates a shared table starting at `initial`.
    pub fn new(initial: PartitionTable) -> Self {
        let (migration_sender, _) = broadcast::channel(MIGRATION_CHANNEL_CAPACITY);
        Self {
            current: RwLock::new(Arc::new(initial)),
            migration_sender,
        }
    }

    /// Replaces the table, emitting one event per partition whose owner changed.
    ///
    /// The published snapshot's version is one past the replaced one. Fails
    /// with [`GridError::Configuration`] when `table` has a different
    /// partition count, leaving the current table in place.
    pub fn publish(&self, table: PartitionTable) -> Result<()> {
        let (previous, next) = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            if table.owners.len() != current.owners.len() {
                return Err(GridError::Configuration(format!(
                    "partition table has {} partitions, expected {}",
                    table.owners.len(),
                    current.owners.len()
                )));
            }
            let previous = Arc::clone(&current);
            let next = Arc::new(PartitionTable {
                version: previous.version + 1,
                owners: table.owners,
            });
            *current = Arc::clone(&next);
            (previous, next)
        };
        debug!(version = next.version(), "published partition table");
        self.emit_changes(&previous, &next);
        Ok(())
    }

    /// Reassigns a single partition.
    pub fn update_owner(&self, partition_id: i32, owner: Option<SocketAddr>) -> Result<()> {
        let (previous, next) = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let previous = Arc::clone(&current);
            let next = Arc::new(previous.with_owner(partition_id, owner)?);
            *current = Arc::clone(&next);
            (previous, next)
        };
        debug!(partition_id, version = next.version(), "partition owner updated");
        self.emit_changes(&previous, &next);
        Ok(())
    }

    /// Returns a receiver of ownership changes published after this call.
    pub fn subscribe_migration(&self) -> broadcast::Receiver<MigrationEvent> {
        self.migration_sender.subscribe()
    }

    fn emit_changes(&self, previous: &PartitionTable, next: &PartitionTable) {
        let count = previous.owners.len().max(next.owners.len());
        for index in 0..count {
            let old_owner = previous.owners.get(index).copied().flatten();
            let new_owner = next.owners.get(index).copied().flatten();
            if old_owner != new_owner {
                // No subscribers is not an error.
                let _ = self.migration_sender.send(MigrationEvent {
                    partition_id: index as i32,
                    old_owner,
                    new_owner,
                });
            }
        }
    }
}

impl PartitionTableProvider for SharedPartitionTable {
    fn snapshot(&self) -> Arc<PartitionTable> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }
}
