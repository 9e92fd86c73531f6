//! Cluster-wide partition ownership.

mod partition_table;

pub use partition_table::{
    MigrationEvent, PartitionTable, PartitionTableProvider, SharedPartitionTable,
};
