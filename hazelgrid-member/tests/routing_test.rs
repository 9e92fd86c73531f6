//! Integration tests for partition routing between in-process members.

mod common;

use std::sync::Arc;
use std::time::Duration;

use hazelgrid_core::serialization::CONSTANT_TYPE_BYTE_ARRAY;
use hazelgrid_core::{Data, ErrorCode, GridError};
use hazelgrid_member::{
    Node, PartitionTable, PartitionTableProvider, SharedPartitionTable,
};

use crate::common::{
    addr, contains_key, get, key_in_partition, member_config, put, remove, unique_name,
    InProcessCluster, StalledTransport, MEMBER_A, MEMBER_B,
};

#[tokio::test]
async fn test_get_is_forwarded_to_owner() {
    let cluster = InProcessCluster::start();
    let map = unique_name("orders");
    let key = key_in_partition(1, 2);
    assert_eq!(cluster.table().owner_of(1), Some(addr(MEMBER_B)));

    // Stored on B, the owner of partition 1.
    let stored = cluster.b.process(put(&map, &key, b"from-b")).await;
    assert!(stored.is_success());

    // A does not own the partition and must not answer with a local miss.
    let response = cluster.a.process(get(&map, &key)).await;
    assert!(response.is_success());
    assert_eq!(response.value().unwrap().as_ref(), b"from-b");
    assert!(cluster.a.storage().existing_record_store(&map).is_none());
}

#[tokio::test]
async fn test_writes_through_non_owner_land_on_owner() {
    let cluster = InProcessCluster::start();
    let map = unique_name("orders");
    let remote_key = key_in_partition(1, 2);
    let local_key = key_in_partition(0, 2);

    assert!(cluster.a.process(put(&map, &remote_key, b"r")).await.is_success());
    assert!(cluster.a.process(put(&map, &local_key, b"l")).await.is_success());

    let a_store = cluster.a.storage().record_store(&map);
    let b_store = cluster.b.storage().record_store(&map);
    assert_eq!(a_store.partition_size(0).unwrap(), 1);
    assert_eq!(a_store.partition_size(1).unwrap(), 0);
    assert_eq!(b_store.partition_size(1).unwrap(), 1);
    assert_eq!(b_store.size(), 1);

    let from_b = cluster.b.process(get(&map, &local_key)).await;
    assert_eq!(from_b.value().unwrap().as_ref(), b"l");
}

#[tokio::test]
async fn test_remote_miss_is_success_without_value() {
    let cluster = InProcessCluster::start();
    let map = unique_name("orders");
    let key = key_in_partition(1, 2);

    let response = cluster.a.process(get(&map, &key)).await;
    assert!(response.is_success());
    assert_eq!(response.value(), None);
}

#[tokio::test]
async fn test_remote_empty_value_is_present() {
    let cluster = InProcessCluster::start();
    let map = unique_name("orders");
    let key = key_in_partition(1, 2);

    cluster.a.process(put(&map, &key, b"")).await;
    let response = cluster.a.process(get(&map, &key)).await;
    assert!(response.is_success());
    assert_eq!(response.value().map(|v| v.len()), Some(0));
}

#[tokio::test]
async fn test_remote_remove_and_contains_key() {
    let cluster = InProcessCluster::start();
    let map = unique_name("orders");
    let key = key_in_partition(1, 2);

    cluster.a.process(put(&map, &key, b"v")).await;
    let contains = cluster.a.process(contains_key(&map, &key)).await;
    assert_eq!(contains.value().unwrap().as_ref(), &[1]);

    let removed = cluster.a.process(remove(&map, &key)).await;
    assert_eq!(removed.value().unwrap().as_ref(), b"v");

    let contains = cluster.a.process(contains_key(&map, &key)).await;
    assert_eq!(contains.value().unwrap().as_ref(), &[0]);
}

#[tokio::test]
async fn test_proxy_api_routes_like_handlers() {
    let cluster = InProcessCluster::start();
    let map_name = unique_name("orders");
    let key = Data::from_bytes(CONSTANT_TYPE_BYTE_ARRAY, key_in_partition(1, 2));
    let value = Data::from_bytes(CONSTANT_TYPE_BYTE_ARRAY, &b"v"[..]);

    let map = cluster.a.get_map(&map_name);
    assert_eq!(map.put(key.clone(), value.clone()).await.unwrap(), None);
    assert_eq!(
        cluster.b.get_map(&map_name).get(&key).await.unwrap(),
        Some(value)
    );
}

#[tokio::test]
async fn test_unreachable_owner_is_retryable_failure() {
    let cluster = InProcessCluster::start();
    cluster.transport.unregister(addr(MEMBER_B));
    let key = key_in_partition(1, 2);

    let response = cluster.a.process(get("orders", &key)).await;
    assert_eq!(
        response.failure_details().unwrap().code,
        ErrorCode::Connection
    );
    assert!(response.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_forward_timeout_is_retryable_failure() {
    let a = addr(MEMBER_A);
    let b = addr(MEMBER_B);
    let config = hazelgrid_member::MemberConfig::builder()
        .listen_address(a)
        .members([a, b])
        .partition_count(2)
        .invocation_timeout(Duration::from_millis(250))
        .build()
        .unwrap();
    let node = Node::builder(config)
        .transport(Arc::new(StalledTransport))
        .build()
        .unwrap();
    let key = key_in_partition(1, 2);

    let response = node.process(get("orders", &key)).await;
    let failure = response.failure_details().unwrap();
    assert_eq!(failure.code, ErrorCode::RemoteCallTimeout);
    assert!(response.is_retryable());

    // Partition 0 is local and unaffected by the stalled transport.
    let local = node.process(get("orders", &key_in_partition(0, 2))).await;
    assert!(local.is_success());
}

#[tokio::test]
async fn test_unowned_partition_is_unavailable() {
    let a = addr(MEMBER_A);
    let node = Node::builder(member_config(a, &[a], 2))
        .partition_table(PartitionTable::from_owners(vec![Some(a), None]))
        .build()
        .unwrap();
    let key = key_in_partition(1, 2);

    let response = node.process(get("orders", &key)).await;
    assert_eq!(
        response.failure_details().unwrap().code,
        ErrorCode::PartitionUnavailable
    );
    assert!(response.is_retryable());

    let err = node
        .get_map("orders")
        .get(&Data::from_bytes(CONSTANT_TYPE_BYTE_ARRAY, key))
        .await
        .unwrap_err();
    assert!(matches!(err, GridError::PartitionUnavailable(1)));
}

#[tokio::test]
async fn test_stale_table_is_refused_by_former_owner() {
    let cluster = InProcessCluster::start();
    let map = unique_name("orders");
    let key = key_in_partition(1, 2);
    let shared = Arc::new(SharedPartitionTable::new(cluster.table()));

    // B believes A now owns partition 1; A still routes it to B.
    let a_addr = addr(MEMBER_A);
    let b = Arc::new(
        Node::builder(member_config(addr(MEMBER_B), &[a_addr, addr(MEMBER_B)], 2))
            .partition_provider(shared.clone())
            .transport(cluster.transport.clone())
            .build()
            .unwrap(),
    );
    cluster.transport.register(&b);
    shared.update_owner(1, Some(a_addr)).unwrap();
    assert_eq!(shared.snapshot().owner_of(1), Some(a_addr));

    let response = cluster.a.process(get(&map, &key)).await;
    let failure = response.failure_details().unwrap();
    assert_eq!(failure.code, ErrorCode::PartitionUnavailable);
    assert!(response.is_retryable());
}

#[tokio::test]
async fn test_migration_reroutes_requests() {
    let a_addr = addr(MEMBER_A);
    let b_addr = addr(MEMBER_B);
    let members = [a_addr, b_addr];
    let transport = Arc::new(hazelgrid_member::InProcessTransport::new());
    let table = Arc::new(SharedPartitionTable::new(PartitionTable::round_robin(
        2, &members,
    )));
    let mut events = table.subscribe_migration();

    let build = |listen| {
        Arc::new(
            Node::builder(member_config(listen, &members, 2))
                .partition_provider(table.clone())
                .transport(transport.clone())
                .build()
                .unwrap(),
        )
    };
    let a = build(a_addr);
    let b = build(b_addr);
    transport.register(&a);
    transport.register(&b);

    let map = unique_name("orders");
    let key = key_in_partition(1, 2);
    a.process(put(&map, &key, b"on-b")).await;
    assert_eq!(b.storage().record_store(&map).partition_size(1).unwrap(), 1);

    table.update_owner(1, Some(a_addr)).unwrap();
    let event = events.recv().await.unwrap();
    assert_eq!(event.partition_id, 1);
    assert_eq!(event.old_owner, Some(b_addr));
    assert_eq!(event.new_owner, Some(a_addr));

    // Entries do not migrate with ownership; A now serves partition 1 itself.
    let response = b.process(get(&map, &key)).await;
    assert!(response.is_success());
    assert_eq!(response.value(), None);
    a.process(put(&map, &key, b"on-a")).await;
    assert_eq!(a.storage().record_store(&map).partition_size(1).unwrap(), 1);
}
