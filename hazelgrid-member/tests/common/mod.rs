//! Common test utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use hazelgrid_core::protocol::constants::*;
use hazelgrid_core::serialization::CONSTANT_TYPE_BYTE_ARRAY;
use hazelgrid_core::{Data, Protocol, ProtocolCodec, Result};
use hazelgrid_member::{
    InProcessTransport, MemberConfig, Node, PartitionTable, RemoteTransport,
};

static TEST_COUNTER: AtomicU32 = AtomicU32::new(0);

pub const MEMBER_A: &str = "127.0.0.1:15701";
pub const MEMBER_B: &str = "127.0.0.1:15702";

pub fn addr(s: &str) -> SocketAddr {
    s.parse().expect("invalid test address")
}

pub fn unique_name(prefix: &str) -> String {
    let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!("{}-{}-{}", prefix, std::process::id(), id)
}

/// Returns key bytes whose partition, out of `partition_count`, is `partition_id`.
pub fn key_in_partition(partition_id: i32, partition_count: i32) -> Vec<u8> {
    (0u32..)
        .map(|i| format!("key-{}", i).into_bytes())
        .find(|bytes| {
            Data::from_bytes(CONSTANT_TYPE_BYTE_ARRAY, bytes.clone()).partition_id(partition_count)
                == partition_id
        })
        .expect("no key found for partition")
}

pub fn member_config(listen: SocketAddr, members: &[SocketAddr], partitions: i32) -> MemberConfig {
    MemberConfig::builder()
        .listen_address(listen)
        .members(members.iter().copied())
        .partition_count(partitions)
        .invocation_timeout(Duration::from_secs(5))
        .build()
        .expect("failed to build config")
}

/// Two members sharing an in-process transport; partition 0 is owned by A
/// and partition 1 by B.
pub struct InProcessCluster {
    pub a: Arc<Node>,
    pub b: Arc<Node>,
    pub transport: Arc<InProcessTransport>,
}

impl InProcessCluster {
    pub fn start() -> Self {
        let a_addr = addr(MEMBER_A);
        let b_addr = addr(MEMBER_B);
        let members = [a_addr, b_addr];
        let transport = Arc::new(InProcessTransport::new());

        let a = Arc::new(
            Node::builder(member_config(a_addr, &members, 2))
                .transport(transport.clone())
                .build()
                .expect("failed to build member A"),
        );
        let b = Arc::new(
            Node::builder(member_config(b_addr, &members, 2))
                .transport(transport.clone())
                .build()
                .expect("failed to build member B"),
        );
        transport.register(&a);
        transport.register(&b);

        Self { a, b, transport }
    }

    pub fn table(&self) -> PartitionTable {
        PartitionTable::round_robin(2, &[addr(MEMBER_A), addr(MEMBER_B)])
    }
}

/// A transport whose calls never complete.
#[derive(Debug, Default)]
pub struct StalledTransport;

#[async_trait]
impl RemoteTransport for StalledTransport {
    async fn invoke(&self, _target: SocketAddr, _request: Protocol) -> Result<Protocol> {
        futures::future::pending().await
    }
}

pub fn get(map: &str, key: &[u8]) -> Protocol {
    Protocol::request(COMMAND_GET)
        .with_arg(map)
        .with_buffer(key.to_vec())
}

pub fn put(map: &str, key: &[u8], value: &[u8]) -> Protocol {
    Protocol::request(COMMAND_PUT)
        .with_arg(map)
        .with_buffer(key.to_vec())
        .with_buffer(value.to_vec())
}

pub fn remove(map: &str, key: &[u8]) -> Protocol {
    Protocol::request(COMMAND_REMOVE)
        .with_arg(map)
        .with_buffer(key.to_vec())
}

pub fn contains_key(map: &str, key: &[u8]) -> Protocol {
    Protocol::request(COMMAND_CONTAINS_KEY)
        .with_arg(map)
        .with_buffer(key.to_vec())
}

/// A minimal client speaking the member protocol over TCP.
pub struct TestClient {
    framed: Framed<TcpStream, ProtocolCodec>,
}

impl TestClient {
    pub async fn connect(address: SocketAddr) -> Self {
        let stream = TcpStream::connect(address)
            .await
            .expect("failed to connect");
        Self {
            framed: Framed::new(stream, ProtocolCodec::new()),
        }
    }

    pub async fn call(&mut self, request: Protocol) -> Protocol {
        let correlation_id = request.correlation_id();
        self.framed.send(request).await.expect("failed to send");
        let response = self
            .framed
            .next()
            .await
            .expect("connection closed")
            .expect("failed to decode response");
        assert_eq!(response.correlation_id(), correlation_id);
        response
    }
}
