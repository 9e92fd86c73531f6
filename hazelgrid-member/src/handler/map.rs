//! Client-facing map commands.
//!
//! Every map command carries the map name in `args[0]` and the key, already
//! serialized, in `buffers[0]`. The bytes are used as the key payload as they
//! are; nothing is re-encoded.

use async_trait::async_trait;
use bytes::Bytes;

use hazelgrid_core::serialization::CONSTANT_TYPE_BYTE_ARRAY;
use hazelgrid_core::{Data, Protocol, Result};

use super::CommandHandler;
use crate::node::Node;
use crate::proxy::encode_flag;

fn raw_data(buffer: &Bytes) -> Data {
    Data::from_bytes(CONSTANT_TYPE_BYTE_ARRAY, buffer.clone())
}

/// `get`: answers with the stored value, or no value when the key is absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapGetHandler;

#[async_trait]
impl CommandHandler for MapGetHandler {
    async fn handle(&self, node: &Node, request: &Protocol) -> Result<Option<Bytes>> {
        let name = request.arg(0)?;
        let key = raw_data(request.buffer(0)?);
        let map = node.get_map(name);
        let value = map.get(&key).await?;
        Ok(value.map(Data::into_payload))
    }
}

/// `put`: stores `buffers[1]` under the key and answers with the previous value.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapPutHandler;

#[async_trait]
impl CommandHandler for MapPutHandler {
    async fn handle(&self, node: &Node, request: &Protocol) -> Result<Option<Bytes>> {
        let name = request.arg(0)?;
        let key = raw_data(request.buffer(0)?);
        let value = raw_data(request.buffer(1)?);
        let previous = node.get_map(name).put(key, value).await?;
        Ok(previous.map(Data::into_payload))
    }
}

/// `remove`: deletes the key and answers with the value it held.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapRemoveHandler;

#[async_trait]
impl CommandHandler for MapRemoveHandler {
    async fn handle(&self, node: &Node, request: &Protocol) -> Result<Option<Bytes>> {
        let name = request.arg(0)?;
        let key = raw_data(request.buffer(0)?);
        let previous = node.get_map(name).remove(&key).await?;
        Ok(previous.map(Data::into_payload))
    }
}

/// `containsKey`: answers with a one-byte flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct MapContainsKeyHandler;

#[async_trait]
impl CommandHandler for MapContainsKeyHandler {
    async fn handle(&self, node: &Node, request: &Protocol) -> Result<Option<Bytes>> {
        let name = request.arg(0)?;
        let key = raw_data(request.buffer(0)?);
        let present = node.get_map(name).contains_key(&key).await?;
        Ok(Some(encode_flag(present)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemberConfig;
    use hazelgrid_core::protocol::constants::*;
    use hazelgrid_core::ErrorCode;

    fn node() -> Node {
        Node::builder(MemberConfig::default()).build().unwrap()
    }

    fn put(map: &str, key: &[u8], value: &[u8]) -> Protocol {
        Protocol::request(COMMAND_PUT)
            .with_arg(map)
            .with_buffer(key.to_vec())
            .with_buffer(value.to_vec())
    }

    fn keyed(command: &str, map: &str, key: &[u8]) -> Protocol {
        Protocol::request(command)
            .with_arg(map)
            .with_buffer(key.to_vec())
    }

    #[tokio::test]
    async fn test_get_missing_key_is_success_without_value() {
        let node = node();
        let response = node.process(keyed(COMMAND_GET, "orders", b"never")).await;
        assert!(response.is_success());
        assert_eq!(response.value(), None);
        assert!(response.buffers().is_empty());
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let node = node();
        let first = node.process(put("orders", b"k", b"v1")).await;
        assert!(first.is_success());
        assert_eq!(first.value(), None);

        let second = node.process(put("orders", b"k", b"v2")).await;
        assert_eq!(second.value().unwrap().as_ref(), b"v1");

        let get = node.process(keyed(COMMAND_GET, "orders", b"k")).await;
        assert_eq!(get.value().unwrap().as_ref(), b"v2");

        let other_map = node.process(keyed(COMMAND_GET, "users", b"k")).await;
        assert_eq!(other_map.value(), None);
    }

    #[tokio::test]
    async fn test_empty_value_differs_from_absent() {
        let node = node();
        node.process(put("m", b"empty", b"")).await;

        let present = node.process(keyed(COMMAND_GET, "m", b"empty")).await;
        assert!(present.is_success());
        assert_eq!(present.value().map(|v| v.len()), Some(0));

        let absent = node.process(keyed(COMMAND_GET, "m", b"missing")).await;
        assert!(absent.is_success());
        assert_eq!(absent.value(), None);
    }

    #[tokio::test]
    async fn test_remove_and_contains_key() {
        let node = node();
        node.process(put("m", b"k", b"v")).await;

        let contains = node.process(keyed(COMMAND_CONTAINS_KEY, "m", b"k")).await;
        assert_eq!(contains.value().unwrap().as_ref(), &[1]);

        let removed = node.process(keyed(COMMAND_REMOVE, "m", b"k")).await;
        assert_eq!(removed.value().unwrap().as_ref(), b"v");

        let contains = node.process(keyed(COMMAND_CONTAINS_KEY, "m", b"k")).await;
        assert_eq!(contains.value().unwrap().as_ref(), &[0]);

        let removed_again = node.process(keyed(COMMAND_REMOVE, "m", b"k")).await;
        assert!(removed_again.is_success());
        assert_eq!(removed_again.value(), None);
    }

    #[tokio::test]
    async fn test_missing_key_buffer_is_protocol_failure() {
        let node = node();
        let response = node
            .process(Protocol::request(COMMAND_GET).with_arg("orders"))
            .await;
        assert_eq!(response.failure_details().unwrap().code, ErrorCode::Protocol);

        let response = node.process(keyed(COMMAND_PUT, "orders", b"k")).await;
        assert_eq!(response.failure_details().unwrap().code, ErrorCode::Protocol);
    }

    #[tokio::test]
    async fn test_proxy_is_created_lazily() {
        let node = node();
        assert!(node.proxies().is_empty());
        node.process(keyed(COMMAND_GET, "orders", b"k")).await;
        node.process(keyed(COMMAND_GET, "orders", b"j")).await;
        assert_eq!(node.proxies().len(), 1);
    }
}
