//! Health check command.

use async_trait::async_trait;
use bytes::Bytes;

use hazelgrid_core::{Protocol, Result};

use super::CommandHandler;
use crate::node::Node;

/// Value returned by [`PingHandler`].
pub const PONG: &[u8] = b"PONG";

/// `ping`: health check.
#[derive(Debug, Clone, Copy, Default)]
pub struct PingHandler;

#[async_trait]
impl CommandHandler for PingHandler {
    async fn handle(&self, _node: &Node, _request: &Protocol) -> Result<Option<Bytes>> {
        Ok(Some(Bytes::from_static(PONG)))
    }
}
