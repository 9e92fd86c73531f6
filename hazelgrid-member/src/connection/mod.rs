//! Transports used to forward operations to the member owning a partition.

mod in_process;
mod tcp;

use std::net::SocketAddr;

use async_trait::async_trait;

use hazelgrid_core::{Protocol, Result};

pub use in_process::InProcessTransport;
pub use tcp::TcpTransport;

/// Delivers a request to another member and returns its response.
///
/// Implementations do not apply an invocation deadline; the caller wraps the
/// returned future in a timeout, and dropping the future abandons the call.
#[async_trait]
pub trait RemoteTransport: Send + Sync {
    /// Sends `request` to `target` and waits for the matching response.
    async fn invoke(&self, target: SocketAddr, request: Protocol) -> Result<Protocol>;
}
