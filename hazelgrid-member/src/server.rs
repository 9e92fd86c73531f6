//! TCP server accepting requests from clients and other members.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tokio_util::codec::Framed;
use tracing::{debug, info, trace, warn};

use hazelgrid_core::{ErrorCode, GridError, Protocol, ProtocolCodec, Result};

use crate::node::Node;

const RESPONSE_QUEUE_CAPACITY: usize = 1024;

/// Default bound on requests processed at once for one connection.
pub const DEFAULT_MAX_IN_FLIGHT_REQUESTS: usize = 256;

/// Listens for connections and serves each request through a [`Node`].
#[derive(Debug)]
pub struct MemberServer {
    listener: TcpListener,
    max_in_flight: usize,
}

impl MemberServer {
    /// Binds the listening socket.
    pub async fn bind(address: SocketAddr) -> Result<Self> {
        let listener = TcpListener::bind(address).await.map_err(|e| {
            GridError::Connection(format!("failed to bind {}: {}", address, e))
        })?;
        Ok(Self {
            listener,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT_REQUESTS,
        })
    }

    /// Bounds the requests processed at once for each connection.
    ///
    /// Once the bound is reached the connection is not read until a request
    /// completes. A bound of zero is treated as one.
    pub fn max_in_flight_requests(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    /// Returns the address the server is listening on.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serves connections until `shutdown` completes, then closes them.
    pub async fn run<F>(self, node: Arc<Node>, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let local = self.local_addr()?;
        let max_frame_size = node.config().max_frame_size();
        info!(address = %local, "member server listening");

        tokio::pin!(shutdown);
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(peer = %peer, "accepted connection");
                        connections.spawn(serve_connection(
                            stream,
                            peer,
                            Arc::clone(&node),
                            max_frame_size,
                            self.max_in_flight,
                        ));
                    }
                    Err(e) => warn!(error = %e, "failed to accept connection"),
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        info!(address = %local, open = connections.len(), "member server shutting down");
        connections.shutdown().await;
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    node: Arc<Node>,
    max_frame_size: usize,
    max_in_flight: usize,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!(peer = %peer, error = %e, "failed to set TCP_NODELAY");
    }
    let (mut sink, mut source) =
        Framed::new(stream, ProtocolCodec::with_max_frame_size(max_frame_size)).split();
    let (responses, mut queue) = mpsc::channel::<Protocol>(RESPONSE_QUEUE_CAPACITY);
    let in_flight = Arc::new(Semaphore::new(max_in_flight));

    let writer = tokio::spawn(async move {
        while let Some(response) = queue.recv().await {
            if let Err(e) = sink.send(response).await {
                warn!(peer = %peer, error = %e, "failed to write response");
                break;
            }
        }
    });

    while let Some(item) = source.next().await {
        let request = match item {
            Ok(request) => request,
            Err(e) => {
                warn!(peer = %peer, error = %e, "dropping connection after undecodable input");
                break;
            }
        };
        trace!(
            peer = %peer,
            command = %request.command(),
            correlation_id = request.correlation_id(),
            "received request"
        );

        // The semaphore is never closed.
        let Ok(permit) = Arc::clone(&in_flight).acquire_owned().await else {
            break;
        };
        let node = Arc::clone(&node);
        let responses = responses.clone();
        tokio::spawn(async move {
            let response = process_isolated(node, request).await;
            // The writer is gone once the connection is closed.
            let _ = responses.send(response).await;
            drop(permit);
        });
    }

    drop(responses);
    // In-flight requests still hold senders; their responses are flushed first.
    if let Err(e) = writer.await {
        warn!(peer = %peer, error = %e, "response writer failed");
    }
    debug!(peer = %peer, "connection closed");
}

/// Runs the request on its own task so a panicking handler still gets a
/// failure response.
async fn process_isolated(node: Arc<Node>, request: Protocol) -> Protocol {
    let task = {
        let request = request.clone();
        tokio::spawn(async move { node.process(request).await })
    };
    match task.await {
        Ok(response) => response,
        Err(e) => {
            warn!(
                command = %request.command(),
                correlation_id = request.correlation_id(),
                error = %e,
                "request handler aborted"
            );
            request.failure_with(ErrorCode::Unknown, format!("request handler aborted: {}", e))
        }
    }
}
