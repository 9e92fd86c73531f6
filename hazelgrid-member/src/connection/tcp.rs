//! TCP transport with one multiplexed connection per target member.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio_util::codec::Framed;
use tracing::{debug, trace, warn};

use hazelgrid_core::{GridError, Protocol, ProtocolCodec, Result};

use super::RemoteTransport;

const OUTBOUND_QUEUE_CAPACITY: usize = 1024;

type PendingCalls = Mutex<HashMap<i64, oneshot::Sender<Protocol>>>;

/// The connection to one member. Its lock is held while connecting, so only
/// callers of that member wait on a slow connect.
type ConnectionSlot = Arc<tokio::sync::Mutex<Option<Arc<PeerConnection>>>>;

/// A live connection: a queue feeding the writer task and the calls awaiting
/// a response from the reader task.
#[derive(Debug)]
struct PeerConnection {
    address: SocketAddr,
    outbound: mpsc::Sender<Protocol>,
    pending: Arc<PendingCalls>,
    closed: Arc<AtomicBool>,
}

impl PeerConnection {
    async fn open(
        address: SocketAddr,
        connect_timeout: Duration,
        max_frame_size: usize,
    ) -> Result<Self> {
        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(address))
            .await
            .map_err(|_| {
                GridError::Connection(format!(
                    "timed out connecting to {} after {:?}",
                    address, connect_timeout
                ))
            })?
            .map_err(|e| GridError::Connection(format!("failed to connect to {}: {}", address, e)))?;

        stream.set_nodelay(true).map_err(|e| {
            GridError::Connection(format!("failed to set TCP_NODELAY: {}", e))
        })?;

        let (mut sink, mut source) =
            Framed::new(stream, ProtocolCodec::with_max_frame_size(max_frame_size)).split();
        let (outbound, mut queue) = mpsc::channel::<Protocol>(OUTBOUND_QUEUE_CAPACITY);
        let pending: Arc<PendingCalls> = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        {
            let closed = Arc::clone(&closed);
            tokio::spawn(async move {
                while let Some(request) = queue.recv().await {
                    if let Err(e) = sink.send(request).await {
                        warn!(member = %address, error = %e, "failed to write request");
                        break;
                    }
                }
                closed.store(true, Ordering::SeqCst);
            });
        }

        {
            let pending = Arc::clone(&pending);
            let closed = Arc::clone(&closed);
            tokio::spawn(async move {
                while let Some(item) = source.next().await {
                    match item {
                        Ok(response) => {
                            let waiter = pending
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .remove(&response.correlation_id());
                            match waiter {
                                Some(waiter) => {
                                    let _ = waiter.send(response);
                                }
                                None => trace!(
                                    member = %address,
                                    correlation_id = response.correlation_id(),
                                    "discarding response for abandoned call"
                                ),
                            }
                        }
                        Err(e) => {
                            warn!(member = %address, error = %e, "failed to read response");
                            break;
                        }
                    }
                }
                closed.store(true, Ordering::SeqCst);
                // Dropping the senders fails every call still waiting here.
                pending.lock().unwrap_or_else(PoisonError::into_inner).clear();
                debug!(member = %address, "connection closed");
            });
        }

        debug!(member = %address, "established connection");
        Ok(Self {
            address,
            outbound,
            pending,
            closed,
        })
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst) || self.outbound.is_closed()
    }

    async fn call(&self, request: Protocol) -> Result<Protocol> {
        let correlation_id = request.correlation_id();
        let (sender, receiver) = oneshot::channel();
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(correlation_id, sender);
        let _guard = PendingGuard {
            pending: &self.pending,
            correlation_id,
        };

        if self.closed.load(Ordering::SeqCst) {
            return Err(self.closed_error());
        }
        self.outbound
            .send(request)
            .await
            .map_err(|_| self.closed_error())?;
        receiver.await.map_err(|_| self.closed_error())
    }

    fn closed_error(&self) -> GridError {
        GridError::Connection(format!("connection to {} closed", self.address))
    }
}

/// Removes the pending entry when a call finishes or is abandoned.
struct PendingGuard<'a> {
    pending: &'a PendingCalls,
    correlation_id: i64,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.correlation_id);
    }
}

/// Forwards requests to other members over TCP.
///
/// Connections are opened on first use and reopened after they close. Many
/// calls share one connection; responses are matched by correlation id.
/// Connecting to one member never delays calls to another.
#[derive(Debug)]
pub struct TcpTransport {
    connect_timeout: Duration,
    max_frame_size: usize,
    connections: Mutex<HashMap<SocketAddr, ConnectionSlot>>,
}

impl TcpTransport {
    /// Creates a transport with the given connect timeout and frame size limit.
    pub fn new(connect_timeout: Duration, max_frame_size: usize) -> Self {
        Self {
            connect_timeout,
            max_frame_size,
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the number of open connections.
    ///
    /// A connection still being established is not counted.
    pub fn connection_count(&self) -> usize {
        self.slots()
            .iter()
            .filter(|slot| {
                slot.try_lock()
                    .is_ok_and(|current| current.as_ref().is_some_and(|c| !c.is_closed()))
            })
            .count()
    }

    fn slots(&self) -> Vec<ConnectionSlot> {
        let connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        connections.values().cloned().collect()
    }

    fn slot(&self, target: SocketAddr) -> ConnectionSlot {
        let mut connections = self.connections.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(connections.entry(target).or_default())
    }

    async fn connection(&self, target: SocketAddr) -> Result<Arc<PeerConnection>> {
        let slot = self.slot(target);
        let mut current = slot.lock().await;
        if let Some(connection) = current.as_ref() {
            if !connection.is_closed() {
                return Ok(Arc::clone(connection));
            }
            debug!(member = %target, "reopening closed connection");
        }
        let connection = Arc::new(
            PeerConnection::open(target, self.connect_timeout, self.max_frame_size).await?,
        );
        *current = Some(Arc::clone(&connection));
        Ok(connection)
    }

    #[cfg(test)]
    async fn pending_calls(&self, target: SocketAddr) -> usize {
        let slot = self.slot(target);
        let current = slot.lock().await;
        current.as_ref().map_or(0, |c| {
            c.pending.lock().unwrap_or_else(PoisonError::into_inner).len()
        })
    }
}

#[async_trait]
impl RemoteTransport for TcpTransport {
    async fn invoke(&self, target: SocketAddr, request: Protocol) -> Result<Protocol> {
        let connection = self.connection(target).await?;
        trace!(
            member = %target,
            command = request.command(),
            correlation_id = request.correlation_id(),
            "forwarding request"
        );
        connection.call(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use std::time::Instant;
    use tokio::net::{TcpListener, TcpSocket};

    async fn echo_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut framed = Framed::new(stream, ProtocolCodec::new());
                    while let Some(Ok(request)) = framed.next().await {
                        let value = Bytes::copy_from_slice(request.command().as_bytes());
                        if framed.send(request.success(Some(value))).await.is_err() {
                            break;
                        }
                    }
                });
            }
        });
        addr
    }

    async fn silent_server() -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });
        addr
    }

    fn transport() -> TcpTransport {
        TcpTransport::new(Duration::from_secs(2), 1024 * 1024)
    }

    #[tokio::test]
    async fn test_invoke_matches_response() {
        let addr = echo_server().await;
        let transport = transport();

        let request = Protocol::request("ping");
        let response = transport.invoke(addr, request.clone()).await.unwrap();
        assert_eq!(response.correlation_id(), request.correlation_id());
        assert_eq!(response.value().unwrap().as_ref(), b"ping");
        assert_eq!(transport.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_calls_share_connection() {
        let addr = echo_server().await;
        let transport = Arc::new(transport());

        let mut handles = Vec::new();
        for i in 0..16 {
            let transport = Arc::clone(&transport);
            handles.push(tokio::spawn(async move {
                let command = format!("cmd-{}", i);
                let response = transport
                    .invoke(addr, Protocol::request(command.clone()))
                    .await
                    .unwrap();
                assert_eq!(response.value().unwrap().as_ref(), command.as_bytes());
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(transport.connection_count(), 1);
    }

    #[tokio::test]
    async fn test_connect_failure_is_connection_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = transport()
            .invoke(addr, Protocol::request("ping"))
            .await
            .unwrap_err();
        assert!(matches!(err, GridError::Connection(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_abandoned_call_is_removed() {
        let addr = silent_server().await;
        let transport = transport();

        let result = tokio::time::timeout(
            Duration::from_millis(100),
            transport.invoke(addr, Protocol::request("ping")),
        )
        .await;
        assert!(result.is_err());
        assert_eq!(transport.pending_calls(addr).await, 0);
    }

    #[tokio::test]
    async fn test_closed_connection_fails_pending_call() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((stream, _)) = listener.accept().await {
                let mut framed = Framed::new(stream, ProtocolCodec::new());
                let _ = framed.next().await;
            }
        });

        let err = transport()
            .invoke(addr, Protocol::request("ping"))
            .await
            .unwrap_err();
        assert!(matches!(err, GridError::Connection(_)));
    }

    /// A listener that never accepts, with its backlog filled so that
    /// further connects stall until they time out.
    async fn saturated_listener() -> (TcpListener, Vec<TcpStream>, SocketAddr) {
        let socket = TcpSocket::new_v4().unwrap();
        socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
        let listener = socket.listen(0).unwrap();
        let addr = listener.local_addr().unwrap();
        let mut held = Vec::new();
        for _ in 0..8 {
            if let Ok(Ok(stream)) =
                tokio::time::timeout(Duration::from_millis(100), TcpStream::connect(addr)).await
            {
                held.push(stream);
            }
        }
        (listener, held, addr)
    }

    #[tokio::test]
    async fn test_slow_connect_does_not_block_other_members() {
        let healthy = echo_server().await;
        let (_listener, _held, stalled) = saturated_listener().await;
        let transport = Arc::new(TcpTransport::new(Duration::from_secs(3), 1024 * 1024));

        let stalled_call = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                transport.invoke(stalled, Protocol::request("ping")).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let started = Instant::now();
        let response = transport
            .invoke(healthy, Protocol::request("ping"))
            .await
            .unwrap();
        assert!(response.is_success());
        assert!(started.elapsed() < Duration::from_secs(1));

        stalled_call.abort();
    }
}
