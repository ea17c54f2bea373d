//! Live WebSocket connections, addressable by session id.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::TransportError;
use crate::pipeline::{Outbound, Transport};
use crate::types::SessionId;

#[derive(Debug)]
struct Connection {
    outbox: mpsc::UnboundedSender<Outbound>,
    cancel: CancellationToken,
}

/// Outbound half of every open socket.
///
/// Emitting only enqueues onto the connection's outbox; the socket's writer
/// task does the actual I/O, so nothing here waits on the network.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    connections: DashMap<SessionId, Connection>,
}

/// What a socket task needs to serve one connection.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub outbox: mpsc::UnboundedReceiver<Outbound>,
    pub cancel: CancellationToken,
}

impl ConnectionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection under `id`.
    pub fn open(&self, id: SessionId) -> ConnectionHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        self.connections.insert(
            id,
            Connection {
                outbox: tx,
                cancel: cancel.clone(),
            },
        );
        ConnectionHandle { outbox: rx, cancel }
    }

    /// Forget the connection and cancel its tasks. Returns whether it was
    /// still registered.
    pub fn close(&self, id: &SessionId) -> bool {
        match self.connections.remove(id) {
            Some((_, connection)) => {
                connection.cancel.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self, id: &SessionId) -> bool {
        self.connections.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[async_trait]
impl Transport for ConnectionTable {
    async fn emit(&self, session: &SessionId, message: Outbound) -> Result<(), TransportError> {
        let connection = self
            .connections
            .get(session)
            .ok_or_else(|| TransportError::Unreachable(session.clone()))?;
        connection
            .outbox
            .send(message)
            .map_err(|_| TransportError::Unreachable(session.clone()))
    }

    async fn broadcast(&self, message: Outbound) -> usize {
        self.connections
            .iter()
            .filter(|entry| entry.outbox.send(message.clone()).is_ok())
            .count()
    }

    async fn disconnect(&self, session: &SessionId) {
        if self.close(session) {
            debug!(session_id = %session, "Connection closed by server");
        }
    }
}
