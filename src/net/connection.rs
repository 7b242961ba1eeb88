use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Instant;

use tokio::sync::mpsc;

use crate::net::protocol::ServerMessage;

/// Beacon connection handle
pub type ConnectionId = u64;

/// Beacon connection information, owned by the host actor
#[derive(Debug)]
pub struct Connection {
    pub id: ConnectionId,
    pub remote_addr: SocketAddr,
    pub created_at: Instant,
    pub messages_sent: u64,
    pub messages_received: u64,
    outbound: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId, remote_addr: SocketAddr, outbound: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self {
            id,
            remote_addr,
            created_at: Instant::now(),
            messages_sent: 0,
            messages_received: 0,
            outbound,
        }
    }

    /// Queue a message on this connection's ordered outbound stream
    ///
    /// Returns false if the writer has already gone away.
    pub fn send(&mut self, message: ServerMessage) -> bool {
        if self.outbound.send(message).is_ok() {
            self.messages_sent += 1;
            true
        } else {
            false
        }
    }

    pub fn record_received(&mut self) {
        self.messages_received += 1;
    }
}

/// Live beacon connections keyed by random id
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: HashMap<ConnectionId, Connection>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection with a random ID
    pub fn create(&mut self, remote_addr: SocketAddr, outbound: mpsc::UnboundedSender<ServerMessage>) -> ConnectionId {
        let id = loop {
            let candidate = rand::random::<u64>();
            if !self.connections.contains_key(&candidate) {
                break candidate;
            }
        };

        self.connections.insert(id, Connection::new(id, remote_addr, outbound));
        id
    }

    pub fn get_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(&id)
    }

    /// Send to one connection; false if it is unknown or closed
    pub fn send(&mut self, id: ConnectionId, message: ServerMessage) -> bool {
        match self.connections.get_mut(&id) {
            Some(conn) => conn.send(message),
            None => false,
        }
    }

    pub fn remove(&mut self, id: ConnectionId) -> Option<Connection> {
        self.connections.remove(&id)
    }

    pub fn count(&self) -> usize {
        self.connections.len()
    }
}
