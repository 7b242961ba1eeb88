//! TCP beacon host
//!
//! One actor task owns the `LobbyHost` and the connection registry. Each
//! accepted socket gets a reader task that forwards decoded messages to the
//! actor and a writer task that drains the connection's outbound queue, so
//! per-connection delivery stays ordered.

use std::io;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::lobby::host::{HostSettings, LobbyHost, OutboundBatch};
use crate::lobby::types::PlayerLobbyInfo;
use crate::metrics::Metrics;
use crate::net::connection::{ConnectionId, ConnectionRegistry};
use crate::net::framing::{read_message, write_frame, FramingError};
use crate::net::protocol::{decode, ClientMessage, ServerMessage};

#[derive(Debug, thiserror::Error)]
pub enum BeaconError {
    #[error("Failed to bind beacon on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },
    #[error("Beacon host is not running")]
    HostUnavailable,
}

/// Point-in-time view of the host's lobby state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LobbySnapshot {
    pub reserved_slots: u32,
    pub max_slots: u32,
    pub connected_clients: usize,
    pub roster: Vec<PlayerLobbyInfo>,
}

enum HostEvent {
    Connected {
        remote_addr: SocketAddr,
        outbound: mpsc::UnboundedSender<ServerMessage>,
        reply: oneshot::Sender<ConnectionId>,
    },
    Message {
        conn: ConnectionId,
        message: ClientMessage,
    },
    Disconnected {
        conn: ConnectionId,
    },
    Snapshot(oneshot::Sender<LobbySnapshot>),
    Shutdown,
}

/// Running beacon host; stops listening when dropped
pub struct BeaconHost {
    local_addr: SocketAddr,
    events: mpsc::UnboundedSender<HostEvent>,
    accept_task: JoinHandle<()>,
}

impl BeaconHost {
    /// Bind the listener and start the host actor
    pub async fn bind(addr: SocketAddr, settings: HostSettings, metrics: Arc<Metrics>) -> Result<Self, BeaconError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| BeaconError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| BeaconError::Bind { addr, source })?;

        let host = LobbyHost::new(settings).with_metrics(metrics.clone());
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        tokio::spawn(run_host(host, events_rx, metrics.clone()));
        let accept_task = tokio::spawn(accept_loop(listener, events_tx.clone(), metrics));

        info!("Beacon host listening on {}", local_addr);

        Ok(Self {
            local_addr,
            events: events_tx,
            accept_task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        !self.events.is_closed()
    }

    /// Ask the actor for its current state
    pub async fn snapshot(&self) -> Result<LobbySnapshot, BeaconError> {
        let (tx, rx) = oneshot::channel();
        self.events
            .send(HostEvent::Snapshot(tx))
            .map_err(|_| BeaconError::HostUnavailable)?;
        rx.await.map_err(|_| BeaconError::HostUnavailable)
    }

    /// Stop accepting connections and stop the actor
    ///
    /// Connections still open afterwards get `ReservationDenied` for any
    /// reservation request.
    pub fn shutdown(&self) {
        self.accept_task.abort();
        if self.events.send(HostEvent::Shutdown).is_ok() {
            info!("Beacon host on {} shutting down", self.local_addr);
        }
    }
}

impl Drop for BeaconHost {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn accept_loop(listener: TcpListener, events: mpsc::UnboundedSender<HostEvent>, metrics: Arc<Metrics>) {
    loop {
        match listener.accept().await {
            Ok((stream, remote_addr)) => {
                let events = events.clone();
                let metrics = metrics.clone();
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, remote_addr, events, metrics).await {
                        warn!("Beacon connection {} error: {}", remote_addr, e);
                    }
                });
            }
            Err(e) => {
                warn!("Beacon accept error: {}", e);
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        }
    }
}

/// Deliver a handler's output in order
fn deliver(registry: &mut ConnectionRegistry, out: OutboundBatch) {
    for (conn, message) in out {
        if !registry.send(conn, message) {
            debug!("Beacon host: dropped message for closed connection {}", conn);
        }
    }
}

async fn run_host(mut host: LobbyHost, mut events: mpsc::UnboundedReceiver<HostEvent>, metrics: Arc<Metrics>) {
    let mut registry = ConnectionRegistry::new();

    while let Some(event) = events.recv().await {
        match event {
            HostEvent::Connected {
                remote_addr,
                outbound,
                reply,
            } => {
                let conn = registry.create(remote_addr, outbound);
                if reply.send(conn).is_err() {
                    registry.remove(conn);
                    continue;
                }
                info!("Beacon client {} connected from {}", conn, remote_addr);
                metrics
                    .connections_active
                    .store(registry.count() as u64, Ordering::Relaxed);
                let out = host.on_client_connected(conn);
                deliver(&mut registry, out);
            }
            HostEvent::Message { conn, message } => {
                if let Some(connection) = registry.get_mut(conn) {
                    connection.record_received();
                }
                let out = host.handle_message(conn, message);
                deliver(&mut registry, out);
            }
            HostEvent::Disconnected { conn } => {
                if let Some(connection) = registry.remove(conn) {
                    info!(
                        "Beacon client {} ({}) disconnected after {:?} ({} in, {} out)",
                        conn,
                        connection.remote_addr,
                        connection.created_at.elapsed(),
                        connection.messages_received,
                        connection.messages_sent
                    );
                }
                host.on_client_disconnected(conn);
                metrics
                    .connections_active
                    .store(registry.count() as u64, Ordering::Relaxed);
            }
            HostEvent::Snapshot(reply) => {
                let _ = reply.send(LobbySnapshot {
                    reserved_slots: host.reserved_slots(),
                    max_slots: host.max_slots(),
                    connected_clients: host.client_count(),
                    roster: host.roster().players().to_vec(),
                });
            }
            HostEvent::Shutdown => {
                host.close();
                break;
            }
        }
    }

    metrics.connections_active.store(0, Ordering::Relaxed);
    debug!("Beacon host actor stopped");
}

async fn handle_connection(
    stream: TcpStream,
    remote_addr: SocketAddr,
    events: mpsc::UnboundedSender<HostEvent>,
    metrics: Arc<Metrics>,
) -> Result<(), FramingError> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY for {}: {}", remote_addr, e);
    }
    let (mut reader, mut writer) = stream.into_split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();

    let (reply_tx, reply_rx) = oneshot::channel();
    let registered = events
        .send(HostEvent::Connected {
            remote_addr,
            outbound: outbound_tx.clone(),
            reply: reply_tx,
        })
        .is_ok();
    let conn = if registered { reply_rx.await.ok() } else { None };
    if conn.is_none() {
        warn!("Beacon host unavailable for {}", remote_addr);
    }

    // Ends once both this task and the registry have dropped their senders
    let writer_metrics = metrics.clone();
    tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            match write_frame(&mut writer, &message).await {
                Ok(bytes) => {
                    writer_metrics.messages_sent.fetch_add(1, Ordering::Relaxed);
                    writer_metrics.bytes_sent.fetch_add(bytes as u64 + 4, Ordering::Relaxed);
                }
                Err(e) => {
                    debug!("Beacon write to {} failed: {}", remote_addr, e);
                    break;
                }
            }
        }
    });

    let result = loop {
        let payload = match read_message(&mut reader).await {
            Ok(payload) => payload,
            Err(e) if e.is_disconnect() => break Ok(()),
            Err(e) => break Err(e),
        };
        metrics.messages_received.fetch_add(1, Ordering::Relaxed);
        metrics
            .bytes_received
            .fetch_add(payload.len() as u64 + 4, Ordering::Relaxed);

        let message: ClientMessage = match decode(&payload) {
            Ok(message) => message,
            Err(e) => {
                warn!("Dropping beacon client {}: {}", remote_addr, e);
                break Err(e.into());
            }
        };

        let undelivered = match conn {
            Some(conn) => events
                .send(HostEvent::Message { conn, message })
                .err()
                .and_then(|e| match e.0 {
                    HostEvent::Message { message, .. } => Some(message),
                    _ => None,
                }),
            None => Some(message),
        };

        // Host is gone: reservation requests are denied on the spot
        if let Some(message) = undelivered {
            match message {
                ClientMessage::RequestReservation { player_id } => {
                    debug!("Denying player {}: beacon host unavailable", player_id);
                    let _ = outbound_tx.send(ServerMessage::ReservationDenied);
                }
                other => debug!("Beacon host unavailable, dropping {:?}", other),
            }
        }
    };

    if let Some(conn) = conn {
        let _ = events.send(HostEvent::Disconnected { conn });
    }
    result
}
