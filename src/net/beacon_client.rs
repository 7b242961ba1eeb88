//! Network driver for the client side of the reservation handshake

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::lobby::client::{BeaconClient, ClientState};
use crate::lobby::types::PlayerLobbyInfo;
use crate::net::framing::{read_frame, write_frame, FramingError};
use crate::net::protocol::ServerMessage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientCommand {
    /// Leave the lobby, releasing the reserved slot on the host
    Unregister,
    /// Close the beacon connection
    Disconnect,
}

/// Control handle for a running beacon client
#[derive(Debug)]
pub struct BeaconClientHandle {
    commands: mpsc::UnboundedSender<ClientCommand>,
    task: JoinHandle<ClientState>,
}

impl BeaconClientHandle {
    pub fn unregister(&self) -> bool {
        self.commands.send(ClientCommand::Unregister).is_ok()
    }

    pub fn disconnect(&self) {
        let _ = self.commands.send(ClientCommand::Disconnect);
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the client task and return its final state
    pub async fn join(self) -> ClientState {
        self.task.await.unwrap_or(ClientState::Failed)
    }
}

/// Receivers handed to whoever started the client
#[derive(Debug)]
pub struct BeaconClientEvents {
    /// Fires once: true on grant, false on deny, failure or timeout
    pub reservation: oneshot::Receiver<bool>,
    /// Every roster update received from the host
    pub roster: mpsc::UnboundedReceiver<Vec<PlayerLobbyInfo>>,
}

/// Connect to a beacon host and run the reservation handshake
///
/// The timeout covers connecting plus waiting for grant or deny.
pub fn spawn_beacon_client(
    addr: SocketAddr,
    pending_info: PlayerLobbyInfo,
    timeout: Duration,
) -> (BeaconClientHandle, BeaconClientEvents) {
    let (reservation_tx, reservation_rx) = oneshot::channel();
    let (roster_tx, roster_rx) = mpsc::unbounded_channel();
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();

    let client = BeaconClient::new(pending_info, reservation_tx).with_roster_observer(roster_tx);
    let task = tokio::spawn(run_client(addr, client, timeout, commands_rx));

    (
        BeaconClientHandle {
            commands: commands_tx,
            task,
        },
        BeaconClientEvents {
            reservation: reservation_rx,
            roster: roster_rx,
        },
    )
}

async fn run_client(
    addr: SocketAddr,
    mut client: BeaconClient,
    timeout: Duration,
    mut commands: mpsc::UnboundedReceiver<ClientCommand>,
) -> ClientState {
    let deadline = Instant::now() + timeout;

    let stream = match tokio::time::timeout_at(deadline, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            client.on_failure(&format!("connect to {} failed: {}", addr, e));
            return client.state();
        }
        Err(_) => {
            client.on_timeout();
            return client.state();
        }
    };
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY: {}", e);
    }
    let (mut reader, mut writer) = stream.into_split();

    // Reads run in their own task so a partially read frame is never lost to select!
    let (frames_tx, mut frames) = mpsc::unbounded_channel::<Result<ServerMessage, FramingError>>();
    let reader_task = tokio::spawn(async move {
        loop {
            let frame = read_frame::<ServerMessage, _>(&mut reader).await;
            let failed = frame.is_err();
            if frames_tx.send(frame).is_err() || failed {
                break;
            }
        }
    });

    if let Some(request) = client.on_connected() {
        if let Err(e) = write_frame(&mut writer, &request).await {
            client.on_failure(&e.to_string());
            reader_task.abort();
            return client.state();
        }
    }

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let message = match frame {
                    Some(Ok(message)) => message,
                    Some(Err(e)) => {
                        client.on_failure(&e.to_string());
                        break;
                    }
                    None => {
                        client.on_failure("reader stopped");
                        break;
                    }
                };
                if let Some(reply) = client.handle_message(message) {
                    if let Err(e) = write_frame(&mut writer, &reply).await {
                        warn!("Beacon client: failed to send {:?}: {}", reply, e);
                        client.on_failure(&e.to_string());
                        break;
                    }
                }
                if client.state() == ClientState::ReservationDenied {
                    break;
                }
            }
            command = commands.recv() => match command {
                Some(ClientCommand::Unregister) => {
                    match client.unregister() {
                        Some(message) => {
                            if let Err(e) = write_frame(&mut writer, &message).await {
                                warn!("Beacon client: failed to unregister: {}", e);
                                break;
                            }
                        }
                        None => debug!("Beacon client: nothing to unregister in state {:?}", client.state()),
                    }
                }
                Some(ClientCommand::Disconnect) | None => break,
            },
            _ = tokio::time::sleep_until(deadline), if client.awaiting_reservation() => {
                client.on_timeout();
                break;
            }
        }
    }

    reader_task.abort();
    client.state()
}
