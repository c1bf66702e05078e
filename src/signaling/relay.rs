//! Signaling relay
//!
//! State machine over the single broadcast session. All transitions happen
//! under one write guard, so concurrent declarations serialize and the
//! directory is never seen mid-transition. Forwarded payloads are opaque;
//! the only field the relay rewrites is the sender id, which always comes
//! from the verified connection, never from the message body.

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::SignalingConfig;

use super::directory::{ConnectionDirectory, MessageSender, Role};
use super::protocol::{ClientMessage, ConnectionId, ServerMessage};

pub struct SignalingRelay {
    directory: RwLock<ConnectionDirectory>,
    announce_replaced: bool,
}

impl SignalingRelay {
    pub fn new(config: &SignalingConfig) -> Self {
        Self {
            directory: RwLock::new(ConnectionDirectory::new()),
            announce_replaced: config.announce_replaced_broadcaster,
        }
    }

    /// Register a new connection and hand back its identifier
    pub async fn connect(&self, sender: MessageSender) -> ConnectionId {
        let id = Uuid::new_v4();
        self.directory.write().await.register(id, sender);
        debug!(%id, "signaling connection registered");
        id
    }

    /// Drop a connection and propagate the loss: a departing broadcaster
    /// ends the session, a departing watcher is reported to the broadcaster.
    pub async fn disconnect(&self, id: ConnectionId) {
        let mut directory = self.directory.write().await;
        let was_broadcaster = directory.remove(id);
        if was_broadcaster {
            info!(%id, "broadcaster disconnected, ending session");
            directory.broadcast_except(id, &ServerMessage::BroadcasterStopped);
        } else if let Some(session) = directory.lookup_broadcaster() {
            directory.send_to(session.id, ServerMessage::DisconnectPeer(id));
        }
    }

    /// Dispatch one client message. `from` is the verified connection id of
    /// the caller.
    pub async fn handle(&self, from: ConnectionId, message: ClientMessage) {
        match message {
            ClientMessage::Broadcaster { stream_name } => {
                self.declare_broadcaster(from, stream_name).await
            }
            ClientMessage::StopBroadcast => self.stop_broadcast(from).await,
            ClientMessage::Watcher { stream_name } => self.watch_request(from, stream_name).await,
            ClientMessage::Offer { to, data } => {
                self.forward(to, ServerMessage::Offer { from, data }).await
            }
            ClientMessage::Answer { to, data } => {
                self.forward(to, ServerMessage::Answer { from, data }).await
            }
            ClientMessage::Candidate { to, data } => {
                self.forward(to, ServerMessage::Candidate { from, data })
                    .await
            }
            ClientMessage::RecordingReady { output_url } => {
                self.recording_ready(from, output_url).await
            }
        }
    }

    async fn declare_broadcaster(&self, from: ConnectionId, stream_name: Option<String>) {
        let stream_name = normalize_stream_name(stream_name);
        let mut directory = self.directory.write().await;

        let replaced = directory.set_role(from, Role::Broadcaster, stream_name.clone());
        if directory.role(from).is_none() {
            return;
        }

        if let Some(old) = replaced {
            if old.id != from {
                info!(old = %old.id, new = %from, "broadcaster replaced");
                if self.announce_replaced {
                    directory.broadcast_except(from, &ServerMessage::BroadcasterStopped);
                }
            }
        }

        info!(%from, stream_name = ?stream_name, "broadcaster is live");
        directory.broadcast_except(from, &ServerMessage::Broadcaster { stream_name });
    }

    async fn stop_broadcast(&self, from: ConnectionId) {
        let mut directory = self.directory.write().await;
        if directory.clear_broadcaster(from) {
            info!(%from, "broadcast stopped");
            directory.broadcast_except(from, &ServerMessage::BroadcasterStopped);
        }
    }

    async fn watch_request(&self, from: ConnectionId, stream_name: Option<String>) {
        let requested = normalize_stream_name(stream_name);
        let mut directory = self.directory.write().await;

        let session = match directory.lookup_broadcaster() {
            Some(session) => session.clone(),
            None => {
                debug!(%from, "watch request with no broadcaster live");
                directory.send_to(from, ServerMessage::NoBroadcaster);
                return;
            }
        };

        // A named session admits exact matches only; a nameless session
        // admits anyone. Never fall back to an unrelated stream.
        let admitted = match &session.stream_name {
            Some(name) => requested.as_deref() == Some(name.as_str()),
            None => true,
        };

        if !admitted {
            debug!(
                %from,
                requested = ?requested,
                active = ?session.stream_name,
                "watch request denied: stream name mismatch"
            );
            directory.send_to(from, ServerMessage::NoBroadcaster);
            return;
        }

        directory.set_role(from, Role::Watcher, None);
        directory.send_to(session.id, ServerMessage::Watcher(from));
    }

    async fn forward(&self, to: ConnectionId, message: ServerMessage) {
        let directory = self.directory.read().await;
        if !directory.send_to(to, message) {
            // Expected race: the destination disconnected between message
            // receipt and forward.
            debug!(%to, "relay destination vanished, dropping message");
        }
    }

    async fn recording_ready(&self, from: ConnectionId, output_url: Option<String>) {
        let directory = self.directory.read().await;
        let Some(session) = directory.lookup_broadcaster() else {
            return;
        };
        if session.id != from {
            debug!(%from, "recording-ready from non-broadcaster ignored");
            return;
        }

        let message = ServerMessage::RecordingReady {
            output_url,
            stream_name: session.stream_name.clone(),
        };
        info!(stream_name = ?session.stream_name, "announcing recording");
        directory.broadcast_except(from, &message);
    }

    /// Number of live signaling connections
    pub async fn connection_count(&self) -> usize {
        self.directory.read().await.len()
    }
}

fn normalize_stream_name(name: Option<String>) -> Option<String> {
    name.map(|n| n.trim().to_string()).filter(|n| !n.is_empty())
}
