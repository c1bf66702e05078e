//! Connection directory
//!
//! Process-wide table of live signaling connections and the single
//! broadcaster slot. The directory itself is a plain data structure; the
//! relay wraps it in a lock and holds the guard across every transition so
//! the broadcaster slot is never observed half-updated.

use std::collections::HashMap;

use tokio::sync::mpsc;

use super::protocol::{ConnectionId, ServerMessage};

/// Role a connection currently plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Unassigned,
    Broadcaster,
    Watcher,
}

/// Outbound message queue handle for one connection. Delivery preserves
/// per-sender order; a closed receiver means the connection is gone.
pub type MessageSender = mpsc::UnboundedSender<ServerMessage>;

struct ConnectionEntry {
    role: Role,
    sender: MessageSender,
}

/// The single live broadcast, if any
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcastSession {
    pub id: ConnectionId,
    pub stream_name: Option<String>,
}

/// Table of live connections plus the zero-or-one broadcaster slot
#[derive(Default)]
pub struct ConnectionDirectory {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    broadcaster: Option<BroadcastSession>,
}

impl ConnectionDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection with role `Unassigned`
    pub fn register(&mut self, id: ConnectionId, sender: MessageSender) {
        self.connections.insert(
            id,
            ConnectionEntry {
                role: Role::Unassigned,
                sender,
            },
        );
    }

    /// Assign a role to a registered connection.
    ///
    /// Setting `Role::Broadcaster` installs a new broadcast session and
    /// returns the session it replaced, demoting the previous broadcaster
    /// connection (if it is a different one) to `Unassigned`.
    pub fn set_role(
        &mut self,
        id: ConnectionId,
        role: Role,
        stream_name: Option<String>,
    ) -> Option<BroadcastSession> {
        if !self.connections.contains_key(&id) {
            return None;
        }

        let replaced = if role == Role::Broadcaster {
            let old = self.broadcaster.replace(BroadcastSession { id, stream_name });
            if let Some(ref old) = old {
                if old.id != id {
                    if let Some(entry) = self.connections.get_mut(&old.id) {
                        entry.role = Role::Unassigned;
                    }
                }
            }
            old
        } else {
            None
        };

        if let Some(entry) = self.connections.get_mut(&id) {
            entry.role = role;
        }
        replaced
    }

    /// Current broadcast session, if one is live
    pub fn lookup_broadcaster(&self) -> Option<&BroadcastSession> {
        self.broadcaster.as_ref()
    }

    pub fn role(&self, id: ConnectionId) -> Option<Role> {
        self.connections.get(&id).map(|e| e.role)
    }

    /// Clear the broadcast session if `id` owns it
    pub fn clear_broadcaster(&mut self, id: ConnectionId) -> bool {
        if self.broadcaster.as_ref().is_some_and(|s| s.id == id) {
            self.broadcaster = None;
            if let Some(entry) = self.connections.get_mut(&id) {
                entry.role = Role::Unassigned;
            }
            true
        } else {
            false
        }
    }

    /// Remove a connection; returns true when it was the broadcaster (the
    /// broadcast session is cleared as a side effect)
    pub fn remove(&mut self, id: ConnectionId) -> bool {
        self.connections.remove(&id);
        if self.broadcaster.as_ref().is_some_and(|s| s.id == id) {
            self.broadcaster = None;
            true
        } else {
            false
        }
    }

    /// Deliver a message to one connection. A missing destination or a
    /// closed queue is an expected race and reports `false` instead of
    /// erroring.
    pub fn send_to(&self, id: ConnectionId, message: ServerMessage) -> bool {
        match self.connections.get(&id) {
            Some(entry) => entry.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Deliver a message to every connection except `except`
    pub fn broadcast_except(&self, except: ConnectionId, message: &ServerMessage) {
        for (id, entry) in &self.connections {
            if *id != except {
                let _ = entry.sender.send(message.clone());
            }
        }
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn connect(dir: &mut ConnectionDirectory) -> (ConnectionId, mpsc::UnboundedReceiver<ServerMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        dir.register(id, tx);
        (id, rx)
    }

    #[test]
    fn test_register_and_role() {
        let mut dir = ConnectionDirectory::new();
        let (id, _rx) = connect(&mut dir);

        assert_eq!(dir.role(id), Some(Role::Unassigned));
        dir.set_role(id, Role::Watcher, None);
        assert_eq!(dir.role(id), Some(Role::Watcher));
    }

    #[test]
    fn test_broadcaster_slot_replacement() {
        let mut dir = ConnectionDirectory::new();
        let (first, _rx1) = connect(&mut dir);
        let (second, _rx2) = connect(&mut dir);

        let replaced = dir.set_role(first, Role::Broadcaster, Some("a".into()));
        assert!(replaced.is_none());
        assert_eq!(dir.lookup_broadcaster().unwrap().id, first);

        let replaced = dir.set_role(second, Role::Broadcaster, Some("b".into()));
        assert_eq!(replaced.unwrap().id, first);
        assert_eq!(dir.lookup_broadcaster().unwrap().id, second);
        assert_eq!(dir.role(first), Some(Role::Unassigned));
    }

    #[test]
    fn test_remove_clears_broadcaster() {
        let mut dir = ConnectionDirectory::new();
        let (id, _rx) = connect(&mut dir);

        dir.set_role(id, Role::Broadcaster, None);
        assert!(dir.remove(id));
        assert!(dir.lookup_broadcaster().is_none());
        assert_eq!(dir.role(id), None);
    }

    #[test]
    fn test_remove_watcher_keeps_broadcaster() {
        let mut dir = ConnectionDirectory::new();
        let (b, _rx1) = connect(&mut dir);
        let (w, _rx2) = connect(&mut dir);

        dir.set_role(b, Role::Broadcaster, None);
        dir.set_role(w, Role::Watcher, None);
        assert!(!dir.remove(w));
        assert_eq!(dir.lookup_broadcaster().unwrap().id, b);
    }

    #[test]
    fn test_send_to_missing_destination_is_silent() {
        let dir = ConnectionDirectory::new();
        assert!(!dir.send_to(Uuid::new_v4(), ServerMessage::NoBroadcaster));
    }

    #[test]
    fn test_broadcast_except_skips_sender() {
        let mut dir = ConnectionDirectory::new();
        let (a, mut rx_a) = connect(&mut dir);
        let (_b, mut rx_b) = connect(&mut dir);

        dir.broadcast_except(a, &ServerMessage::BroadcasterStopped);
        assert!(rx_a.try_recv().is_err());
        assert_eq!(rx_b.try_recv().unwrap(), ServerMessage::BroadcasterStopped);
    }
}
