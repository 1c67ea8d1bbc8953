//! Live-connection registry used to push messages to participants.

use crate::protocol::{Outbound, ServerMessage};
use crate::session::PlayerId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc;
use tracing::{debug, instrument, warn};

/// Outbound half of a connection.
pub type ConnectionHandle = mpsc::UnboundedSender<Outbound>;

/// Maps a participant identity to its live outbound channel.
///
/// Lookup only; it never owns game state. Registering an identity twice
/// keeps the latest handle.
#[derive(Debug, Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<RwLock<HashMap<PlayerId, ConnectionHandle>>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the handle for `player_id`.
    #[instrument(skip(self, handle))]
    pub fn register(&self, player_id: PlayerId, handle: ConnectionHandle) {
        self.connections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(player_id, handle);
        debug!("Connection registered");
    }

    /// Forgets `player_id`. No-op if absent.
    #[instrument(skip(self))]
    pub fn unregister(&self, player_id: &str) {
        let removed = self
            .connections
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(player_id);
        if removed.is_some() {
            debug!("Connection unregistered");
        }
    }

    /// Gets the handle for `player_id`.
    pub fn get(&self, player_id: &str) -> Option<ConnectionHandle> {
        self.connections
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(player_id)
            .cloned()
    }

    /// True when `player_id` has a registered handle.
    pub fn contains(&self, player_id: &str) -> bool {
        self.get(player_id).is_some()
    }

    /// Pushes `message` to `player_id`.
    ///
    /// Unknown or closed connections are logged and skipped; returns whether
    /// the message was queued.
    #[instrument(skip(self, message))]
    pub fn send(&self, player_id: &str, message: ServerMessage) -> bool {
        let Some(handle) = self.get(player_id) else {
            debug!("No live connection, dropping message");
            return false;
        };
        match handle.send(Outbound::Message(message)) {
            Ok(()) => true,
            Err(_) => {
                warn!("Connection closed, dropping message");
                false
            }
        }
    }
}
