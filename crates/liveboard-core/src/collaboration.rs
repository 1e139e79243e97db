//! Collaboration management for real-time multi-user editing.
//!
//! The manager sits between a [`CrdtLayerStore`] and the transport. It never
//! owns a socket: outgoing messages are queued as JSON strings for the caller
//! to send, and incoming JSON is handed to [`CollaborationManager::handle_message`].

use crate::error::CanvasResult;
use crate::events::Subscribers;
use crate::presence::{ConnectionId, Presence, PresenceChannel, PresenceUpdate};
use crate::store::{CrdtLayerStore, VersionVector};
use crate::sync::{ClientMessage, ServerMessage, SyncEvent, decode_payload, encode_payload};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::Receiver;

/// Board metadata owned by the board store outside the canvas core.
///
/// Only `id` matters here: it names the room a session joins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardInfo {
    pub id: String,
    pub title: String,
    pub org_id: String,
    #[serde(default)]
    pub is_favorite: bool,
}

/// Queues outgoing sync/presence traffic and applies incoming messages.
pub struct CollaborationManager {
    /// Connection id; the store's peer id.
    connection_id: ConnectionId,
    /// Current room ID (if joined).
    current_room: Option<String>,
    /// Version already sent to the room.
    last_flushed: VersionVector,
    /// Pending outgoing messages (JSON strings).
    outgoing: Vec<String>,
    presence_subscribers: Subscribers<PresenceUpdate>,
}

impl CollaborationManager {
    /// Create a manager for the replica `store`.
    pub fn new(store: &CrdtLayerStore) -> Self {
        Self {
            connection_id: store.peer_id(),
            current_room: None,
            last_flushed: VersionVector::default(),
            outgoing: Vec::new(),
            presence_subscribers: Subscribers::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    // --- Room/Connection Management ---

    pub fn current_room(&self) -> Option<&str> {
        self.current_room.as_deref()
    }

    pub fn is_in_room(&self) -> bool {
        self.current_room.is_some()
    }

    /// Request to join the room of `board`.
    pub fn join_board(&mut self, board: &BoardInfo) -> CanvasResult<()> {
        self.join_room(&board.id)
    }

    /// Request to join a room. Queues the join message.
    pub fn join_room(&mut self, room: &str) -> CanvasResult<()> {
        self.queue(&ClientMessage::Join {
            room: room.to_string(),
        })
    }

    /// Leave the current room. Queues the leave message.
    pub fn leave_room(&mut self) -> CanvasResult<()> {
        if self.current_room.take().is_some() {
            self.queue(&ClientMessage::Leave)?;
        }
        Ok(())
    }

    fn queue(&mut self, msg: &ClientMessage) -> CanvasResult<()> {
        self.outgoing.push(msg.to_json()?);
        Ok(())
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outgoing)
    }

    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    // --- Sync Broadcast ---

    /// Queue the store's changes made since the last flush.
    ///
    /// Returns whether a sync message was queued. Nothing is sent outside a room.
    pub fn flush_updates(&mut self, store: &CrdtLayerStore) -> CanvasResult<bool> {
        if self.current_room.is_none() {
            return Ok(false);
        }
        let version = store.version();
        if version == self.last_flushed {
            return Ok(false);
        }
        let update = store.export_updates(&self.last_flushed)?;
        self.queue(&ClientMessage::Sync {
            data: encode_payload(&update),
        })?;
        self.last_flushed = version;
        Ok(true)
    }

    /// Decode and merge a remote payload into `store`.
    fn import(&mut self, store: &mut CrdtLayerStore, data: &str) -> CanvasResult<usize> {
        let bytes = decode_payload(data)?;
        let up_to_date = store.version() == self.last_flushed;
        store.import(&bytes)?;
        // Remote changes need no echo when nothing local was pending.
        if up_to_date {
            self.last_flushed = store.version();
        }
        Ok(bytes.len())
    }

    // --- Incoming Message Handling ---

    /// Handle an incoming server message.
    ///
    /// Returns a [`SyncEvent`] describing what happened, or `None` when the
    /// message was malformed or its payload could not be merged.
    pub fn handle_message(&mut self, json: &str, store: &mut CrdtLayerStore) -> Option<SyncEvent> {
        let msg = match ServerMessage::from_json(json) {
            Ok(msg) => msg,
            Err(err) => {
                log::warn!("Dropping malformed server message: {err}");
                return None;
            }
        };

        match msg {
            ServerMessage::Joined {
                room,
                peer_count,
                initial_sync,
            } => {
                self.current_room = Some(room.clone());
                let imported = match initial_sync {
                    Some(data) => match self.import(store, &data) {
                        Ok(_) => true,
                        Err(err) => {
                            log::warn!("Failed to import initial state of {room}: {err}");
                            false
                        }
                    },
                    None => false,
                };
                Some(SyncEvent::JoinedRoom {
                    room,
                    peer_count,
                    imported,
                })
            }
            ServerMessage::PeerJoined { connection_id } => {
                Some(SyncEvent::PeerJoined { connection_id })
            }
            ServerMessage::PeerLeft { connection_id } => {
                self.presence_subscribers
                    .publish(PresenceUpdate::Left { connection_id });
                Some(SyncEvent::PeerLeft { connection_id })
            }
            ServerMessage::Sync { from, data } => match self.import(store, &data) {
                Ok(bytes) => Some(SyncEvent::SyncReceived { from, bytes }),
                Err(err) => {
                    log::warn!("Failed to import update from {from}: {err}");
                    None
                }
            },
            ServerMessage::Presence { from, presence } => {
                if from == self.connection_id {
                    return None;
                }
                self.presence_subscribers.publish(PresenceUpdate::Updated {
                    connection_id: from,
                    presence,
                });
                Some(SyncEvent::PresenceReceived { from })
            }
            ServerMessage::Error { message } => {
                log::warn!("Server error: {message}");
                Some(SyncEvent::Error { message })
            }
        }
    }
}

impl PresenceChannel for CollaborationManager {
    /// Queue a presence broadcast. Outside a room this is a no-op.
    fn publish(&mut self, connection_id: ConnectionId, presence: &Presence) -> CanvasResult<()> {
        if self.current_room.is_none() {
            return Ok(());
        }
        self.queue(&ClientMessage::Presence {
            connection_id,
            presence: presence.clone(),
        })
    }

    fn subscribe(&mut self, _connection_id: ConnectionId) -> Receiver<PresenceUpdate> {
        // The server never echoes our own presence and `handle_message` filters it too.
        self.presence_subscribers.subscribe()
    }
}
