//! Wire protocol between a canvas client and the relay server.
//!
//! Messages are JSON objects tagged by `type`. CRDT payloads travel as
//! base64 text inside the JSON.

use crate::error::{CanvasError, CanvasResult};
use crate::presence::{ConnectionId, Presence};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Messages sent to the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Join the room of a board
    Join { room: String },
    /// Leave current room
    Leave,
    /// CRDT update (base64 encoded Loro bytes)
    Sync { data: String },
    /// Full presence of the sending connection
    Presence {
        connection_id: ConnectionId,
        presence: Presence,
    },
}

/// Messages received from the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Confirm room join with current state
    Joined {
        room: String,
        peer_count: usize,
        /// Snapshot of the board (if the room has history)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        initial_sync: Option<String>,
    },
    /// Peer joined the room
    PeerJoined { connection_id: ConnectionId },
    /// Peer left the room
    PeerLeft { connection_id: ConnectionId },
    /// CRDT update from another peer
    Sync { from: ConnectionId, data: String },
    /// Presence of another peer
    Presence {
        from: ConnectionId,
        presence: Presence,
    },
    /// Error message
    Error { message: String },
}

impl ClientMessage {
    pub fn to_json(&self) -> CanvasResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CanvasResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl ServerMessage {
    pub fn to_json(&self) -> CanvasResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> CanvasResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// What an incoming server message did to the local replica.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Joined a room; `imported` is set when an initial snapshot was merged
    JoinedRoom {
        room: String,
        peer_count: usize,
        imported: bool,
    },
    PeerJoined { connection_id: ConnectionId },
    PeerLeft { connection_id: ConnectionId },
    /// Merged an update of `bytes` length
    SyncReceived { from: ConnectionId, bytes: usize },
    PresenceReceived { from: ConnectionId },
    Error { message: String },
}

/// Encode CRDT bytes for a JSON payload.
pub fn encode_payload(data: &[u8]) -> String {
    STANDARD.encode(data)
}

/// Decode a base64 JSON payload back into CRDT bytes.
pub fn decode_payload(data: &str) -> CanvasResult<Vec<u8>> {
    STANDARD
        .decode(data)
        .map_err(|err| CanvasError::InvalidInput(format!("bad base64 payload: {err}")))
}
