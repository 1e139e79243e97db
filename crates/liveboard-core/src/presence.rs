//! Selection and presence: per-user ephemeral state broadcast to collaborators.
//!
//! Every connection owns exactly one [`Presence`] entry. The local entry is
//! only written by this client; remote entries are only written by updates
//! arriving through a [`PresenceChannel`]. Nothing here is persisted or undone
//! by the layer store.

use crate::color::Color;
use crate::error::CanvasResult;
use crate::events::Subscribers;
use crate::layers::{LayerId, PenPoint};
use crate::store::LayerSnapshot;
use kurbo::Point;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::mpsc::Receiver;
use std::sync::{Arc, Mutex, MutexGuard};

/// Identifies one live connection to a board.
pub type ConnectionId = u64;

/// Authenticated user attached to a canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Stable user identifier from the identity provider.
    pub subject: String,
    /// Display name.
    pub name: String,
}

impl Identity {
    pub fn new(subject: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            name: name.into(),
        }
    }
}

/// One user's ephemeral state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Presence {
    /// Selected layer ids, in selection order.
    #[serde(default)]
    pub selection: Vec<LayerId>,
    /// Pointer position in canvas coordinates, `None` when off canvas.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<Point>,
    /// Absolute samples of a stroke still being drawn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pencil_draft: Option<Vec<PenPoint>>,
    /// Color of the pencil, so others can preview the draft.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pen_color: Option<Color>,
}

/// Change to another connection's presence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceUpdate {
    Updated {
        connection_id: ConnectionId,
        presence: Presence,
    },
    Left {
        connection_id: ConnectionId,
    },
}

impl PresenceUpdate {
    pub fn connection_id(&self) -> ConnectionId {
        match self {
            PresenceUpdate::Updated { connection_id, .. } => *connection_id,
            PresenceUpdate::Left { connection_id } => *connection_id,
        }
    }
}

/// My presence plus the last known presence of every other connection.
#[derive(Debug, Clone)]
pub struct PresenceState {
    connection_id: ConnectionId,
    me: Presence,
    others: BTreeMap<ConnectionId, Presence>,
}

impl PresenceState {
    pub fn new(connection_id: ConnectionId) -> Self {
        Self {
            connection_id,
            me: Presence::default(),
            others: BTreeMap::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn me(&self) -> &Presence {
        &self.me
    }

    pub fn selection(&self) -> &[LayerId] {
        &self.me.selection
    }

    pub fn is_selected(&self, id: &LayerId) -> bool {
        self.me.selection.contains(id)
    }

    /// Replace the selection, dropping repeated ids. Returns whether it changed.
    pub fn set_selection(&mut self, ids: Vec<LayerId>) -> bool {
        let mut seen = HashSet::with_capacity(ids.len());
        let ids: Vec<LayerId> = ids.into_iter().filter(|id| seen.insert(id.clone())).collect();
        if ids == self.me.selection {
            return false;
        }
        self.me.selection = ids;
        true
    }

    /// Returns whether anything was selected.
    pub fn clear_selection(&mut self) -> bool {
        self.set_selection(Vec::new())
    }

    /// Drop selected ids that no longer resolve. Returns whether any were dropped.
    pub fn prune_selection(&mut self, snapshot: &LayerSnapshot) -> bool {
        let before = self.me.selection.len();
        self.me.selection.retain(|id| snapshot.layers.contains_key(id));
        let dropped = before - self.me.selection.len();
        if dropped > 0 {
            log::debug!("Dropped {dropped} stale ids from the selection");
        }
        dropped > 0
    }

    pub fn set_cursor(&mut self, cursor: Option<Point>) {
        self.me.cursor = cursor;
    }

    /// Start a new in-progress stroke.
    pub fn start_pencil_draft(&mut self, first: PenPoint, color: Color) {
        self.me.pencil_draft = Some(vec![first]);
        self.me.pen_color = Some(color);
    }

    /// Append a sample to the in-progress stroke. Ignored when no stroke is active.
    pub fn push_pencil_sample(&mut self, sample: PenPoint) -> bool {
        match self.me.pencil_draft.as_mut() {
            Some(draft) => {
                draft.push(sample);
                true
            }
            None => false,
        }
    }

    pub fn pencil_draft(&self) -> Option<&[PenPoint]> {
        self.me.pencil_draft.as_deref()
    }

    /// Clear the in-progress stroke, returning its samples.
    pub fn take_pencil_draft(&mut self) -> Option<Vec<PenPoint>> {
        self.me.pencil_draft.take()
    }

    /// Presence of every other connection, keyed by connection id.
    pub fn others(&self) -> &BTreeMap<ConnectionId, Presence> {
        &self.others
    }

    /// Apply an update from another connection.
    ///
    /// Updates addressed to my own connection are rejected: only this client
    /// writes its own entry.
    pub fn apply_remote(&mut self, update: PresenceUpdate) -> bool {
        if update.connection_id() == self.connection_id {
            log::warn!("Ignoring remote presence update for my own connection");
            return false;
        }
        match update {
            PresenceUpdate::Updated {
                connection_id,
                presence,
            } => {
                self.others.insert(connection_id, presence);
            }
            PresenceUpdate::Left { connection_id } => {
                self.others.remove(&connection_id);
            }
        }
        true
    }

    /// Forget a connection that left the board.
    pub fn remove_peer(&mut self, connection_id: ConnectionId) -> Option<Presence> {
        self.others.remove(&connection_id)
    }
}

/// Publish/subscribe transport for presence, separate from the layer store.
pub trait PresenceChannel {
    /// Broadcast the full presence of `connection_id` to every other connection.
    fn publish(&mut self, connection_id: ConnectionId, presence: &Presence) -> CanvasResult<()>;

    /// Receive updates about every connection except `connection_id`.
    fn subscribe(&mut self, connection_id: ConnectionId) -> Receiver<PresenceUpdate>;
}

#[derive(Debug, Default)]
struct HubInner {
    latest: BTreeMap<ConnectionId, Presence>,
    subscribers: BTreeMap<ConnectionId, Subscribers<PresenceUpdate>>,
}

impl HubInner {
    fn broadcast(&mut self, from: ConnectionId, update: PresenceUpdate) {
        for (connection_id, subscribers) in self.subscribers.iter_mut() {
            if *connection_id != from {
                subscribers.publish(update.clone());
            }
        }
    }
}

/// In-process presence channel shared by every connection of one board.
///
/// Clones share the same hub.
#[derive(Debug, Clone, Default)]
pub struct PresenceHub {
    inner: Arc<Mutex<HubInner>>,
}

impl PresenceHub {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HubInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Drop a connection and tell everyone else it left.
    pub fn leave(&self, connection_id: ConnectionId) {
        let mut inner = self.lock();
        inner.latest.remove(&connection_id);
        inner.subscribers.remove(&connection_id);
        inner.broadcast(connection_id, PresenceUpdate::Left { connection_id });
    }

    /// Number of connections that have published at least once.
    pub fn connection_count(&self) -> usize {
        self.lock().latest.len()
    }
}

impl PresenceChannel for PresenceHub {
    fn publish(&mut self, connection_id: ConnectionId, presence: &Presence) -> CanvasResult<()> {
        let mut inner = self.lock();
        inner.latest.insert(connection_id, presence.clone());
        inner.broadcast(
            connection_id,
            PresenceUpdate::Updated {
                connection_id,
                presence: presence.clone(),
            },
        );
        Ok(())
    }

    fn subscribe(&mut self, connection_id: ConnectionId) -> Receiver<PresenceUpdate> {
        let mut inner = self.lock();
        // Late joiners start from everyone's current state.
        let current: Vec<PresenceUpdate> = inner
            .latest
            .iter()
            .filter(|(other, _)| **other != connection_id)
            .map(|(other, presence)| PresenceUpdate::Updated {
                connection_id: *other,
                presence: presence.clone(),
            })
            .collect();
        inner
            .subscribers
            .entry(connection_id)
            .or_default()
            .subscribe_with(current)
    }
}
