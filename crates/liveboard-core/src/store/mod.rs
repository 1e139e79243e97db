//! Layer store: the shared map of layers plus their z-order.
//!
//! # Model
//!
//! ```text
//! LayerStore
//! ├── layers:    LayerId -> Layer   (fields merge last-writer-wins, per field)
//! └── layer_ids: [LayerId]          (z-order, index 0 is the back)
//! ```
//!
//! Inserting a layer appends its id to the order and deleting one removes it
//! from both places in a single operation. Readers always go through a
//! [`LayerSnapshot`], which hides ids whose layer is missing (and duplicate
//! ids), so a half-merged order never leaks into hit-testing or rendering.
//!
//! Two implementations are provided: [`MemoryLayerStore`] for a single local
//! canvas and [`CrdtLayerStore`], backed by a Loro document, for shared boards.

mod convert;
mod crdt;
mod memory;

pub use convert::{layer_from_loro, layer_to_loro, patch_to_loro};
pub use crdt::{CrdtLayerStore, LAYERS_KEY, LAYER_IDS_KEY};
pub use memory::MemoryLayerStore;

// Re-export Loro types needed by collaboration callers.
pub use loro::VersionVector;

use crate::error::CanvasResult;
use crate::geometry::{self, Xywh};
use crate::layers::{Layer, LayerId, LayerPatch};
use kurbo::Point;
use std::collections::{HashMap, HashSet};
use std::sync::mpsc::Receiver;

/// Change notification emitted by a store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Inserted(LayerId),
    Patched(LayerId),
    Deleted(LayerId),
    /// The z-order changed without layers being added or removed.
    Reordered,
    /// Arbitrary changes landed at once (undo, redo or a remote import).
    Reloaded,
}

/// Operations every layer store supports.
pub trait LayerStore {
    /// Current value of one layer.
    fn get(&self, id: &LayerId) -> Option<Layer>;

    fn contains(&self, id: &LayerId) -> bool {
        self.get(id).is_some()
    }

    /// Consistent read of all layers in z-order.
    fn snapshot(&self) -> LayerSnapshot;

    /// Ids in z-order, back to front.
    fn layer_ids(&self) -> Vec<LayerId> {
        self.snapshot().ids
    }

    fn len(&self) -> usize {
        self.layer_ids().len()
    }

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Add a layer on top of the z-order.
    ///
    /// Fails with `InvalidInput` if the id is already taken.
    fn insert(&mut self, id: LayerId, layer: Layer) -> CanvasResult<()>;

    /// Overwrite the fields present in `patch`. Fails with `NotFound` for unknown ids.
    fn patch(&mut self, id: &LayerId, patch: &LayerPatch) -> CanvasResult<()>;

    /// Remove a layer from the map and the z-order. Fails with `NotFound` for unknown ids.
    fn delete(&mut self, id: &LayerId) -> CanvasResult<()>;

    /// Move a layer to the top of the z-order. Returns false if it already was there.
    fn bring_to_front(&mut self, id: &LayerId) -> CanvasResult<bool>;

    /// Move a layer to the bottom of the z-order. Returns false if it already was there.
    fn send_to_back(&mut self, id: &LayerId) -> CanvasResult<bool>;

    /// Swap a layer with the one above it.
    fn bring_forward(&mut self, id: &LayerId) -> CanvasResult<bool>;

    /// Swap a layer with the one below it.
    fn send_backward(&mut self, id: &LayerId) -> CanvasResult<bool>;

    /// Start grouping mutations into one undo step. Batches nest.
    fn begin_batch(&mut self);

    /// Close the batch opened by the matching [`begin_batch`](Self::begin_batch).
    fn end_batch(&mut self);

    /// Revert the last local undo step. Returns false if there was none.
    fn undo(&mut self) -> CanvasResult<bool>;

    /// Reapply the last undone step. Returns false if there was none.
    fn redo(&mut self) -> CanvasResult<bool>;

    fn undo_count(&self) -> usize;

    /// Cap the number of undo steps kept, dropping the oldest beyond it.
    fn set_max_undo_steps(&mut self, steps: usize);

    fn redo_count(&self) -> usize;

    /// Receive a [`StoreEvent`] for every subsequent change.
    fn subscribe(&mut self) -> Receiver<StoreEvent>;
}

/// Point-in-time view of the store.
///
/// `ids` only contains ids that resolve in `layers`, each exactly once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayerSnapshot {
    pub ids: Vec<LayerId>,
    pub layers: HashMap<LayerId, Layer>,
}

impl LayerSnapshot {
    /// Build a snapshot from a raw order and map.
    ///
    /// Unresolvable and repeated ids are dropped; layers missing from the
    /// order are appended on top, sorted by id so every replica agrees.
    pub fn from_parts(order: Vec<LayerId>, layers: HashMap<LayerId, Layer>) -> Self {
        let mut seen = HashSet::with_capacity(order.len());
        let mut ids: Vec<LayerId> = order
            .into_iter()
            .filter(|id| layers.contains_key(id) && seen.insert(id.clone()))
            .collect();

        let mut orphans: Vec<LayerId> = layers
            .keys()
            .filter(|id| !seen.contains(*id))
            .cloned()
            .collect();
        if !orphans.is_empty() {
            log::debug!("{} layers missing from the z-order", orphans.len());
            orphans.sort();
            ids.extend(orphans);
        }

        Self { ids, layers }
    }

    pub fn get(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.get(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Layers in z-order, back to front.
    pub fn iter(&self) -> impl Iterator<Item = (&LayerId, &Layer)> {
        self.ids
            .iter()
            .filter_map(|id| self.layers.get(id).map(|layer| (id, layer)))
    }

    /// Position of `id` in the z-order.
    pub fn index_of(&self, id: &LayerId) -> Option<usize> {
        self.ids.iter().position(|other| other == id)
    }

    /// Bounding box of the given layers; ids that do not resolve are ignored.
    pub fn bounds_of(&self, ids: &[LayerId]) -> Option<Xywh> {
        geometry::bounding_box(ids.iter().filter_map(|id| self.layers.get(id)))
    }

    /// Topmost layer under `point`.
    pub fn topmost_at(&self, point: Point, tolerance: f64) -> Option<LayerId> {
        geometry::topmost_layer_at(&self.ids, &self.layers, point, tolerance)
    }

    /// Layers overlapping the rectangle spanned by `a` and `b`, in z-order.
    pub fn intersecting(&self, a: Point, b: Point) -> Vec<LayerId> {
        geometry::find_intersecting_layers_with_rectangle(&self.ids, &self.layers, a, b)
    }

    /// `ids` reordered by z-order, dropping those that do not resolve.
    pub fn sort_by_z(&self, ids: &[LayerId]) -> Vec<LayerId> {
        self.ids.iter().filter(|id| ids.contains(id)).cloned().collect()
    }
}
