//! Replicated layer store backed by a Loro document.

use super::convert::{layer_from_loro, layer_to_loro, patch_to_loro};
use super::{LayerSnapshot, LayerStore, StoreEvent};
use crate::error::{CanvasError, CanvasResult};
use crate::events::Subscribers;
use crate::layers::{Layer, LayerId, LayerPatch};
use loro::{
    Container, ExportMode, LoroDoc, LoroList, LoroMap, LoroValue, UndoManager, ValueOrContainer,
    VersionVector,
};
use std::collections::HashMap;
use std::sync::mpsc::Receiver;

/// Key of the id -> layer map in the document.
pub const LAYERS_KEY: &str = "layers";
/// Key of the z-order list in the document.
pub const LAYER_IDS_KEY: &str = "layer_ids";

/// Default number of undo steps kept.
const MAX_UNDO_STEPS: usize = 100;

/// A [`LayerStore`] whose state is a CRDT document.
///
/// Local edits are committed immediately; use [`export_updates`](Self::export_updates)
/// and [`import`](Self::import) to exchange them with other replicas. Undo only
/// reverts this replica's own edits.
pub struct CrdtLayerStore {
    doc: LoroDoc,
    undo_manager: UndoManager,
    batch_depth: usize,
    subscribers: Subscribers<StoreEvent>,
}

impl CrdtLayerStore {
    /// Create an empty store with a random peer id.
    pub fn new() -> Self {
        Self::from_doc(LoroDoc::new(), MAX_UNDO_STEPS)
    }

    /// Create an empty store with a fixed peer id.
    pub fn with_peer_id(peer_id: u64) -> CanvasResult<Self> {
        let doc = LoroDoc::new();
        doc.set_peer_id(peer_id)?;
        Ok(Self::from_doc(doc, MAX_UNDO_STEPS))
    }

    /// Create a store from a snapshot exported by another replica.
    pub fn from_snapshot(bytes: &[u8]) -> CanvasResult<Self> {
        let doc = LoroDoc::new();
        doc.import(bytes)?;
        Ok(Self::from_doc(doc, MAX_UNDO_STEPS))
    }

    fn from_doc(doc: LoroDoc, max_undo_steps: usize) -> Self {
        let mut undo_manager = UndoManager::new(&doc);
        undo_manager.set_max_undo_steps(max_undo_steps);
        // Steps are delimited by explicit batches, never by timing.
        undo_manager.set_merge_interval(0);
        Self {
            doc,
            undo_manager,
            batch_depth: 0,
            subscribers: Subscribers::new(),
        }
    }

    pub fn loro_doc(&self) -> &LoroDoc {
        &self.doc
    }

    pub fn peer_id(&self) -> u64 {
        self.doc.peer_id()
    }

    fn layers_map(&self) -> LoroMap {
        self.doc.get_map(LAYERS_KEY)
    }

    fn layer_ids_list(&self) -> LoroList {
        self.doc.get_list(LAYER_IDS_KEY)
    }

    /// Container holding one layer's fields.
    fn layer_map(&self, id: &LayerId) -> Option<LoroMap> {
        match self.layers_map().get(id.as_str())? {
            ValueOrContainer::Container(Container::Map(map)) => Some(map),
            _ => None,
        }
    }

    /// Raw z-order, possibly holding dangling or repeated ids.
    fn raw_order(&self) -> Vec<LayerId> {
        let list = self.layer_ids_list();
        let mut result = Vec::with_capacity(list.len());
        for i in 0..list.len() {
            if let Some(ValueOrContainer::Value(LoroValue::String(id))) = list.get(i) {
                result.push(LayerId::from(id.to_string()));
            }
        }
        result
    }

    fn order_positions(&self, id: &LayerId) -> Vec<usize> {
        self.raw_order()
            .iter()
            .enumerate()
            .filter(|(_, other)| *other == id)
            .map(|(i, _)| i)
            .collect()
    }

    /// Delete every occurrence of `id` from the z-order list.
    fn remove_from_order(&self, id: &LayerId) -> CanvasResult<()> {
        let list = self.layer_ids_list();
        for i in self.order_positions(id).into_iter().rev() {
            list.delete(i, 1)?;
        }
        Ok(())
    }

    fn commit(&mut self, event: StoreEvent) {
        self.doc.commit();
        self.subscribers.publish(event);
    }

    /// Move `id` to `index` of the de-duplicated order.
    fn move_to(&mut self, id: &LayerId, target: impl FnOnce(usize, usize) -> usize) -> CanvasResult<bool> {
        let snapshot = self.snapshot();
        let pos = snapshot
            .index_of(id)
            .ok_or_else(|| CanvasError::NotFound(id.clone()))?;
        let to = target(pos, snapshot.len());
        if to == pos {
            return Ok(false);
        }

        // Translate the neighbour into a raw list index before mutating.
        let anchor = if to > pos {
            snapshot.ids.get(to + 1).cloned()
        } else {
            snapshot.ids.get(to).cloned()
        };

        self.remove_from_order(id)?;
        let list = self.layer_ids_list();
        let index = match anchor {
            Some(anchor) => self
                .raw_order()
                .iter()
                .position(|other| *other == anchor)
                .unwrap_or(list.len()),
            None => list.len(),
        };
        list.insert(index, id.as_str())?;
        self.commit(StoreEvent::Reordered);
        Ok(true)
    }

    /// Full document state.
    pub fn export_snapshot(&self) -> CanvasResult<Vec<u8>> {
        self.doc
            .export(ExportMode::Snapshot)
            .map_err(|err| CanvasError::Crdt(err.to_string()))
    }

    /// Operations since `since`.
    pub fn export_updates(&self, since: &VersionVector) -> CanvasResult<Vec<u8>> {
        self.doc
            .export(ExportMode::updates(since))
            .map_err(|err| CanvasError::Crdt(err.to_string()))
    }

    /// Merge a snapshot or update from another replica.
    pub fn import(&mut self, bytes: &[u8]) -> CanvasResult<()> {
        self.doc.import(bytes)?;
        self.subscribers.publish(StoreEvent::Reloaded);
        Ok(())
    }

    /// Current version vector.
    pub fn version(&self) -> VersionVector {
        self.doc.oplog_vv()
    }
}

impl Default for CrdtLayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for CrdtLayerStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrdtLayerStore")
            .field("peer_id", &self.doc.peer_id())
            .field("layers", &self.layers_map().len())
            .finish()
    }
}

impl LayerStore for CrdtLayerStore {
    fn get(&self, id: &LayerId) -> Option<Layer> {
        match self.layer_map(id)?.get_deep_value() {
            LoroValue::Map(map) => layer_from_loro(&map),
            _ => None,
        }
    }

    fn snapshot(&self) -> LayerSnapshot {
        let mut layers = HashMap::new();
        if let LoroValue::Map(map) = self.layers_map().get_deep_value() {
            for (id, value) in map.iter() {
                let LoroValue::Map(fields) = value else {
                    continue;
                };
                match layer_from_loro(fields) {
                    Some(layer) => {
                        layers.insert(LayerId::from(id.as_str()), layer);
                    }
                    None => log::warn!("Skipping malformed layer {id}"),
                }
            }
        }
        LayerSnapshot::from_parts(self.raw_order(), layers)
    }

    fn insert(&mut self, id: LayerId, layer: Layer) -> CanvasResult<()> {
        if self.layer_map(&id).is_some() {
            return Err(CanvasError::InvalidInput(format!("layer {id} already exists")));
        }
        let layer_map = self.layers_map().insert_container(id.as_str(), LoroMap::new())?;
        layer_to_loro(&layer, &layer_map)?;
        self.layer_ids_list().push(id.as_str())?;
        self.commit(StoreEvent::Inserted(id));
        Ok(())
    }

    fn patch(&mut self, id: &LayerId, patch: &LayerPatch) -> CanvasResult<()> {
        let layer_map = self
            .layer_map(id)
            .ok_or_else(|| CanvasError::NotFound(id.clone()))?;
        if patch.is_empty() {
            return Ok(());
        }
        patch_to_loro(patch, &layer_map)?;
        self.commit(StoreEvent::Patched(id.clone()));
        Ok(())
    }

    fn delete(&mut self, id: &LayerId) -> CanvasResult<()> {
        if self.layer_map(id).is_none() {
            return Err(CanvasError::NotFound(id.clone()));
        }
        self.layers_map().delete(id.as_str())?;
        self.remove_from_order(id)?;
        self.commit(StoreEvent::Deleted(id.clone()));
        Ok(())
    }

    fn bring_to_front(&mut self, id: &LayerId) -> CanvasResult<bool> {
        self.move_to(id, |_, len| len - 1)
    }

    fn send_to_back(&mut self, id: &LayerId) -> CanvasResult<bool> {
        self.move_to(id, |_, _| 0)
    }

    fn bring_forward(&mut self, id: &LayerId) -> CanvasResult<bool> {
        self.move_to(id, |pos, len| (pos + 1).min(len - 1))
    }

    fn send_backward(&mut self, id: &LayerId) -> CanvasResult<bool> {
        self.move_to(id, |pos, _| pos.saturating_sub(1))
    }

    fn begin_batch(&mut self) {
        if self.batch_depth == 0 {
            if let Err(err) = self.undo_manager.group_start() {
                log::warn!("Failed to open undo group: {err}");
            }
        }
        self.batch_depth += 1;
    }

    fn end_batch(&mut self) {
        if self.batch_depth == 0 {
            log::warn!("end_batch called without a matching begin_batch");
            return;
        }
        self.batch_depth -= 1;
        if self.batch_depth == 0 {
            self.undo_manager.group_end();
        }
    }

    fn undo(&mut self) -> CanvasResult<bool> {
        let undone = self.undo_manager.undo()?;
        if undone {
            self.subscribers.publish(StoreEvent::Reloaded);
        }
        Ok(undone)
    }

    fn redo(&mut self) -> CanvasResult<bool> {
        let redone = self.undo_manager.redo()?;
        if redone {
            self.subscribers.publish(StoreEvent::Reloaded);
        }
        Ok(redone)
    }

    fn undo_count(&self) -> usize {
        self.undo_manager.undo_count()
    }

    fn redo_count(&self) -> usize {
        self.undo_manager.redo_count()
    }

    fn set_max_undo_steps(&mut self, steps: usize) {
        self.undo_manager.set_max_undo_steps(steps);
    }

    fn subscribe(&mut self) -> Receiver<StoreEvent> {
        self.subscribers.subscribe()
    }
}
