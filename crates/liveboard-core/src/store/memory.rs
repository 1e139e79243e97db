//! Single-replica layer store with snapshot undo.

use super::{LayerSnapshot, LayerStore, StoreEvent};
use crate::error::{CanvasError, CanvasResult};
use crate::events::Subscribers;
use crate::layers::{Layer, LayerId, LayerPatch};
use std::collections::HashMap;
use std::sync::mpsc::Receiver;

/// Default number of undo steps kept.
const MAX_UNDO_HISTORY: usize = 100;

/// Layers and z-order as they were before a mutation.
#[derive(Debug, Clone)]
struct StoreState {
    layers: HashMap<LayerId, Layer>,
    layer_ids: Vec<LayerId>,
}

/// In-memory [`LayerStore`] for a canvas nobody else edits.
#[derive(Debug)]
pub struct MemoryLayerStore {
    layers: HashMap<LayerId, Layer>,
    layer_ids: Vec<LayerId>,
    undo_stack: Vec<StoreState>,
    redo_stack: Vec<StoreState>,
    max_undo_steps: usize,
    /// Open batch depth.
    batch_depth: usize,
    /// State captured when the outermost batch opened.
    batch_start: Option<StoreState>,
    /// Whether the open batch mutated anything.
    batch_dirty: bool,
    subscribers: Subscribers<StoreEvent>,
}

impl Default for MemoryLayerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLayerStore {
    pub fn new() -> Self {
        Self::with_max_undo_steps(MAX_UNDO_HISTORY)
    }

    pub fn with_max_undo_steps(max_undo_steps: usize) -> Self {
        Self {
            layers: HashMap::new(),
            layer_ids: Vec::new(),
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_undo_steps: max_undo_steps.max(1),
            batch_depth: 0,
            batch_start: None,
            batch_dirty: false,
            subscribers: Subscribers::new(),
        }
    }

    fn state(&self) -> StoreState {
        StoreState {
            layers: self.layers.clone(),
            layer_ids: self.layer_ids.clone(),
        }
    }

    fn restore(&mut self, state: StoreState) {
        self.layers = state.layers;
        self.layer_ids = state.layer_ids;
    }

    fn push_undo(&mut self, state: StoreState) {
        self.undo_stack.push(state);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_undo_steps {
            self.undo_stack.remove(0);
        }
    }

    /// Record the pre-mutation state, either as its own step or into the open batch.
    fn before_mutation(&mut self) {
        if self.batch_depth > 0 {
            self.batch_dirty = true;
        } else {
            let state = self.state();
            self.push_undo(state);
        }
    }

    fn position(&self, id: &LayerId) -> CanvasResult<usize> {
        self.layer_ids
            .iter()
            .position(|other| other == id)
            .ok_or_else(|| CanvasError::NotFound(id.clone()))
    }

    fn reorder(&mut self, id: &LayerId, target: impl FnOnce(usize, usize) -> usize) -> CanvasResult<bool> {
        let pos = self.position(id)?;
        let to = target(pos, self.layer_ids.len());
        if to == pos {
            return Ok(false);
        }
        self.before_mutation();
        let moved = self.layer_ids.remove(pos);
        self.layer_ids.insert(to, moved);
        self.subscribers.publish(StoreEvent::Reordered);
        Ok(true)
    }
}

impl LayerStore for MemoryLayerStore {
    fn get(&self, id: &LayerId) -> Option<Layer> {
        self.layers.get(id).cloned()
    }

    fn contains(&self, id: &LayerId) -> bool {
        self.layers.contains_key(id)
    }

    fn snapshot(&self) -> LayerSnapshot {
        LayerSnapshot::from_parts(self.layer_ids.clone(), self.layers.clone())
    }

    fn len(&self) -> usize {
        self.layer_ids.len()
    }

    fn insert(&mut self, id: LayerId, layer: Layer) -> CanvasResult<()> {
        if self.layers.contains_key(&id) {
            return Err(CanvasError::InvalidInput(format!("layer {id} already exists")));
        }
        self.before_mutation();
        self.layer_ids.push(id.clone());
        self.layers.insert(id.clone(), layer);
        self.subscribers.publish(StoreEvent::Inserted(id));
        Ok(())
    }

    fn patch(&mut self, id: &LayerId, patch: &LayerPatch) -> CanvasResult<()> {
        if !self.layers.contains_key(id) {
            return Err(CanvasError::NotFound(id.clone()));
        }
        if patch.is_empty() {
            return Ok(());
        }
        self.before_mutation();
        if let Some(layer) = self.layers.get_mut(id) {
            layer.apply_patch(patch);
        }
        self.subscribers.publish(StoreEvent::Patched(id.clone()));
        Ok(())
    }

    fn delete(&mut self, id: &LayerId) -> CanvasResult<()> {
        if !self.layers.contains_key(id) {
            return Err(CanvasError::NotFound(id.clone()));
        }
        self.before_mutation();
        self.layers.remove(id);
        self.layer_ids.retain(|other| other != id);
        self.subscribers.publish(StoreEvent::Deleted(id.clone()));
        Ok(())
    }

    fn bring_to_front(&mut self, id: &LayerId) -> CanvasResult<bool> {
        self.reorder(id, |_, len| len - 1)
    }

    fn send_to_back(&mut self, id: &LayerId) -> CanvasResult<bool> {
        self.reorder(id, |_, _| 0)
    }

    fn bring_forward(&mut self, id: &LayerId) -> CanvasResult<bool> {
        self.reorder(id, |pos, len| (pos + 1).min(len - 1))
    }

    fn send_backward(&mut self, id: &LayerId) -> CanvasResult<bool> {
        self.reorder(id, |pos, _| pos.saturating_sub(1))
    }

    fn begin_batch(&mut self) {
        if self.batch_depth == 0 {
            self.batch_start = Some(self.state());
            self.batch_dirty = false;
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
            if let Some(state) = self.batch_start.take() {
                if self.batch_dirty {
                    self.push_undo(state);
                }
            }
            self.batch_dirty = false;
        }
    }

    fn undo(&mut self) -> CanvasResult<bool> {
        let Some(state) = self.undo_stack.pop() else {
            return Ok(false);
        };
        let current = self.state();
        self.redo_stack.push(current);
        self.restore(state);
        self.subscribers.publish(StoreEvent::Reloaded);
        Ok(true)
    }

    fn redo(&mut self) -> CanvasResult<bool> {
        let Some(state) = self.redo_stack.pop() else {
            return Ok(false);
        };
        let current = self.state();
        self.undo_stack.push(current);
        self.restore(state);
        self.subscribers.publish(StoreEvent::Reloaded);
        Ok(true)
    }

    fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    fn set_max_undo_steps(&mut self, steps: usize) {
        self.max_undo_steps = steps.max(1);
        let excess = self.undo_stack.len().saturating_sub(self.max_undo_steps);
        self.undo_stack.drain(..excess);
    }

    fn subscribe(&mut self) -> Receiver<StoreEvent> {
        self.subscribers.subscribe()
    }
}
