//! Per-client undo/redo history.
//!
//! One entry is one user gesture. It records the selection on both sides of
//! the gesture and whether the gesture produced a layer store undo step;
//! layer data itself is restored by the store.

use crate::layers::LayerId;

/// One undoable gesture.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryEntry {
    pub selection_before: Vec<LayerId>,
    pub selection_after: Vec<LayerId>,
    /// The gesture left exactly one undo step in the layer store.
    pub touches_store: bool,
}

impl HistoryEntry {
    /// Whether undoing this entry would change nothing.
    pub fn is_noop(&self) -> bool {
        !self.touches_store && self.selection_before == self.selection_after
    }
}

/// Bounded undo and redo stacks of [`HistoryEntry`].
#[derive(Debug, Clone)]
pub struct History {
    undo_stack: Vec<HistoryEntry>,
    redo_stack: Vec<HistoryEntry>,
    max_entries: usize,
}

impl History {
    pub fn new(max_entries: usize) -> Self {
        Self {
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
            max_entries: max_entries.max(1),
        }
    }

    /// Record a finished gesture. No-op gestures are dropped.
    ///
    /// Returns whether the entry was recorded.
    pub fn push(&mut self, entry: HistoryEntry) -> bool {
        if entry.is_noop() {
            return false;
        }
        self.undo_stack.push(entry);
        self.redo_stack.clear();
        if self.undo_stack.len() > self.max_entries {
            self.undo_stack.remove(0);
        }
        true
    }

    /// Move the newest entry onto the redo stack and return it.
    pub fn undo(&mut self) -> Option<HistoryEntry> {
        let entry = self.undo_stack.pop()?;
        self.redo_stack.push(entry.clone());
        Some(entry)
    }

    /// Move the newest undone entry back onto the undo stack and return it.
    pub fn redo(&mut self) -> Option<HistoryEntry> {
        let entry = self.redo_stack.pop()?;
        self.undo_stack.push(entry.clone());
        Some(entry)
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_count(&self) -> usize {
        self.redo_stack.len()
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(100)
    }
}
