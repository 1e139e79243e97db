//! Canvas interaction state machine.
//!
//! [`Canvas`] turns pointer and keyboard events into layer store mutations
//! and presence changes. Exactly one [`CanvasState`] is active at a time;
//! every gesture either commits on pointer-up or is forced back to
//! [`CanvasState::None`] by a cancel, an Escape or a failed mutation.
//!
//! Everything between a pointer-down and its pointer-up is one store batch
//! and one [`History`] entry, so collaborators and undo never see half a drag.

use crate::camera::Camera;
use crate::color::{Color, Palette};
use crate::config::CanvasConfig;
use crate::error::{CanvasError, CanvasResult};
use crate::geometry::{self, Handle, Side, Xywh};
use crate::history::{History, HistoryEntry};
use crate::input::{Key, KeyEvent, MouseButton, PointerEvent};
use crate::layers::{Layer, LayerId, LayerPatch, LayerType, PenPoint};
use crate::presence::{ConnectionId, Identity, PresenceChannel, PresenceState, PresenceUpdate};
use crate::store::{LayerSnapshot, LayerStore, StoreEvent};
use crate::stroke::{pen_points_to_path_layer, stroke_outline};
use kurbo::{Point, Vec2};
use std::sync::mpsc::Receiver;

/// The active interaction mode and its payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CanvasState {
    /// Idle with the select tool.
    None,
    /// Pressed on empty canvas, not dragged far enough to start a net.
    Pressing { origin: Point },
    /// Dragging a selection rectangle from `origin`.
    SelectionNet { origin: Point, current: Point },
    /// Dragging the selection; `current` is the last applied pointer position.
    Translating { current: Point },
    /// Insert tool armed; the next pointer-up places a layer.
    Inserting { layer_type: LayerType },
    /// Dragging the `corner` handle of the single selected layer.
    Resizing { initial_bounds: Xywh, corner: Side },
    /// Freehand tool armed.
    Pencil,
}

impl CanvasState {
    /// Short mode name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            CanvasState::None => "none",
            CanvasState::Pressing { .. } => "pressing",
            CanvasState::SelectionNet { .. } => "selection-net",
            CanvasState::Translating { .. } => "translating",
            CanvasState::Inserting { .. } => "inserting",
            CanvasState::Resizing { .. } => "resizing",
            CanvasState::Pencil => "pencil",
        }
    }
}

/// A transient, dismissable failure message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub id: u64,
    pub message: String,
}

/// Bookkeeping for the gesture in flight.
#[derive(Debug, Clone)]
struct Gesture {
    selection_before: Vec<LayerId>,
    touched_store: bool,
}

/// One user's view of a shared board.
pub struct Canvas<S: LayerStore> {
    store: S,
    store_events: Receiver<StoreEvent>,
    presence: PresenceState,
    presence_dirty: bool,
    history: History,
    state: CanvasState,
    camera: Camera,
    config: CanvasConfig,
    palette: Palette,
    pen_color: Color,
    identity: Option<Identity>,
    gesture: Option<Gesture>,
    pointer_down: bool,
    notices: Vec<Notice>,
    next_notice_id: u64,
}

impl<S: LayerStore> Canvas<S> {
    /// Attach a canvas for connection `connection_id` to `store`.
    ///
    /// The store's undo capacity is set to `config.max_undo_steps`.
    pub fn new(mut store: S, connection_id: ConnectionId, config: CanvasConfig) -> Self {
        store.set_max_undo_steps(config.max_undo_steps);
        let store_events = store.subscribe();
        Self {
            store,
            store_events,
            presence: PresenceState::new(connection_id),
            presence_dirty: false,
            history: History::new(config.max_undo_steps),
            state: CanvasState::None,
            camera: Camera::new(),
            palette: config.palette(),
            config,
            pen_color: Color::black(),
            identity: None,
            gesture: None,
            pointer_down: false,
            notices: Vec::new(),
            next_notice_id: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Mutable store access for transport glue (imports, exports).
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn state(&self) -> CanvasState {
        self.state
    }

    pub fn presence(&self) -> &PresenceState {
        &self.presence
    }

    pub fn selection(&self) -> &[LayerId] {
        self.presence.selection()
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn config(&self) -> &CanvasConfig {
        &self.config
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    /// Attach (or detach) the user that mutations are attributed to.
    pub fn set_identity(&mut self, identity: Option<Identity>) {
        self.identity = identity;
    }

    pub fn pen_color(&self) -> Color {
        self.pen_color
    }

    pub fn set_pen_color(&mut self, color: Color) {
        self.pen_color = color;
    }

    /// Consistent read of every layer in z-order.
    pub fn layers(&self) -> LayerSnapshot {
        self.store.snapshot()
    }

    /// Bounding box of the current selection.
    pub fn selection_bounds(&self) -> Option<Xywh> {
        self.store.snapshot().bounds_of(self.presence.selection())
    }

    /// Resize handles, shown only while exactly one layer is selected.
    pub fn selection_handles(&self) -> Option<[Handle; 8]> {
        match self.presence.selection() {
            [_] => self.selection_bounds().map(geometry::selection_handles),
            _ => None,
        }
    }

    fn set_state(&mut self, state: CanvasState) {
        if self.state.name() != state.name() {
            log::debug!("Canvas mode {} -> {}", self.state.name(), state.name());
        }
        self.state = state;
    }

    // --- Tools ---

    /// Switch back to the select tool, abandoning any gesture.
    pub fn select_tool(&mut self) {
        self.reset_to_none();
    }

    /// Arm the insert tool. Paths can only be drawn with the pencil.
    pub fn insert_tool(&mut self, layer_type: LayerType) -> CanvasResult<()> {
        if !layer_type.is_insertable() {
            return Err(CanvasError::InvalidInput(format!(
                "{} layers cannot be inserted directly",
                layer_type.as_str()
            )));
        }
        self.reset_to_none();
        self.set_state(CanvasState::Inserting { layer_type });
        Ok(())
    }

    /// Arm the freehand tool.
    pub fn pencil_tool(&mut self) {
        self.reset_to_none();
        self.set_state(CanvasState::Pencil);
    }

    // --- Events ---

    /// Feed one pointer event.
    ///
    /// Races with concurrent deletes drop the gesture silently; any other
    /// failure is returned after resetting to [`CanvasState::None`] and
    /// queuing a [`Notice`].
    pub fn handle_pointer(&mut self, event: PointerEvent) -> CanvasResult<()> {
        self.refresh();
        let result = match event {
            PointerEvent::Down { button, .. } | PointerEvent::Up { button, .. }
                if button != MouseButton::Left =>
            {
                log::debug!("Ignoring {button:?} button");
                Ok(())
            }
            PointerEvent::Down {
                position, pressure, ..
            } => self.on_pointer_down(position, pressure),
            PointerEvent::Move { position, pressure } => self.on_pointer_move(position, pressure),
            PointerEvent::Up { position, .. } => self.on_pointer_up(position),
            PointerEvent::Cancel => {
                self.reset_to_none();
                Ok(())
            }
            PointerEvent::Leave => {
                self.presence.set_cursor(None);
                self.presence_dirty = true;
                Ok(())
            }
            PointerEvent::Wheel { delta } => {
                self.camera.scroll(delta);
                Ok(())
            }
        };
        result.or_else(|err| self.recover(err))
    }

    /// Feed one key press. Returns whether the key was handled.
    pub fn handle_key(&mut self, event: KeyEvent) -> CanvasResult<bool> {
        self.refresh();
        let command = event.modifiers.command();
        match event.key {
            Key::Delete | Key::Backspace => {
                self.delete_selection()?;
                Ok(true)
            }
            Key::Escape => {
                self.reset_to_none();
                Ok(true)
            }
            Key::Char('z') if command && event.modifiers.shift => {
                self.redo()?;
                Ok(true)
            }
            Key::Char('z') if command => {
                self.undo()?;
                Ok(true)
            }
            Key::Char('y') if command => {
                self.redo()?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn on_pointer_down(&mut self, device: Point, pressure: f64) -> CanvasResult<()> {
        let point = self.camera.screen_to_canvas(device);
        self.pointer_down = true;
        self.presence.set_cursor(Some(point));
        self.presence_dirty = true;

        match self.state {
            CanvasState::Inserting { .. } => Ok(()),
            CanvasState::Pencil => {
                self.presence
                    .start_pencil_draft(PenPoint::new(point.x, point.y, pressure), self.pen_color);
                Ok(())
            }
            _ => {
                self.begin_gesture();
                let snapshot = self.store.snapshot();

                let single = match self.presence.selection() {
                    [id] => Some(id.clone()),
                    _ => None,
                };
                if let Some(selected) = single {
                    if let Some(bounds) = snapshot.bounds_of(std::slice::from_ref(&selected)) {
                        if let Some(corner) =
                            geometry::hit_test_handle(bounds, point, self.config.handle_size)
                        {
                            self.set_state(CanvasState::Resizing {
                                initial_bounds: bounds,
                                corner,
                            });
                            return Ok(());
                        }
                    }
                }

                match snapshot.topmost_at(point, self.config.hit_tolerance) {
                    Some(id) => {
                        if !self.presence.is_selected(&id) {
                            self.update_selection(vec![id]);
                        }
                        self.set_state(CanvasState::Translating { current: point });
                    }
                    None => self.set_state(CanvasState::Pressing { origin: point }),
                }
                Ok(())
            }
        }
    }

    fn on_pointer_move(&mut self, device: Point, pressure: f64) -> CanvasResult<()> {
        let point = self.camera.screen_to_canvas(device);
        self.presence.set_cursor(Some(point));
        self.presence_dirty = true;

        match self.state {
            CanvasState::Pressing { origin } => {
                let distance = (point.x - origin.x).abs() + (point.y - origin.y).abs();
                if distance > self.config.press_threshold {
                    self.set_state(CanvasState::SelectionNet {
                        origin,
                        current: point,
                    });
                    self.update_selection_net(origin, point);
                }
                Ok(())
            }
            CanvasState::SelectionNet { origin, .. } => {
                self.set_state(CanvasState::SelectionNet {
                    origin,
                    current: point,
                });
                self.update_selection_net(origin, point);
                Ok(())
            }
            CanvasState::Translating { current } => {
                self.translate_selection(point - current)?;
                self.set_state(CanvasState::Translating { current: point });
                Ok(())
            }
            CanvasState::Resizing {
                initial_bounds,
                corner,
            } => {
                let bounds = geometry::resize_bounds(initial_bounds, corner, point)?;
                if let Some(id) = self.presence.selection().first().cloned() {
                    self.patch_layer(&id, &LayerPatch::bounds(bounds))?;
                }
                Ok(())
            }
            CanvasState::Pencil => {
                if self.pointer_down {
                    self.presence
                        .push_pencil_sample(PenPoint::new(point.x, point.y, pressure));
                }
                Ok(())
            }
            CanvasState::None | CanvasState::Inserting { .. } => Ok(()),
        }
    }

    fn on_pointer_up(&mut self, device: Point) -> CanvasResult<()> {
        let point = self.camera.screen_to_canvas(device);
        self.pointer_down = false;

        let result = match self.state {
            CanvasState::None | CanvasState::Pressing { .. } => {
                self.with_gesture(|canvas| {
                    canvas.update_selection(Vec::new());
                    Ok(())
                })
            }
            CanvasState::Pencil => self.finish_pencil_stroke(),
            CanvasState::Inserting { layer_type } => self.with_gesture(|canvas| {
                canvas.insert_at(layer_type, point)?;
                Ok(())
            }),
            CanvasState::SelectionNet { .. }
            | CanvasState::Translating { .. }
            | CanvasState::Resizing { .. } => Ok(()),
        };

        self.set_state(CanvasState::None);
        self.end_gesture();
        result
    }

    // --- Gestures ---

    fn begin_gesture(&mut self) {
        if self.gesture.is_some() {
            return;
        }
        self.store.begin_batch();
        self.gesture = Some(Gesture {
            selection_before: self.presence.selection().to_vec(),
            touched_store: false,
        });
    }

    fn end_gesture(&mut self) {
        let Some(gesture) = self.gesture.take() else {
            return;
        };
        self.store.end_batch();
        self.history.push(HistoryEntry {
            selection_before: gesture.selection_before,
            selection_after: self.presence.selection().to_vec(),
            touches_store: gesture.touched_store,
        });
    }

    /// Run `f` inside a gesture, opening (and closing) one if none is active.
    fn with_gesture<T>(&mut self, f: impl FnOnce(&mut Self) -> CanvasResult<T>) -> CanvasResult<T> {
        let opened = self.gesture.is_none();
        self.begin_gesture();
        let result = f(self);
        if opened {
            self.end_gesture();
        }
        result
    }

    /// Abandon whatever is in flight and return to [`CanvasState::None`].
    fn reset_to_none(&mut self) {
        if self.presence.take_pencil_draft().is_some() {
            self.presence_dirty = true;
        }
        self.pointer_down = false;
        self.set_state(CanvasState::None);
        self.end_gesture();
    }

    fn recover(&mut self, err: CanvasError) -> CanvasResult<()> {
        self.reset_to_none();
        match err {
            CanvasError::NotFound(id) => {
                log::warn!("Layer {id} disappeared mid-gesture; dropping the gesture");
                Ok(())
            }
            other => {
                self.push_notice(other.to_string());
                Err(other)
            }
        }
    }

    // --- Mutation helpers ---

    fn authorize(&self) -> CanvasResult<()> {
        if self.identity.is_none() {
            return Err(CanvasError::Unauthorized);
        }
        Ok(())
    }

    fn mark_touched(&mut self) {
        if let Some(gesture) = self.gesture.as_mut() {
            gesture.touched_store = true;
        }
    }

    fn update_selection(&mut self, ids: Vec<LayerId>) {
        if self.presence.set_selection(ids) {
            self.presence_dirty = true;
        }
    }

    fn update_selection_net(&mut self, origin: Point, current: Point) {
        let ids = self.store.snapshot().intersecting(origin, current);
        self.update_selection(ids);
    }

    /// Patch a layer unless the patch would not change it. Returns whether it wrote.
    fn patch_layer(&mut self, id: &LayerId, patch: &LayerPatch) -> CanvasResult<bool> {
        self.authorize()?;
        let current = self
            .store
            .get(id)
            .ok_or_else(|| CanvasError::NotFound(id.clone()))?;
        let mut patched = current.clone();
        patched.apply_patch(patch);
        if patched == current {
            return Ok(false);
        }
        self.store.patch(id, patch)?;
        self.mark_touched();
        Ok(true)
    }

    fn translate_selection(&mut self, delta: Vec2) -> CanvasResult<()> {
        if delta == Vec2::ZERO {
            return Ok(());
        }
        for id in self.presence.selection().to_vec() {
            let layer = self
                .store
                .get(&id)
                .ok_or_else(|| CanvasError::NotFound(id.clone()))?;
            self.patch_layer(&id, &LayerPatch::origin(layer.origin() + delta))?;
        }
        Ok(())
    }

    fn board_is_full(&self) -> bool {
        let len = self.store.len();
        if len >= self.config.max_layers {
            log::debug!("Board holds {len} layers; skipping insert");
            return true;
        }
        false
    }

    /// Insert `layer` on top. Returns `None` when the board is full.
    fn insert_layer(&mut self, layer: Layer) -> CanvasResult<Option<LayerId>> {
        self.authorize()?;
        if self.board_is_full() {
            return Ok(None);
        }
        let id = LayerId::new();
        self.store.insert(id.clone(), layer)?;
        self.mark_touched();
        Ok(Some(id))
    }

    fn insert_at(&mut self, layer_type: LayerType, point: Point) -> CanvasResult<Option<LayerId>> {
        self.authorize()?;
        if self.board_is_full() {
            return Ok(None);
        }
        let bounds = Xywh::new(
            point.x,
            point.y,
            self.config.default_layer_width,
            self.config.default_layer_height,
        );
        let fill = self.palette.next_color();
        let id = self.insert_layer(Layer::new(layer_type, bounds, fill))?;
        if let Some(id) = &id {
            self.update_selection(vec![id.clone()]);
        }
        Ok(id)
    }

    fn finish_pencil_stroke(&mut self) -> CanvasResult<()> {
        let Some(draft) = self.presence.take_pencil_draft() else {
            return Ok(());
        };
        self.presence_dirty = true;
        if draft.len() < 2 {
            return Ok(());
        }
        let path = pen_points_to_path_layer(&draft, self.pen_color)?;
        self.with_gesture(|canvas| canvas.insert_layer(path.into()).map(|_| ()))
    }

    // --- Selection tools ---

    /// Replace the selection as one history entry. Unknown ids are dropped.
    pub fn set_selection(&mut self, ids: Vec<LayerId>) {
        let ids = self.store.snapshot().sort_by_z(&ids);
        let opened = self.gesture.is_none();
        self.begin_gesture();
        self.update_selection(ids);
        if opened {
            self.end_gesture();
        }
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(Vec::new());
    }

    /// Delete every selected layer and clear the selection as one history entry.
    ///
    /// Returns the number of layers deleted.
    pub fn delete_selection(&mut self) -> CanvasResult<usize> {
        if self.presence.selection().is_empty() {
            return Ok(0);
        }
        let ids = self.presence.selection().to_vec();
        self.run_action(|canvas| {
            let mut deleted = 0;
            for id in &ids {
                match canvas.store.delete(id) {
                    Ok(()) => {
                        canvas.mark_touched();
                        deleted += 1;
                    }
                    Err(CanvasError::NotFound(id)) => {
                        log::warn!("Layer {id} was already deleted");
                    }
                    Err(err) => return Err(err),
                }
            }
            canvas.update_selection(Vec::new());
            Ok(deleted)
        })
    }

    /// Set the fill of every selected layer.
    pub fn set_selection_fill(&mut self, fill: Color) -> CanvasResult<()> {
        let ids = self.presence.selection().to_vec();
        self.run_action(|canvas| {
            for id in &ids {
                canvas.patch_layer(id, &LayerPatch::fill(fill))?;
            }
            Ok(())
        })
    }

    /// Move the selection to the top of the z-order, keeping its relative order.
    pub fn bring_selection_to_front(&mut self) -> CanvasResult<()> {
        let ids = self.store.snapshot().sort_by_z(self.presence.selection());
        self.run_action(|canvas| {
            for id in &ids {
                if canvas.store.bring_to_front(id)? {
                    canvas.mark_touched();
                }
            }
            Ok(())
        })
    }

    /// Move the selection to the bottom of the z-order, keeping its relative order.
    pub fn send_selection_to_back(&mut self) -> CanvasResult<()> {
        let ids = self.store.snapshot().sort_by_z(self.presence.selection());
        self.run_action(|canvas| {
            for id in ids.iter().rev() {
                if canvas.store.send_to_back(id)? {
                    canvas.mark_touched();
                }
            }
            Ok(())
        })
    }

    /// Set or clear the text value of a layer.
    pub fn set_layer_value(&mut self, id: &LayerId, value: Option<String>) -> CanvasResult<()> {
        self.run_action(|canvas| canvas.patch_layer(id, &LayerPatch::value(value)).map(|_| ()))
    }

    /// Run a keyboard/toolbar mutation as one gesture, recovering like a pointer gesture.
    fn run_action<T: Default>(
        &mut self,
        f: impl FnOnce(&mut Self) -> CanvasResult<T>,
    ) -> CanvasResult<T> {
        let result = self.authorize().and_then(|()| self.with_gesture(f));
        self.finish_action(result)
    }

    /// Failures get a notice and force [`CanvasState::None`]; `NotFound` races are dropped.
    fn finish_action<T: Default>(&mut self, result: CanvasResult<T>) -> CanvasResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(err) => self.recover(err).map(|_| T::default()),
        }
    }

    // --- History ---

    /// Undo the last gesture. Returns false if there was nothing to undo.
    pub fn undo(&mut self) -> CanvasResult<bool> {
        let result = self.authorize().and_then(|()| self.step_back());
        self.finish_action(result)
    }

    /// Redo the last undone gesture. Returns false if there was nothing to redo.
    pub fn redo(&mut self) -> CanvasResult<bool> {
        let result = self.authorize().and_then(|()| self.step_forward());
        self.finish_action(result)
    }

    fn step_back(&mut self) -> CanvasResult<bool> {
        self.reset_to_none();
        let Some(entry) = self.history.undo() else {
            return Ok(false);
        };
        if entry.touches_store {
            self.store.undo()?;
        }
        self.restore_selection(entry.selection_before);
        Ok(true)
    }

    fn step_forward(&mut self) -> CanvasResult<bool> {
        self.reset_to_none();
        let Some(entry) = self.history.redo() else {
            return Ok(false);
        };
        if entry.touches_store {
            self.store.redo()?;
        }
        self.restore_selection(entry.selection_after);
        Ok(true)
    }

    fn restore_selection(&mut self, ids: Vec<LayerId>) {
        let ids = self.store.snapshot().sort_by_z(&ids);
        self.update_selection(ids);
        // Drain the undo's own store events so they do not prune twice.
        self.refresh();
    }

    // --- Stroke outlines ---

    /// Closed outline of a committed path layer in canvas coordinates, shaped by `config.stroke`.
    pub fn path_outline(&self, id: &LayerId) -> Option<Vec<Point>> {
        let layer = self.store.get(id)?;
        let points: Vec<PenPoint> = layer.as_path()?.absolute_points().collect();
        Some(stroke_outline(&points, &self.config.stroke))
    }

    /// Outline of my in-progress pencil stroke.
    pub fn pencil_draft_outline(&self) -> Option<Vec<Point>> {
        self.presence
            .pencil_draft()
            .map(|draft| stroke_outline(draft, &self.config.stroke))
    }

    // --- Replication ---

    /// Apply store changes observed since the last call.
    ///
    /// Drops selected ids whose layers were deleted, by anyone.
    pub fn refresh(&mut self) {
        let mut stale = false;
        for event in self.store_events.try_iter() {
            if matches!(event, StoreEvent::Deleted(_) | StoreEvent::Reloaded) {
                stale = true;
            }
        }
        if !stale || !self.presence.prune_selection(&self.store.snapshot()) {
            return;
        }
        self.presence_dirty = true;
        let manipulating = matches!(
            self.state,
            CanvasState::Translating { .. } | CanvasState::Resizing { .. }
        );
        if manipulating && self.presence.selection().is_empty() {
            log::warn!("Selection vanished mid-gesture; dropping the gesture");
            self.reset_to_none();
        }
    }

    /// Publish my presence if it changed since the last flush.
    pub fn flush_presence(&mut self, channel: &mut impl PresenceChannel) -> CanvasResult<bool> {
        if !self.presence_dirty {
            return Ok(false);
        }
        channel.publish(self.presence.connection_id(), self.presence.me())?;
        self.presence_dirty = false;
        Ok(true)
    }

    /// Apply every pending presence update from collaborators.
    pub fn receive_presence(&mut self, updates: &Receiver<PresenceUpdate>) -> usize {
        updates
            .try_iter()
            .filter(|update| self.presence.apply_remote(update.clone()))
            .count()
    }

    // --- Notices ---

    fn push_notice(&mut self, message: String) {
        self.next_notice_id += 1;
        self.notices.push(Notice {
            id: self.next_notice_id,
            message,
        });
    }

    /// Pending notices, oldest first.
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Dismiss one notice. Returns whether it was pending.
    pub fn dismiss(&mut self, id: u64) -> bool {
        let before = self.notices.len();
        self.notices.retain(|notice| notice.id != id);
        self.notices.len() != before
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use crate::presence::PresenceHub;
    use crate::store::MemoryLayerStore;

    fn canvas() -> Canvas<MemoryLayerStore> {
        let mut canvas = Canvas::new(MemoryLayerStore::new(), 1, CanvasConfig::default());
        canvas.set_identity(Some(Identity::new("user-1", "Ada")));
        canvas
    }

    fn add_rect(canvas: &mut Canvas<MemoryLayerStore>, id: &str, bounds: Xywh) -> LayerId {
        let id = LayerId::from(id);
        canvas
            .store_mut()
            .insert(id.clone(), Layer::new(LayerType::Rectangle, bounds, Color::black()))
            .unwrap();
        id
    }

    #[test]
    fn test_press_on_empty_canvas_enters_pressing() {
        let mut canvas = canvas();
        canvas.handle_pointer(PointerEvent::down(50.0, 50.0)).unwrap();
        assert_eq!(
            canvas.state(),
            CanvasState::Pressing {
                origin: Point::new(50.0, 50.0)
            }
        );
        // Small jitter stays a press.
        canvas.handle_pointer(PointerEvent::move_to(52.0, 52.0)).unwrap();
        assert!(matches!(canvas.state(), CanvasState::Pressing { .. }));
        canvas.handle_pointer(PointerEvent::move_to(53.0, 53.0)).unwrap();
        assert!(matches!(canvas.state(), CanvasState::SelectionNet { .. }));
    }

    #[test]
    fn test_selection_net_selects_intersecting_layers() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(10.0, 10.0, 20.0, 20.0));
        add_rect(&mut canvas, "b", Xywh::new(200.0, 200.0, 10.0, 10.0));

        canvas.handle_pointer(PointerEvent::down(0.0, 0.0)).unwrap();
        canvas.handle_pointer(PointerEvent::move_to(100.0, 100.0)).unwrap();
        assert_eq!(canvas.selection(), &[a.clone()]);
        canvas.handle_pointer(PointerEvent::up(100.0, 100.0)).unwrap();

        assert_eq!(canvas.state(), CanvasState::None);
        assert_eq!(canvas.selection(), &[a]);
        assert_eq!(canvas.history().undo_count(), 1);
    }

    #[test]
    fn test_click_on_empty_canvas_clears_selection() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        canvas.set_selection(vec![a]);
        canvas.handle_pointer(PointerEvent::down(500.0, 500.0)).unwrap();
        canvas.handle_pointer(PointerEvent::up(500.0, 500.0)).unwrap();
        assert!(canvas.selection().is_empty());
        assert_eq!(canvas.state(), CanvasState::None);
    }

    #[test]
    fn test_pointer_down_selects_topmost_layer() {
        let mut canvas = canvas();
        add_rect(&mut canvas, "below", Xywh::new(0.0, 0.0, 50.0, 50.0));
        let above = add_rect(&mut canvas, "above", Xywh::new(25.0, 25.0, 50.0, 50.0));

        canvas.handle_pointer(PointerEvent::down(30.0, 30.0)).unwrap();
        assert_eq!(canvas.selection(), &[above]);
        assert!(matches!(canvas.state(), CanvasState::Translating { .. }));
    }

    #[test]
    fn test_translate_moves_every_selected_layer() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        let b = add_rect(&mut canvas, "b", Xywh::new(100.0, 0.0, 10.0, 10.0));
        canvas.set_selection(vec![a.clone(), b.clone()]);
        let before = canvas.history().undo_count();

        canvas.handle_pointer(PointerEvent::down(5.0, 5.0)).unwrap();
        canvas.handle_pointer(PointerEvent::move_to(10.0, 8.0)).unwrap();
        canvas.handle_pointer(PointerEvent::move_to(25.0, 15.0)).unwrap();
        canvas.handle_pointer(PointerEvent::up(25.0, 15.0)).unwrap();

        let store = canvas.store();
        assert_eq!(store.get(&a).unwrap().bounds(), Xywh::new(20.0, 10.0, 10.0, 10.0));
        assert_eq!(store.get(&b).unwrap().bounds(), Xywh::new(120.0, 10.0, 10.0, 10.0));
        // The whole drag is one history entry and one store step.
        assert_eq!(canvas.history().undo_count(), before + 1);
        assert!(canvas.undo().unwrap());
        assert_eq!(
            canvas.store().get(&a).unwrap().bounds(),
            Xywh::new(0.0, 0.0, 10.0, 10.0)
        );
    }

    #[test]
    fn test_zero_movement_translate_records_nothing() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        canvas.set_selection(vec![a]);
        let before = canvas.history().undo_count();
        let store_steps = canvas.store().undo_count();

        canvas.handle_pointer(PointerEvent::down(5.0, 5.0)).unwrap();
        canvas.handle_pointer(PointerEvent::up(5.0, 5.0)).unwrap();

        assert_eq!(canvas.state(), CanvasState::None);
        assert_eq!(canvas.history().undo_count(), before);
        assert_eq!(canvas.store().undo_count(), store_steps);
    }

    #[test]
    fn test_resize_from_handle() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(10.0, 10.0, 100.0, 100.0));
        canvas.set_selection(vec![a.clone()]);
        assert!(canvas.selection_handles().is_some());

        // Bottom-right handle sits at (110, 110).
        canvas.handle_pointer(PointerEvent::down(110.0, 110.0)).unwrap();
        assert_eq!(
            canvas.state(),
            CanvasState::Resizing {
                initial_bounds: Xywh::new(10.0, 10.0, 100.0, 100.0),
                corner: Side::BOTTOM_RIGHT,
            }
        );
        canvas.handle_pointer(PointerEvent::move_to(160.0, 130.0)).unwrap();
        canvas.handle_pointer(PointerEvent::up(160.0, 130.0)).unwrap();
        assert_eq!(
            canvas.store().get(&a).unwrap().bounds(),
            Xywh::new(10.0, 10.0, 150.0, 120.0)
        );

        // Dragging past the anchor flips.
        canvas.handle_pointer(PointerEvent::down(160.0, 130.0)).unwrap();
        canvas.handle_pointer(PointerEvent::move_to(0.0, 0.0)).unwrap();
        canvas.handle_pointer(PointerEvent::up(0.0, 0.0)).unwrap();
        assert_eq!(
            canvas.store().get(&a).unwrap().bounds(),
            Xywh::new(0.0, 0.0, 10.0, 10.0)
        );
    }

    #[test]
    fn test_no_handles_for_multi_selection() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        let b = add_rect(&mut canvas, "b", Xywh::new(20.0, 0.0, 10.0, 10.0));
        canvas.set_selection(vec![a, b]);
        assert!(canvas.selection_handles().is_none());
        assert_eq!(canvas.selection_bounds(), Some(Xywh::new(0.0, 0.0, 30.0, 10.0)));
    }

    #[test]
    fn test_insert_tool_places_layer_and_selects_it() {
        let mut canvas = canvas();
        canvas.insert_tool(LayerType::Note).unwrap();
        canvas.handle_pointer(PointerEvent::down(40.0, 60.0)).unwrap();
        canvas.handle_pointer(PointerEvent::up(40.0, 60.0)).unwrap();

        assert_eq!(canvas.state(), CanvasState::None);
        let ids = canvas.store().layer_ids();
        assert_eq!(ids.len(), 1);
        assert_eq!(canvas.selection(), ids.as_slice());
        let layer = canvas.store().get(&ids[0]).unwrap();
        assert_eq!(layer.layer_type(), LayerType::Note);
        assert_eq!(layer.bounds(), Xywh::new(40.0, 60.0, 100.0, 100.0));
        assert_eq!(layer.fill(), canvas.config().palette[0]);
    }

    #[test]
    fn test_insert_palette_rotates() {
        let mut canvas = canvas();
        for _ in 0..2 {
            canvas.insert_tool(LayerType::Rectangle).unwrap();
            canvas.handle_pointer(PointerEvent::up(0.0, 0.0)).unwrap();
        }
        let snapshot = canvas.layers();
        let fills: Vec<Color> = snapshot.iter().map(|(_, layer)| layer.fill()).collect();
        assert_eq!(fills, canvas.config().palette[..2].to_vec());
    }

    #[test]
    fn test_insert_tool_rejects_paths() {
        let mut canvas = canvas();
        assert!(matches!(
            canvas.insert_tool(LayerType::Path),
            Err(CanvasError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_insert_skipped_when_board_full() {
        let mut canvas = Canvas::new(
            MemoryLayerStore::new(),
            1,
            CanvasConfig {
                max_layers: 1,
                ..CanvasConfig::default()
            },
        );
        canvas.set_identity(Some(Identity::new("u", "U")));
        for _ in 0..2 {
            canvas.insert_tool(LayerType::Rectangle).unwrap();
            canvas.handle_pointer(PointerEvent::up(0.0, 0.0)).unwrap();
        }
        assert_eq!(canvas.store().len(), 1);
    }

    #[test]
    fn test_pencil_stroke_becomes_path() {
        let mut canvas = canvas();
        canvas.set_pen_color(Color::new(5, 6, 7));
        canvas.pencil_tool();
        canvas.handle_pointer(PointerEvent::down(10.0, 10.0)).unwrap();
        canvas.handle_pointer(PointerEvent::move_to(20.0, 30.0)).unwrap();
        assert_eq!(canvas.presence().pencil_draft().map(|d| d.len()), Some(2));
        canvas.handle_pointer(PointerEvent::up(20.0, 30.0)).unwrap();

        assert_eq!(canvas.state(), CanvasState::None);
        assert!(canvas.presence().pencil_draft().is_none());
        let ids = canvas.store().layer_ids();
        let layer = canvas.store().get(&ids[0]).unwrap();
        let path = layer.as_path().unwrap();
        assert_eq!(layer.origin(), Point::new(10.0, 10.0));
        assert_eq!(path.points[1], PenPoint::new(10.0, 20.0, 0.5));
        assert_eq!(layer.fill(), Color::new(5, 6, 7));
    }

    #[test]
    fn test_single_point_stroke_is_discarded() {
        let mut canvas = canvas();
        canvas.pencil_tool();
        canvas.handle_pointer(PointerEvent::down(10.0, 10.0)).unwrap();
        canvas.handle_pointer(PointerEvent::up(10.0, 10.0)).unwrap();
        assert!(canvas.store().is_empty());
        assert!(canvas.presence().pencil_draft().is_none());
        assert_eq!(canvas.state(), CanvasState::None);
    }

    #[test]
    fn test_pencil_ignores_hover_moves() {
        let mut canvas = canvas();
        canvas.pencil_tool();
        canvas.handle_pointer(PointerEvent::move_to(10.0, 10.0)).unwrap();
        assert!(canvas.presence().pencil_draft().is_none());
        assert_eq!(canvas.state(), CanvasState::Pencil);
    }

    #[test]
    fn test_cancel_forces_none() {
        let mut canvas = canvas();
        canvas.pencil_tool();
        canvas.handle_pointer(PointerEvent::down(10.0, 10.0)).unwrap();
        canvas.handle_pointer(PointerEvent::Cancel).unwrap();
        assert_eq!(canvas.state(), CanvasState::None);
        assert!(canvas.presence().pencil_draft().is_none());

        canvas.handle_pointer(PointerEvent::down(0.0, 0.0)).unwrap();
        canvas
            .handle_key(KeyEvent::plain(Key::Escape))
            .unwrap();
        assert_eq!(canvas.state(), CanvasState::None);
    }

    #[test]
    fn test_delete_selection_is_one_entry() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        let b = add_rect(&mut canvas, "b", Xywh::new(20.0, 0.0, 10.0, 10.0));
        add_rect(&mut canvas, "c", Xywh::new(40.0, 0.0, 10.0, 10.0));
        canvas.set_selection(vec![a.clone(), b.clone()]);
        let before = canvas.history().undo_count();

        assert!(canvas.handle_key(KeyEvent::plain(Key::Delete)).unwrap());
        assert_eq!(canvas.store().len(), 1);
        assert!(canvas.selection().is_empty());
        assert_eq!(canvas.history().undo_count(), before + 1);

        assert!(canvas.undo().unwrap());
        assert_eq!(canvas.store().len(), 3);
        assert_eq!(canvas.selection(), &[a, b]);
    }

    #[test]
    fn test_undo_redo_keys() {
        let mut canvas = canvas();
        canvas.insert_tool(LayerType::Ellipse).unwrap();
        canvas.handle_pointer(PointerEvent::up(0.0, 0.0)).unwrap();
        assert_eq!(canvas.store().len(), 1);

        canvas.handle_key(KeyEvent::command('z', false)).unwrap();
        assert!(canvas.store().is_empty());
        assert!(canvas.selection().is_empty());

        canvas.handle_key(KeyEvent::command('z', true)).unwrap();
        assert_eq!(canvas.store().len(), 1);
        assert_eq!(canvas.selection().len(), 1);

        canvas.handle_key(KeyEvent::command('z', false)).unwrap();
        let redo = KeyEvent::new(
            Key::Char('y'),
            Modifiers {
                meta: true,
                ..Modifiers::default()
            },
        );
        canvas.handle_key(redo).unwrap();
        assert_eq!(canvas.store().len(), 1);
    }

    #[test]
    fn test_undo_selection_only_entry_keeps_store() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        canvas.set_selection(vec![a]);
        assert!(canvas.undo().unwrap());
        assert!(canvas.selection().is_empty());
        assert_eq!(canvas.store().len(), 1);
    }

    #[test]
    fn test_keyboard_mutations_without_identity_push_notices() {
        let mut canvas = Canvas::new(MemoryLayerStore::new(), 1, CanvasConfig::default());
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        canvas.set_selection(vec![a.clone()]);

        assert_eq!(
            canvas.handle_key(KeyEvent::plain(Key::Delete)),
            Err(CanvasError::Unauthorized)
        );
        assert_eq!(canvas.notices().len(), 1);
        assert_eq!(canvas.store().len(), 1);
        assert_eq!(canvas.selection(), &[a]);

        assert_eq!(
            canvas.set_selection_fill(Color::white()),
            Err(CanvasError::Unauthorized)
        );
        assert_eq!(canvas.undo(), Err(CanvasError::Unauthorized));
        assert_eq!(canvas.notices().len(), 3);
        assert_eq!(canvas.state(), CanvasState::None);
    }

    #[test]
    fn test_press_beside_ellipse_starts_pressing() {
        let mut canvas = canvas();
        let e = LayerId::from("e");
        canvas
            .store_mut()
            .insert(
                e.clone(),
                Layer::new(LayerType::Ellipse, Xywh::new(0.0, 0.0, 100.0, 100.0), Color::black()),
            )
            .unwrap();

        canvas.handle_pointer(PointerEvent::down(105.0, 50.0)).unwrap();
        assert!(matches!(canvas.state(), CanvasState::Pressing { .. }));
        assert!(canvas.selection().is_empty());
        canvas.handle_pointer(PointerEvent::up(105.0, 50.0)).unwrap();

        canvas.handle_pointer(PointerEvent::down(95.0, 50.0)).unwrap();
        assert_eq!(canvas.selection(), &[e]);
    }

    #[test]
    fn test_undo_cap_applies_to_store_and_history() {
        let mut canvas = Canvas::new(
            MemoryLayerStore::new(),
            1,
            CanvasConfig {
                max_undo_steps: 2,
                ..CanvasConfig::default()
            },
        );
        canvas.set_identity(Some(Identity::new("u", "U")));
        for _ in 0..3 {
            canvas.insert_tool(LayerType::Rectangle).unwrap();
            canvas.handle_pointer(PointerEvent::up(0.0, 0.0)).unwrap();
        }
        assert_eq!(canvas.store().undo_count(), 2);
        assert_eq!(canvas.history().undo_count(), 2);

        assert!(canvas.undo().unwrap());
        assert!(canvas.undo().unwrap());
        assert!(!canvas.undo().unwrap());
        assert_eq!(canvas.store().len(), 1);
    }

    #[test]
    fn test_stroke_outlines_use_config() {
        let mut canvas = canvas();
        canvas.pencil_tool();
        assert!(canvas.pencil_draft_outline().is_none());
        canvas.handle_pointer(PointerEvent::down(10.0, 10.0)).unwrap();
        canvas.handle_pointer(PointerEvent::move_to(30.0, 10.0)).unwrap();

        // Size 16 at pressure 0.5 with thinning 0.5 gives a radius of 6.
        let expected = vec![
            Point::new(10.0, 16.0),
            Point::new(30.0, 16.0),
            Point::new(30.0, 4.0),
            Point::new(10.0, 4.0),
        ];
        assert_eq!(canvas.pencil_draft_outline(), Some(expected.clone()));

        canvas.handle_pointer(PointerEvent::up(30.0, 10.0)).unwrap();
        assert!(canvas.pencil_draft_outline().is_none());
        let id = canvas.store().layer_ids()[0].clone();
        assert_eq!(canvas.path_outline(&id), Some(expected));

        let rect = add_rect(&mut canvas, "r", Xywh::new(0.0, 0.0, 10.0, 10.0));
        assert!(canvas.path_outline(&rect).is_none());
    }

    #[test]
    fn test_unchanged_selection_records_nothing() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        canvas.set_selection(vec![a.clone()]);
        canvas.set_selection(vec![a]);
        assert_eq!(canvas.history().undo_count(), 1);
    }

    #[test]
    fn test_secondary_buttons_are_ignored() {
        let mut canvas = canvas();
        add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        for button in [MouseButton::Right, MouseButton::Middle] {
            canvas
                .handle_pointer(PointerEvent::Down {
                    position: Point::new(5.0, 5.0),
                    button,
                    pressure: 0.5,
                })
                .unwrap();
            assert_eq!(canvas.state(), CanvasState::None);
            assert!(canvas.selection().is_empty());
            canvas
                .handle_pointer(PointerEvent::Up {
                    position: Point::new(5.0, 5.0),
                    button,
                })
                .unwrap();
        }
        assert_eq!(canvas.history().undo_count(), 0);
    }

    #[test]
    fn test_mutations_need_identity() {
        let mut canvas = Canvas::new(MemoryLayerStore::new(), 1, CanvasConfig::default());
        canvas.insert_tool(LayerType::Rectangle).unwrap();
        canvas.handle_pointer(PointerEvent::down(0.0, 0.0)).unwrap();
        assert_eq!(
            canvas.handle_pointer(PointerEvent::up(0.0, 0.0)),
            Err(CanvasError::Unauthorized)
        );
        assert!(canvas.store().is_empty());
        assert_eq!(canvas.state(), CanvasState::None);
        assert_eq!(canvas.notices().len(), 1);
    }

    #[test]
    fn test_notices_can_be_dismissed() {
        let mut canvas = Canvas::new(MemoryLayerStore::new(), 1, CanvasConfig::default());
        canvas.insert_tool(LayerType::Text).unwrap();
        let _ = canvas.handle_pointer(PointerEvent::up(0.0, 0.0));
        let id = canvas.notices()[0].id;
        assert!(canvas.dismiss(id));
        assert!(!canvas.dismiss(id));
        assert!(canvas.take_notices().is_empty());
    }

    #[test]
    fn test_layer_deleted_mid_drag_drops_gesture() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        canvas.handle_pointer(PointerEvent::down(5.0, 5.0)).unwrap();
        assert!(matches!(canvas.state(), CanvasState::Translating { .. }));

        // A collaborator deletes the layer while we drag it.
        canvas.store_mut().delete(&a).unwrap();
        canvas.handle_pointer(PointerEvent::move_to(50.0, 50.0)).unwrap();

        assert_eq!(canvas.state(), CanvasState::None);
        assert!(canvas.selection().is_empty());
        assert!(canvas.notices().is_empty());
    }

    #[test]
    fn test_fill_and_reorder_selection() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        let b = add_rect(&mut canvas, "b", Xywh::new(0.0, 0.0, 10.0, 10.0));
        let c = add_rect(&mut canvas, "c", Xywh::new(0.0, 0.0, 10.0, 10.0));
        canvas.set_selection(vec![b.clone(), a.clone()]);

        canvas.set_selection_fill(Color::white()).unwrap();
        assert_eq!(canvas.store().get(&a).unwrap().fill(), Color::white());
        assert_eq!(canvas.store().get(&c).unwrap().fill(), Color::black());

        canvas.bring_selection_to_front().unwrap();
        assert_eq!(canvas.store().layer_ids(), vec![c.clone(), a.clone(), b.clone()]);
        canvas.send_selection_to_back().unwrap();
        assert_eq!(canvas.store().layer_ids(), vec![a, b, c]);
    }

    #[test]
    fn test_set_layer_value() {
        let mut canvas = canvas();
        let id = add_rect(&mut canvas, "t", Xywh::new(0.0, 0.0, 10.0, 10.0));
        canvas.set_layer_value(&id, Some("hello".to_string())).unwrap();
        assert_eq!(canvas.store().get(&id).unwrap().value(), Some("hello"));
        // Unknown ids are a silent no-op.
        canvas
            .set_layer_value(&LayerId::from("ghost"), Some("x".to_string()))
            .unwrap();
    }

    #[test]
    fn test_wheel_pans_camera() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        canvas
            .handle_pointer(PointerEvent::Wheel {
                delta: Vec2::new(100.0, 0.0),
            })
            .unwrap();
        assert_eq!(canvas.camera().x, -100.0);
        // Device x=-95 is canvas x=5 after panning.
        canvas.handle_pointer(PointerEvent::down(-95.0, 5.0)).unwrap();
        assert_eq!(canvas.selection(), &[a]);
    }

    #[test]
    fn test_presence_flows_through_hub() {
        let mut hub = PresenceHub::new();
        let mut alice = canvas();
        let mut bob = Canvas::new(MemoryLayerStore::new(), 2, CanvasConfig::default());
        let bob_inbox = hub.subscribe(2);

        alice.handle_pointer(PointerEvent::move_to(3.0, 4.0)).unwrap();
        assert!(alice.flush_presence(&mut hub).unwrap());
        assert!(!alice.flush_presence(&mut hub).unwrap());

        assert_eq!(bob.receive_presence(&bob_inbox), 1);
        let seen = bob.presence().others().get(&1).unwrap();
        assert_eq!(seen.cursor, Some(Point::new(3.0, 4.0)));
    }

    #[test]
    fn test_remote_delete_prunes_selection() {
        let mut canvas = canvas();
        let a = add_rect(&mut canvas, "a", Xywh::new(0.0, 0.0, 10.0, 10.0));
        canvas.set_selection(vec![a.clone()]);
        canvas.store_mut().delete(&a).unwrap();
        canvas.refresh();
        assert!(canvas.selection().is_empty());
    }
}
