//! Liveboard Core Library
//!
//! Platform-agnostic canvas state engine for the Liveboard collaborative
//! whiteboard: layer geometry, freehand strokes, a replicated layer store,
//! per-connection presence and the pointer-driven interaction state machine.

pub mod camera;
pub mod canvas;
pub mod collaboration;
pub mod color;
pub mod config;
pub mod error;
pub mod events;
pub mod geometry;
pub mod history;
pub mod input;
pub mod layers;
pub mod presence;
pub mod store;
pub mod stroke;
pub mod sync;

pub use camera::Camera;
pub use canvas::{Canvas, CanvasState, Notice};
pub use collaboration::{BoardInfo, CollaborationManager};
pub use color::{Color, Palette, TextColor, color_to_css, connection_id_to_color, contrasting_text_color};
pub use config::{CanvasConfig, MAX_LAYERS};
pub use error::{CanvasError, CanvasResult};
pub use geometry::{Side, Xywh};
pub use history::{History, HistoryEntry};
pub use input::{Key, KeyEvent, Modifiers, MouseButton, PointerEvent};
pub use layers::{Layer, LayerId, LayerPatch, LayerType, PenPoint};
pub use presence::{ConnectionId, Identity, Presence, PresenceChannel, PresenceHub, PresenceState, PresenceUpdate};
pub use store::{CrdtLayerStore, LayerSnapshot, LayerStore, MemoryLayerStore, StoreEvent};
pub use stroke::{StrokeOptions, pen_points_to_path_layer, svg_path_from_stroke};
pub use sync::{ClientMessage, ServerMessage, SyncEvent};
