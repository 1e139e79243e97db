//! Tunables for the canvas engine.

use crate::color::{Color, Palette};
use crate::error::CanvasResult;
use crate::stroke::StrokeOptions;
use serde::{Deserialize, Serialize};

/// Maximum number of layers a board may hold.
pub const MAX_LAYERS: usize = 100;

/// Engine configuration. Missing JSON fields fall back to the defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasConfig {
    /// Inserts are skipped once the board holds this many layers.
    pub max_layers: usize,
    /// Manhattan distance a press must travel before it becomes a selection net.
    pub press_threshold: f64,
    /// Width of a layer placed by the insert tool.
    pub default_layer_width: f64,
    /// Height of a layer placed by the insert tool.
    pub default_layer_height: f64,
    /// Edge of the square hit box around each resize handle.
    pub handle_size: f64,
    /// Hit slop around freehand strokes.
    pub hit_tolerance: f64,
    /// Colors handed out in rotation to inserted layers.
    pub palette: Vec<Color>,
    /// Undo steps kept by the layer store and by the canvas history.
    pub max_undo_steps: usize,
    /// Outline settings for freehand strokes and pencil drafts.
    pub stroke: StrokeOptions,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            max_layers: MAX_LAYERS,
            press_threshold: 5.0,
            default_layer_width: 100.0,
            default_layer_height: 100.0,
            handle_size: 8.0,
            hit_tolerance: 8.0,
            palette: Palette::default().colors().to_vec(),
            max_undo_steps: 100,
            stroke: StrokeOptions::default(),
        }
    }
}

impl CanvasConfig {
    /// Parse a (possibly partial) JSON configuration.
    pub fn from_json(json: &str) -> CanvasResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> CanvasResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Fresh palette rotation built from the configured colors.
    pub fn palette(&self) -> Palette {
        Palette::new(self.palette.clone())
    }
}
