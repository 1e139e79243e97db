//! Camera module for viewport panning.

use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};

/// Per-client viewport offset.
///
/// The camera is never shared; it only converts device pointer coordinates into
/// canvas coordinates and back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub x: f64,
    pub y: f64,
}

impl Camera {
    /// Create a camera at the canvas origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convert a device pointer position to canvas coordinates.
    ///
    /// The device position is rounded to whole pixels first.
    pub fn screen_to_canvas(&self, device: Point) -> Point {
        Point::new(device.x.round() - self.x, device.y.round() - self.y)
    }

    /// Convert a canvas point to device coordinates.
    pub fn canvas_to_screen(&self, canvas: Point) -> Point {
        Point::new(canvas.x + self.x, canvas.y + self.y)
    }

    /// Pan the camera by a delta in device pixels.
    pub fn pan(&mut self, delta: Vec2) {
        self.x += delta.x;
        self.y += delta.y;
    }

    /// Apply a wheel/trackpad scroll; content follows the fingers.
    pub fn scroll(&mut self, wheel_delta: Vec2) {
        self.pan(-wheel_delta);
    }
}

/// Convert a device pointer position to canvas coordinates.
pub fn pointer_to_canvas_point(device: Point, camera: &Camera) -> Point {
    camera.screen_to_canvas(device)
}
