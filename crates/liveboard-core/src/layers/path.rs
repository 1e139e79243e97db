//! Freehand path layer.

use super::LayerTrait;
use crate::color::Color;
use crate::geometry::{Xywh, point_to_polyline_dist};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// One pen sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PenPoint {
    pub x: f64,
    pub y: f64,
    /// Pen pressure in 0..=1; pointer devices without pressure report 0.5.
    pub pressure: f64,
}

impl PenPoint {
    pub const fn new(x: f64, y: f64, pressure: f64) -> Self {
        Self { x, y, pressure }
    }

    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// A freehand stroke.
///
/// `points` are relative to the layer origin, so moving the layer only
/// rewrites `x`/`y`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: Color,
    /// Samples relative to (`x`, `y`).
    pub points: Vec<PenPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Path {
    /// Create a path whose `points` are already origin-relative.
    pub fn new(bounds: Xywh, fill: Color, points: Vec<PenPoint>) -> Self {
        Self {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            fill,
            points,
            value: None,
        }
    }

    /// Samples translated back into canvas coordinates.
    pub fn absolute_points(&self) -> impl Iterator<Item = PenPoint> + '_ {
        self.points
            .iter()
            .map(|p| PenPoint::new(p.x + self.x, p.y + self.y, p.pressure))
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl LayerTrait for Path {
    fn bounds(&self) -> Xywh {
        Xywh::new(self.x, self.y, self.width, self.height)
    }

    fn set_bounds(&mut self, bounds: Xywh) {
        self.x = bounds.x;
        self.y = bounds.y;
        self.width = bounds.width;
        self.height = bounds.height;
    }

    fn fill(&self) -> Color {
        self.fill
    }

    fn set_fill(&mut self, fill: Color) {
        self.fill = fill;
    }

    fn value(&self) -> Option<&str> {
        self.value.as_deref()
    }

    fn set_value(&mut self, value: Option<String>) {
        self.value = value;
    }

    fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        let b = self.bounds();
        let slop = Xywh::new(
            b.x - tolerance,
            b.y - tolerance,
            b.width + 2.0 * tolerance,
            b.height + 2.0 * tolerance,
        );
        if !slop.contains(point) {
            return false;
        }
        if self.points.is_empty() {
            return true;
        }
        // Compare in layer space instead of re-basing every sample.
        let local = Point::new(point.x - self.x, point.y - self.y);
        let polyline: Vec<Point> = self.points.iter().map(PenPoint::position).collect();
        point_to_polyline_dist(local, &polyline) <= tolerance
    }
}
