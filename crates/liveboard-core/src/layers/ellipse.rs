//! Ellipse layer.

use super::LayerTrait;
use crate::color::Color;
use crate::geometry::Xywh;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// An ellipse inscribed in its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ellipse {
    /// Bounding box top-left x.
    pub x: f64,
    /// Bounding box top-left y.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Ellipse {
    /// Create a new ellipse inscribed in `bounds`.
    pub fn new(bounds: Xywh, fill: Color) -> Self {
        Self {
            x: bounds.x,
            y: bounds.y,
            width: bounds.width,
            height: bounds.height,
            fill,
            value: None,
        }
    }

    pub fn center(&self) -> Point {
        self.bounds().center()
    }

    pub fn radii(&self) -> (f64, f64) {
        (self.width / 2.0, self.height / 2.0)
    }
}

impl LayerTrait for Ellipse {
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

    fn hit_test(&self, point: Point, _tolerance: f64) -> bool {
        // Filled: hit only inside the inscribed ellipse
        let center = self.center();
        let (rx, ry) = self.radii();
        if rx < f64::EPSILON || ry < f64::EPSILON {
            // Collapsed to a line or a point
            return self.bounds().contains(point);
        }
        let dx = (point.x - center.x) / rx;
        let dy = (point.y - center.y) / ry;
        dx * dx + dy * dy <= 1.0
    }
}
