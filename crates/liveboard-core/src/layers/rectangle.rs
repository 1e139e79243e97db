//! Rectangle layer.

use super::LayerTrait;
use crate::color::Color;
use crate::geometry::Xywh;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// An axis-aligned filled rectangle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rectangle {
    /// Top-left corner x.
    pub x: f64,
    /// Top-left corner y.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Rectangle {
    /// Create a new rectangle filling `bounds`.
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
}

impl LayerTrait for Rectangle {
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
        // Filled: hit anywhere inside
        self.bounds().contains(point)
    }
}
