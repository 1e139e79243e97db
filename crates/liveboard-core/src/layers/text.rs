//! Free-standing text layer.

use super::LayerTrait;
use crate::color::Color;
use crate::geometry::Xywh;
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Shown while a text layer has no value yet.
pub const TEXT_PLACEHOLDER: &str = "Text";

/// A text block; the fill colors the glyphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Text {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub fill: Color,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

impl Text {
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

    /// The value, or the placeholder when empty.
    pub fn display_value(&self) -> &str {
        match self.value.as_deref() {
            Some(v) if !v.is_empty() => v,
            _ => TEXT_PLACEHOLDER,
        }
    }
}

impl LayerTrait for Text {
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
        self.bounds().contains(point)
    }
}
