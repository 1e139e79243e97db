//! Layer definitions for the shared canvas.
//!
//! A layer is one of five variants. All of them share an origin, an extent, a
//! fill and an optional text value; paths additionally carry their pen samples
//! relative to the layer origin.

mod ellipse;
mod note;
mod path;
mod rectangle;
mod text;

pub use ellipse::Ellipse;
pub use note::Note;
pub use path::{Path, PenPoint};
pub use rectangle::Rectangle;
pub use text::Text;

use crate::color::Color;
use crate::geometry::Xywh;
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use uuid::Uuid;

/// Unique, stable identifier of a layer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LayerId(String);

impl LayerId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for LayerId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for LayerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for LayerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for LayerId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Discriminant of a layer variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LayerType {
    Rectangle,
    Ellipse,
    Path,
    Text,
    Note,
}

impl LayerType {
    /// Whether the insert tool can place this type with a single click.
    /// Paths only come from the pencil.
    pub fn is_insertable(self) -> bool {
        !matches!(self, LayerType::Path)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LayerType::Rectangle => "rectangle",
            LayerType::Ellipse => "ellipse",
            LayerType::Path => "path",
            LayerType::Text => "text",
            LayerType::Note => "note",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "rectangle" => Some(LayerType::Rectangle),
            "ellipse" => Some(LayerType::Ellipse),
            "path" => Some(LayerType::Path),
            "text" => Some(LayerType::Text),
            "note" => Some(LayerType::Note),
            _ => None,
        }
    }
}

/// Behavior shared by every layer variant.
pub trait LayerTrait {
    /// Bounding box in canvas coordinates.
    fn bounds(&self) -> Xywh;

    /// Replace origin and extent.
    fn set_bounds(&mut self, bounds: Xywh);

    fn fill(&self) -> Color;

    fn set_fill(&mut self, fill: Color);

    fn value(&self) -> Option<&str>;

    fn set_value(&mut self, value: Option<String>);

    /// Check if a point (in canvas coordinates) hits this layer.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool;
}

/// Partial update of a layer's fields. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fill: Option<Color>,
    /// `Some(None)` clears the value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Option<String>>,
}

impl LayerPatch {
    /// Patch that moves a layer to a new origin.
    pub fn origin(origin: Point) -> Self {
        Self {
            x: Some(origin.x),
            y: Some(origin.y),
            ..Self::default()
        }
    }

    /// Patch that replaces origin and extent.
    pub fn bounds(bounds: Xywh) -> Self {
        Self {
            x: Some(bounds.x),
            y: Some(bounds.y),
            width: Some(bounds.width),
            height: Some(bounds.height),
            ..Self::default()
        }
    }

    pub fn fill(fill: Color) -> Self {
        Self {
            fill: Some(fill),
            ..Self::default()
        }
    }

    pub fn value(value: Option<String>) -> Self {
        Self {
            value: Some(value),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Enum wrapper for all layer variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Layer {
    Rectangle(Rectangle),
    Ellipse(Ellipse),
    Path(Path),
    Text(Text),
    Note(Note),
}

impl Layer {
    /// Create a layer of the given type filling `bounds`. Paths start without samples.
    pub fn new(layer_type: LayerType, bounds: Xywh, fill: Color) -> Self {
        match layer_type {
            LayerType::Rectangle => Layer::Rectangle(Rectangle::new(bounds, fill)),
            LayerType::Ellipse => Layer::Ellipse(Ellipse::new(bounds, fill)),
            LayerType::Path => Layer::Path(Path::new(bounds, fill, Vec::new())),
            LayerType::Text => Layer::Text(Text::new(bounds, fill)),
            LayerType::Note => Layer::Note(Note::new(bounds, fill)),
        }
    }

    pub fn layer_type(&self) -> LayerType {
        match self {
            Layer::Rectangle(_) => LayerType::Rectangle,
            Layer::Ellipse(_) => LayerType::Ellipse,
            Layer::Path(_) => LayerType::Path,
            Layer::Text(_) => LayerType::Text,
            Layer::Note(_) => LayerType::Note,
        }
    }

    fn inner(&self) -> &dyn LayerTrait {
        match self {
            Layer::Rectangle(l) => l,
            Layer::Ellipse(l) => l,
            Layer::Path(l) => l,
            Layer::Text(l) => l,
            Layer::Note(l) => l,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn LayerTrait {
        match self {
            Layer::Rectangle(l) => l,
            Layer::Ellipse(l) => l,
            Layer::Path(l) => l,
            Layer::Text(l) => l,
            Layer::Note(l) => l,
        }
    }

    pub fn bounds(&self) -> Xywh {
        self.inner().bounds()
    }

    pub fn origin(&self) -> Point {
        self.bounds().origin()
    }

    pub fn fill(&self) -> Color {
        self.inner().fill()
    }

    pub fn value(&self) -> Option<&str> {
        self.inner().value()
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        self.inner().hit_test(point, tolerance)
    }

    /// Move the layer by `delta`. Path samples are origin-relative and stay put.
    pub fn translate(&mut self, delta: Vec2) {
        let bounds = self.bounds().translated(delta);
        self.inner_mut().set_bounds(bounds);
    }

    /// Apply the fields present in `patch`.
    pub fn apply_patch(&mut self, patch: &LayerPatch) {
        let current = self.bounds();
        let bounds = Xywh::new(
            patch.x.unwrap_or(current.x),
            patch.y.unwrap_or(current.y),
            patch.width.unwrap_or(current.width),
            patch.height.unwrap_or(current.height),
        );
        let inner = self.inner_mut();
        inner.set_bounds(bounds);
        if let Some(fill) = patch.fill {
            inner.set_fill(fill);
        }
        if let Some(value) = &patch.value {
            inner.set_value(value.clone());
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Layer::Path(p) => Some(p),
            _ => None,
        }
    }
}

impl From<Path> for Layer {
    fn from(path: Path) -> Self {
        Layer::Path(path)
    }
}
