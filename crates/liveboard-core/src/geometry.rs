//! Geometry kernel: bounding boxes, resize transforms, selection-net
//! intersection and selection handles.
//!
//! Everything here is a pure function of its inputs. Layer ids that no longer
//! resolve are skipped rather than reported, because a concurrent delete from
//! another client can legitimately race with a local read.

use crate::error::{CanvasError, CanvasResult};
use crate::layers::{Layer, LayerId};
use kurbo::{Point, Rect, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::ops::BitOr;

/// Axis-aligned rectangle as origin plus extent.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Xywh {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Xywh {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    /// Normalize two arbitrary corners into a rectangle with non-negative extent.
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (a.x - b.x).abs(),
            height: (a.y - b.y).abs(),
        }
    }

    pub fn left(&self) -> f64 {
        self.x
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn top(&self) -> f64 {
        self.y
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Move the origin by `delta`, keeping the extent.
    pub fn translated(&self, delta: Vec2) -> Self {
        Self::new(self.x + delta.x, self.y + delta.y, self.width, self.height)
    }

    /// Closed containment test (edges count as inside).
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.left()
            && point.x <= self.right()
            && point.y >= self.top()
            && point.y <= self.bottom()
    }

    /// Open-interval overlap: rectangles that only touch along an edge do not intersect.
    pub fn intersects(&self, other: &Xywh) -> bool {
        self.right() > other.left()
            && self.left() < other.right()
            && self.bottom() > other.top()
            && self.top() < other.bottom()
    }

    /// Whether this rectangle fully contains `other`.
    pub fn encloses(&self, other: &Xywh) -> bool {
        self.left() <= other.left()
            && self.right() >= other.right()
            && self.top() <= other.top()
            && self.bottom() >= other.bottom()
    }

    pub fn to_rect(&self) -> Rect {
        Rect::new(self.left(), self.top(), self.right(), self.bottom())
    }
}

impl From<Rect> for Xywh {
    fn from(rect: Rect) -> Self {
        let rect = rect.abs();
        Self::new(rect.x0, rect.y0, rect.width(), rect.height())
    }
}

/// Edge bitmask naming a resize handle. Corners combine two edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Side(u8);

impl Side {
    pub const TOP: Side = Side(1);
    pub const BOTTOM: Side = Side(2);
    pub const LEFT: Side = Side(4);
    pub const RIGHT: Side = Side(8);
    pub const TOP_LEFT: Side = Side(1 | 4);
    pub const TOP_RIGHT: Side = Side(1 | 8);
    pub const BOTTOM_LEFT: Side = Side(2 | 4);
    pub const BOTTOM_RIGHT: Side = Side(2 | 8);

    /// Build a mask from raw bits, rejecting masks no handle can produce.
    pub fn from_bits(bits: u8) -> CanvasResult<Self> {
        let side = Side(bits);
        side.validate()?;
        Ok(side)
    }

    pub fn bits(self) -> u8 {
        self.0
    }

    pub fn contains(self, other: Side) -> bool {
        self.0 & other.0 == other.0
    }

    /// A usable mask names at least one edge, only known edges, and never
    /// both edges of the same axis.
    pub fn validate(self) -> CanvasResult<()> {
        let known = Side::TOP.0 | Side::BOTTOM.0 | Side::LEFT.0 | Side::RIGHT.0;
        if self.0 == 0 || self.0 & !known != 0 {
            return Err(CanvasError::InvalidInput(format!(
                "corner mask {:#06b} names no edge",
                self.0
            )));
        }
        if self.contains(Side::TOP | Side::BOTTOM) || self.contains(Side::LEFT | Side::RIGHT) {
            return Err(CanvasError::InvalidInput(format!(
                "corner mask {:#06b} pulls opposite edges",
                self.0
            )));
        }
        Ok(())
    }
}

impl BitOr for Side {
    type Output = Side;

    fn bitor(self, rhs: Side) -> Side {
        Side(self.0 | rhs.0)
    }
}

/// Minimal rectangle enclosing every layer, or `None` for no layers.
pub fn bounding_box<'a, I>(layers: I) -> Option<Xywh>
where
    I: IntoIterator<Item = &'a Layer>,
{
    let mut layers = layers.into_iter();
    let first = layers.next()?.bounds();

    let mut left = first.left();
    let mut right = first.right();
    let mut top = first.top();
    let mut bottom = first.bottom();

    for layer in layers {
        let bounds = layer.bounds();
        left = left.min(bounds.left());
        right = right.max(bounds.right());
        top = top.min(bounds.top());
        bottom = bottom.max(bounds.bottom());
    }

    Some(Xywh::new(left, top, right - left, bottom - top))
}

/// Resize `bounds` by dragging the handle named by `corner` to `point`.
///
/// Each axis is handled independently; the edge opposite the dragged one stays
/// anchored. Dragging past the anchor flips the rectangle instead of producing
/// a negative extent.
pub fn resize_bounds(bounds: Xywh, corner: Side, point: Point) -> CanvasResult<Xywh> {
    corner.validate()?;
    let mut result = bounds;

    if corner.contains(Side::LEFT) {
        result.x = point.x.min(bounds.right());
        result.width = (bounds.right() - point.x).abs();
    }

    if corner.contains(Side::RIGHT) {
        result.x = point.x.min(bounds.x);
        result.width = (point.x - bounds.x).abs();
    }

    if corner.contains(Side::TOP) {
        result.y = point.y.min(bounds.bottom());
        result.height = (bounds.bottom() - point.y).abs();
    }

    if corner.contains(Side::BOTTOM) {
        result.y = point.y.min(bounds.y);
        result.height = (point.y - bounds.y).abs();
    }

    Ok(result)
}

/// Ids (in z-order) of the layers overlapping the rectangle spanned by `a` and `b`.
pub fn find_intersecting_layers_with_rectangle(
    layer_ids: &[LayerId],
    layers: &HashMap<LayerId, Layer>,
    a: Point,
    b: Point,
) -> Vec<LayerId> {
    let rect = Xywh::from_corners(a, b);

    layer_ids
        .iter()
        .filter(|id| {
            layers
                .get(*id)
                .is_some_and(|layer| rect.intersects(&layer.bounds()))
        })
        .cloned()
        .collect()
}

/// Topmost layer whose shape contains `point`.
pub fn topmost_layer_at(
    layer_ids: &[LayerId],
    layers: &HashMap<LayerId, Layer>,
    point: Point,
    tolerance: f64,
) -> Option<LayerId> {
    layer_ids
        .iter()
        .rev()
        .find(|id| {
            layers
                .get(*id)
                .is_some_and(|layer| layer.hit_test(point, tolerance))
        })
        .cloned()
}

/// A resize handle drawn around the selection box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Handle {
    /// Handle center in canvas coordinates.
    pub position: Point,
    /// Edges this handle drags.
    pub side: Side,
}

/// The eight resize handles of a selection box, corners first.
pub fn selection_handles(bounds: Xywh) -> [Handle; 8] {
    let Xywh { x, y, width, height } = bounds;
    let handle = |px: f64, py: f64, side: Side| Handle {
        position: Point::new(px, py),
        side,
    };
    [
        handle(x, y, Side::TOP_LEFT),
        handle(x + width, y, Side::TOP_RIGHT),
        handle(x + width, y + height, Side::BOTTOM_RIGHT),
        handle(x, y + height, Side::BOTTOM_LEFT),
        handle(x + width / 2.0, y, Side::TOP),
        handle(x + width, y + height / 2.0, Side::RIGHT),
        handle(x + width / 2.0, y + height, Side::BOTTOM),
        handle(x, y + height / 2.0, Side::LEFT),
    ]
}

/// Which handle (if any) has its square hit box of edge `handle_size` over `point`.
pub fn hit_test_handle(bounds: Xywh, point: Point, handle_size: f64) -> Option<Side> {
    let half = handle_size / 2.0;
    selection_handles(bounds)
        .into_iter()
        .find(|handle| {
            (point.x - handle.position.x).abs() <= half
                && (point.y - handle.position.y).abs() <= half
        })
        .map(|handle| handle.side)
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = b - a;
    let pv = point - a;
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = a + seg * t;
    (point - proj).hypot()
}

/// Minimum distance from a point to a polyline.
pub fn point_to_polyline_dist(point: Point, points: &[Point]) -> f64 {
    match points {
        [] => f64::INFINITY,
        [single] => (point - *single).hypot(),
        _ => points
            .windows(2)
            .map(|w| point_to_segment_dist(point, w[0], w[1]))
            .fold(f64::INFINITY, f64::min),
    }
}
