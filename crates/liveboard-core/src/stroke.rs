//! Stroke builder: turns raw pen samples into path layers and stroke outlines
//! into path commands.
//!
//! Nothing here depends on a renderer; the outline is plain geometry.

use crate::color::Color;
use crate::error::{CanvasError, CanvasResult};
use crate::geometry::Xywh;
use crate::layers::{Path, PenPoint};
use kurbo::{Point, Vec2};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Tuning for [`stroke_outline`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrokeOptions {
    /// Stroke diameter at full pressure.
    pub size: f64,
    /// How much low pressure narrows the stroke (0 = constant width).
    pub thinning: f64,
    /// How far each sample lags behind the raw input (0 = raw input).
    pub streamline: f64,
}

impl Default for StrokeOptions {
    fn default() -> Self {
        Self {
            size: 16.0,
            thinning: 0.5,
            streamline: 0.5,
        }
    }
}

/// Build a path layer from absolute pen samples.
///
/// The layer origin becomes the top-left of the samples' bounding box and every
/// sample is re-based onto it; pressure passes through unchanged.
pub fn pen_points_to_path_layer(points: &[PenPoint], fill: Color) -> CanvasResult<Path> {
    if points.len() < 2 {
        return Err(CanvasError::InvalidInput(format!(
            "a path needs at least 2 points, got {}",
            points.len()
        )));
    }

    let mut left = f64::INFINITY;
    let mut top = f64::INFINITY;
    let mut right = f64::NEG_INFINITY;
    let mut bottom = f64::NEG_INFINITY;

    for point in points {
        left = left.min(point.x);
        top = top.min(point.y);
        right = right.max(point.x);
        bottom = bottom.max(point.y);
    }

    let relative = points
        .iter()
        .map(|p| PenPoint::new(p.x - left, p.y - top, p.pressure))
        .collect();

    Ok(Path::new(
        Xywh::new(left, top, right - left, bottom - top),
        fill,
        relative,
    ))
}

/// Convert a closed stroke outline into SVG path commands.
///
/// Each sample becomes the control point of a quadratic segment ending halfway
/// to the next sample; the last segment wraps to the first sample.
pub fn svg_path_from_stroke(stroke: &[Point]) -> String {
    let Some(first) = stroke.first() else {
        return String::new();
    };

    let mut d = format!("M {} {} Q", first.x, first.y);
    for (i, p0) in stroke.iter().enumerate() {
        let p1 = stroke[(i + 1) % stroke.len()];
        let mid = p0.midpoint(p1);
        // Writing into a String cannot fail.
        let _ = write!(d, " {} {} {} {}", p0.x, p0.y, mid.x, mid.y);
    }
    d.push_str(" Z");
    d
}

/// Closed outline polygon around a pressure-sensitive stroke.
///
/// The left offsets run forward and the right offsets run back, so the result
/// can be handed straight to [`svg_path_from_stroke`].
pub fn stroke_outline(points: &[PenPoint], options: &StrokeOptions) -> Vec<Point> {
    let radius = |pressure: f64| {
        let pressure = pressure.clamp(0.0, 1.0);
        (options.size / 2.0 * (1.0 - options.thinning * (1.0 - pressure))).max(0.0)
    };

    match points {
        [] => Vec::new(),
        [only] => {
            let r = radius(only.pressure);
            let c = only.position();
            vec![
                Point::new(c.x - r, c.y - r),
                Point::new(c.x + r, c.y - r),
                Point::new(c.x + r, c.y + r),
                Point::new(c.x - r, c.y + r),
            ]
        }
        _ => {
            let smoothed = streamline(points, options.streamline);
            let mut left = Vec::with_capacity(smoothed.len());
            let mut right = Vec::with_capacity(smoothed.len());
            let mut last_normal = Vec2::new(0.0, 1.0);

            for (i, sample) in smoothed.iter().enumerate() {
                let prev = smoothed[i.saturating_sub(1)].position();
                let next = smoothed[(i + 1).min(smoothed.len() - 1)].position();
                let tangent = next - prev;
                let normal = if tangent.hypot2() > f64::EPSILON {
                    let t = tangent.normalize();
                    Vec2::new(-t.y, t.x)
                } else {
                    // Repeated samples keep the previous direction.
                    last_normal
                };
                last_normal = normal;

                let offset = normal * radius(sample.pressure);
                left.push(sample.position() + offset);
                right.push(sample.position() - offset);
            }

            left.extend(right.into_iter().rev());
            left
        }
    }
}

/// Pull each sample towards the previous smoothed sample.
fn streamline(points: &[PenPoint], amount: f64) -> Vec<PenPoint> {
    let keep = 1.0 - amount.clamp(0.0, 0.95);
    let mut out: Vec<PenPoint> = Vec::with_capacity(points.len());
    for (i, point) in points.iter().enumerate() {
        // The final sample stays pinned so the stroke ends under the pen.
        let smoothed = match out.last() {
            Some(prev) if i + 1 < points.len() => PenPoint::new(
                prev.x + (point.x - prev.x) * keep,
                prev.y + (point.y - prev.y) * keep,
                point.pressure,
            ),
            _ => *point,
        };
        out.push(smoothed);
    }
    out
}
