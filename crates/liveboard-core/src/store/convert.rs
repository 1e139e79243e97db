//! Conversion between layers and Loro values.
//!
//! Every layer is a flat `LoroMap` so concurrent writes to different fields
//! of the same layer merge instead of overwriting each other.

use crate::color::Color;
use crate::geometry::Xywh;
use crate::layers::{Layer, LayerPatch, LayerType, Path, PenPoint};
use loro::{LoroList, LoroMap, LoroMapValue, LoroResult, LoroValue};

const KEY_TYPE: &str = "type";
const KEY_X: &str = "x";
const KEY_Y: &str = "y";
const KEY_WIDTH: &str = "width";
const KEY_HEIGHT: &str = "height";
const KEY_FILL_R: &str = "fill_r";
const KEY_FILL_G: &str = "fill_g";
const KEY_FILL_B: &str = "fill_b";
const KEY_VALUE: &str = "value";
// Path keys
const KEY_POINTS: &str = "points";

fn get_double(map: &LoroMapValue, key: &str) -> Option<f64> {
    match map.get(key)? {
        LoroValue::Double(d) => Some(*d),
        LoroValue::I64(i) => Some(*i as f64),
        _ => None,
    }
}

fn get_channel(map: &LoroMapValue, key: &str) -> Option<u8> {
    match map.get(key)? {
        LoroValue::I64(i) => Some((*i).clamp(0, 255) as u8),
        LoroValue::Double(d) => Some(d.clamp(0.0, 255.0) as u8),
        _ => None,
    }
}

fn get_string(map: &LoroMapValue, key: &str) -> Option<String> {
    match map.get(key)? {
        LoroValue::String(s) => Some(s.to_string()),
        _ => None,
    }
}

fn as_f64(value: &LoroValue) -> Option<f64> {
    match value {
        LoroValue::Double(d) => Some(*d),
        LoroValue::I64(i) => Some(*i as f64),
        _ => None,
    }
}

fn fill_to_loro(fill: Color, map: &LoroMap) -> LoroResult<()> {
    map.insert(KEY_FILL_R, fill.r as i64)?;
    map.insert(KEY_FILL_G, fill.g as i64)?;
    map.insert(KEY_FILL_B, fill.b as i64)?;
    Ok(())
}

/// Write every field of `layer` into a fresh layer map.
pub fn layer_to_loro(layer: &Layer, map: &LoroMap) -> LoroResult<()> {
    let bounds = layer.bounds();
    map.insert(KEY_TYPE, layer.layer_type().as_str())?;
    map.insert(KEY_X, bounds.x)?;
    map.insert(KEY_Y, bounds.y)?;
    map.insert(KEY_WIDTH, bounds.width)?;
    map.insert(KEY_HEIGHT, bounds.height)?;
    fill_to_loro(layer.fill(), map)?;
    if let Some(value) = layer.value() {
        map.insert(KEY_VALUE, value)?;
    }

    if let Layer::Path(path) = layer {
        // Samples as a list of [x, y, pressure] triples.
        let points_list = map.insert_container(KEY_POINTS, LoroList::new())?;
        for point in &path.points {
            let point_list = points_list.insert_container(points_list.len(), LoroList::new())?;
            point_list.push(point.x)?;
            point_list.push(point.y)?;
            point_list.push(point.pressure)?;
        }
    }

    Ok(())
}

/// Write only the fields present in `patch`.
pub fn patch_to_loro(patch: &LayerPatch, map: &LoroMap) -> LoroResult<()> {
    if let Some(x) = patch.x {
        map.insert(KEY_X, x)?;
    }
    if let Some(y) = patch.y {
        map.insert(KEY_Y, y)?;
    }
    if let Some(width) = patch.width {
        map.insert(KEY_WIDTH, width)?;
    }
    if let Some(height) = patch.height {
        map.insert(KEY_HEIGHT, height)?;
    }
    if let Some(fill) = patch.fill {
        fill_to_loro(fill, map)?;
    }
    match &patch.value {
        Some(Some(value)) => map.insert(KEY_VALUE, value.as_str())?,
        Some(None) => map.delete(KEY_VALUE)?,
        None => {}
    }
    Ok(())
}

/// Rebuild a layer from its map. Returns `None` for unknown types or missing fields.
pub fn layer_from_loro(map: &LoroMapValue) -> Option<Layer> {
    let layer_type = LayerType::parse(&get_string(map, KEY_TYPE)?)?;
    let bounds = Xywh::new(
        get_double(map, KEY_X)?,
        get_double(map, KEY_Y)?,
        get_double(map, KEY_WIDTH)?,
        get_double(map, KEY_HEIGHT)?,
    );
    let fill = Color::new(
        get_channel(map, KEY_FILL_R).unwrap_or(0),
        get_channel(map, KEY_FILL_G).unwrap_or(0),
        get_channel(map, KEY_FILL_B).unwrap_or(0),
    );

    let mut layer = match layer_type {
        LayerType::Path => Layer::Path(Path::new(bounds, fill, points_from_loro(map))),
        other => Layer::new(other, bounds, fill),
    };
    if let Some(value) = get_string(map, KEY_VALUE) {
        layer.apply_patch(&LayerPatch::value(Some(value)));
    }
    Some(layer)
}

fn points_from_loro(map: &LoroMapValue) -> Vec<PenPoint> {
    let Some(LoroValue::List(points_list)) = map.get(KEY_POINTS) else {
        return Vec::new();
    };
    points_list
        .iter()
        .filter_map(|p| {
            let LoroValue::List(coords) = p else {
                return None;
            };
            let x = as_f64(coords.first()?)?;
            let y = as_f64(coords.get(1)?)?;
            let pressure = coords.get(2).and_then(as_f64).unwrap_or(0.5);
            Some(PenPoint::new(x, y, pressure))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use loro::LoroDoc;

    fn roundtrip(layer: &Layer) -> Option<Layer> {
        let doc = LoroDoc::new();
        let map = doc.get_map("layer");
        layer_to_loro(layer, &map).unwrap();
        doc.commit();
        match map.get_deep_value() {
            LoroValue::Map(value) => layer_from_loro(&value),
            _ => None,
        }
    }

    #[test]
    fn test_note_with_value() {
        let mut layer = Layer::new(
            LayerType::Note,
            Xywh::new(1.5, 2.0, 100.0, 80.0),
            Color::new(250, 204, 21),
        );
        layer.apply_patch(&LayerPatch::value(Some("remember".to_string())));
        assert_eq!(roundtrip(&layer), Some(layer));
    }

    #[test]
    fn test_path_keeps_pressure() {
        let path = Path::new(
            Xywh::new(10.0, 10.0, 5.0, 5.0),
            Color::black(),
            vec![PenPoint::new(0.0, 0.0, 0.2), PenPoint::new(5.0, 5.0, 0.8)],
        );
        let layer = Layer::Path(path);
        assert_eq!(roundtrip(&layer), Some(layer));
    }

    #[test]
    fn test_patch_writes_only_given_fields() {
        let doc = LoroDoc::new();
        let map = doc.get_map("layer");
        let layer = Layer::new(LayerType::Text, Xywh::new(0.0, 0.0, 10.0, 10.0), Color::black());
        layer_to_loro(&layer, &map).unwrap();
        patch_to_loro(
            &LayerPatch {
                width: Some(50.0),
                value: Some(Some("hi".to_string())),
                ..LayerPatch::default()
            },
            &map,
        )
        .unwrap();
        doc.commit();

        let LoroValue::Map(value) = map.get_deep_value() else {
            panic!("expected a map");
        };
        let patched = layer_from_loro(&value).unwrap();
        assert_eq!(patched.bounds(), Xywh::new(0.0, 0.0, 50.0, 10.0));
        assert_eq!(patched.value(), Some("hi"));

        patch_to_loro(&LayerPatch::value(None), &map).unwrap();
        doc.commit();
        let LoroValue::Map(value) = map.get_deep_value() else {
            panic!("expected a map");
        };
        assert_eq!(layer_from_loro(&value).unwrap().value(), None);
    }

    #[test]
    fn test_unknown_type_is_skipped() {
        let doc = LoroDoc::new();
        let map = doc.get_map("layer");
        map.insert(KEY_TYPE, "triangle").unwrap();
        map.insert(KEY_X, 0.0).unwrap();
        doc.commit();
        let LoroValue::Map(value) = map.get_deep_value() else {
            panic!("expected a map");
        };
        assert!(layer_from_loro(&value).is_none());
    }
}
