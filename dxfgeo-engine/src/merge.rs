//! 将零散的线、面要素合并为单个 MultiLineString / MultiPolygon 要素。

use dxfgeo_core::geojson::{Feature, FeatureCollection, Geometry, Position, Properties};
use serde_json::{Value, json};
use tracing::debug;

use crate::rings::{ensure_ring_closure, is_closed_line_string};

pub const CRS84: &str = "urn:ogc:def:crs:OGC:1.3:CRS84";

/// 合并前后的要素统计。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConversionSummary {
    pub original_features: usize,
    pub original_lines: usize,
    pub original_polygons: usize,
    pub converted_features: usize,
    pub has_multi_line_string: bool,
    pub has_multi_polygon: bool,
}

/// 首尾闭合（容差内）的 LineString 视为面；Point 等其他要素原样排在聚合要素之后。
pub fn convert_to_multi_geometry(collection: &FeatureCollection, tolerance: f64) -> FeatureCollection {
    let mut lines: Vec<Vec<Position>> = Vec::new();
    let mut polygons: Vec<Vec<Vec<Position>>> = Vec::new();
    let mut others: Vec<Feature> = Vec::new();

    for feature in &collection.features {
        match &feature.geometry {
            Some(Geometry::LineString(coords)) => {
                if is_closed_line_string(coords, tolerance) {
                    polygons.push(vec![ensure_ring_closure(coords.clone())]);
                } else {
                    lines.push(coords.clone());
                }
            }
            Some(Geometry::Polygon(rings)) => polygons.push(rings.clone()),
            Some(Geometry::MultiLineString(parts)) => lines.extend(parts.iter().cloned()),
            Some(Geometry::MultiPolygon(parts)) => polygons.extend(parts.iter().cloned()),
            Some(Geometry::Point(_)) | Some(Geometry::MultiPoint(_)) | None => {
                others.push(feature.clone())
            }
        }
    }

    let mut features = Vec::with_capacity(others.len() + 2);
    if !lines.is_empty() {
        let sources = collection.features.iter().filter(|f| is_line_like(f));
        features.push(aggregate(
            sources,
            "MultiLineString",
            lines.len(),
            Geometry::MultiLineString(lines),
        ));
    }
    if !polygons.is_empty() {
        let sources = collection.features.iter().filter(|f| f.is_polygonal());
        features.push(aggregate(
            sources,
            "MultiPolygon",
            polygons.len(),
            Geometry::MultiPolygon(polygons),
        ));
    }
    features.extend(others);

    let mut properties = collection.properties.clone().unwrap_or_default();
    properties.insert("converted".to_string(), Value::Bool(true));
    properties.insert(
        "originalFeatureCount".to_string(),
        Value::from(collection.features.len()),
    );
    properties.insert(
        "convertedFeatureCount".to_string(),
        Value::from(features.len()),
    );
    debug!(
        input = collection.features.len(),
        output = features.len(),
        "多要素合并完成"
    );

    FeatureCollection {
        tag: collection.tag,
        features,
        crs: Some(json!({
            "type": "name",
            "properties": { "name": CRS84 }
        })),
        properties: Some(properties),
    }
}

fn aggregate<'a>(
    sources: impl Iterator<Item = &'a Feature>,
    geometry_type: &str,
    count: usize,
    geometry: Geometry,
) -> Feature {
    let mut properties = merge_properties(sources);
    properties.insert(
        "geometryType".to_string(),
        Value::String(geometry_type.to_string()),
    );
    properties.insert("originalCount".to_string(), Value::from(count));
    Feature::new(geometry, properties)
}

/// 逐键合并属性：空值（null/false/0/""）被新值替换；数组追加新值；
/// 字符串与新值组成数组；其余类型保留首个值。
pub fn merge_properties<'a>(features: impl IntoIterator<Item = &'a Feature>) -> Properties {
    let mut merged = Properties::new();
    for feature in features {
        for (key, incoming) in &feature.properties {
            match merged.get_mut(key) {
                None => {
                    merged.insert(key.clone(), incoming.clone());
                }
                Some(current) if is_falsy(current) => *current = incoming.clone(),
                Some(Value::Array(items)) => match incoming {
                    Value::Array(more) => items.extend(more.iter().cloned()),
                    other => items.push(other.clone()),
                },
                Some(current) if current.is_string() => {
                    let previous = current.take();
                    *current = Value::Array(vec![previous, incoming.clone()]);
                }
                Some(_) => {}
            }
        }
    }
    merged
}

fn is_falsy(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(flag) => !flag,
        Value::Number(number) => number.as_f64().is_none_or(|n| n == 0.0 || n.is_nan()),
        Value::String(text) => text.is_empty(),
        Value::Array(_) | Value::Object(_) => false,
    }
}

fn is_line_like(feature: &Feature) -> bool {
    feature.geometry.as_ref().is_some_and(Geometry::is_lineal)
}

/// 存在多于一个线要素或多于一个面要素时才需要合并。
pub fn needs_conversion(collection: &FeatureCollection) -> bool {
    let lines = collection.features.iter().filter(|f| is_line_like(f)).count();
    let polygons = collection.features.iter().filter(|f| f.is_polygonal()).count();
    lines > 1 || polygons > 1
}

pub fn conversion_summary(
    original: &FeatureCollection,
    converted: &FeatureCollection,
) -> ConversionSummary {
    let has_type = |name: &str| {
        converted
            .features
            .iter()
            .any(|f| f.geometry_type() == Some(name))
    };
    ConversionSummary {
        original_features: original.features.len(),
        original_lines: original.features.iter().filter(|f| is_line_like(f)).count(),
        original_polygons: original.features.iter().filter(|f| f.is_polygonal()).count(),
        converted_features: converted.features.len(),
        has_multi_line_string: has_type("MultiLineString"),
        has_multi_polygon: has_type("MultiPolygon"),
    }
}
