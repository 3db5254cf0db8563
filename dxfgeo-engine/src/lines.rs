//! 线要素处理：筛选、批量合并、坐标清理。

use dxfgeo_core::geojson::{Feature, FeatureCollection, Geometry, Position};
use geo::{LineString, MultiPoint, RemoveRepeatedPoints};
use serde_json::Value;
use tracing::{debug, info};

use crate::merge::merge_properties;

pub const DEFAULT_LINE_BATCH_SIZE: usize = 1000;

/// 只保留 LineString 要素。
pub fn line_only(collection: &FeatureCollection) -> FeatureCollection {
    FeatureCollection {
        features: collection
            .features
            .iter()
            .filter(|feature| matches!(feature.geometry, Some(Geometry::LineString(_))))
            .cloned()
            .collect(),
        ..collection.clone()
    }
}

/// 所有 LineString 合并为一个 MultiLineString 要素，按 `batch_size` 分批收集坐标。
pub fn combine_lines(collection: &FeatureCollection, batch_size: usize) -> FeatureCollection {
    let sources: Vec<&Feature> = collection
        .features
        .iter()
        .filter(|feature| matches!(feature.geometry, Some(Geometry::LineString(_))))
        .collect();
    if sources.is_empty() {
        debug!("没有可合并的线要素");
        return FeatureCollection {
            features: Vec::new(),
            ..collection.clone()
        };
    }

    let batch_size = batch_size.max(1);
    let batches = sources.len().div_ceil(batch_size);
    let mut parts: Vec<Vec<Position>> = Vec::with_capacity(sources.len());
    for (index, batch) in sources.chunks(batch_size).enumerate() {
        parts.extend(batch.iter().filter_map(|feature| match &feature.geometry {
            Some(Geometry::LineString(coords)) => Some(coords.clone()),
            _ => None,
        }));
        if batches > 1 {
            debug!(batch = index + 1, batches, "线要素批次已合并");
        }
    }

    let mut properties = merge_properties(sources.iter().copied());
    properties.insert("originalCount".to_string(), Value::from(sources.len()));
    info!(lines = sources.len(), batches, "线要素合并完成");

    FeatureCollection {
        features: vec![Feature::new(Geometry::MultiLineString(parts), properties)],
        ..collection.clone()
    }
}

/// 去除连续重复坐标与共线的中间点。清理后不再构成有效几何的要素保持原样。
pub fn clean_coords(collection: &FeatureCollection) -> FeatureCollection {
    FeatureCollection {
        features: collection
            .features
            .iter()
            .map(|feature| clean_feature(feature).unwrap_or_else(|| feature.clone()))
            .collect(),
        ..collection.clone()
    }
}

fn clean_feature(feature: &Feature) -> Option<Feature> {
    let geometry = match feature.geometry.as_ref()? {
        Geometry::Point(position) => Geometry::Point(*position),
        Geometry::MultiPoint(points) => Geometry::MultiPoint(
            MultiPoint::from(points.clone())
                .remove_repeated_points()
                .iter()
                .map(|point| [point.x(), point.y()])
                .collect(),
        ),
        Geometry::LineString(coords) => Geometry::LineString(clean_line(coords)?),
        Geometry::MultiLineString(lines) => Geometry::MultiLineString(
            lines
                .iter()
                .map(|line| clean_line(line))
                .collect::<Option<Vec<_>>>()?,
        ),
        Geometry::Polygon(rings) => Geometry::Polygon(clean_rings(rings)?),
        Geometry::MultiPolygon(polygons) => Geometry::MultiPolygon(
            polygons
                .iter()
                .map(|rings| clean_rings(rings))
                .collect::<Option<Vec<_>>>()?,
        ),
    };
    let mut cleaned = Feature::new(geometry, feature.properties.clone());
    cleaned.id = feature.id.clone();
    Some(cleaned)
}

fn clean_line(coords: &[Position]) -> Option<Vec<Position>> {
    let cleaned = simplify_run(coords);
    (cleaned.len() >= 2).then_some(cleaned)
}

fn clean_rings(rings: &[Vec<Position>]) -> Option<Vec<Vec<Position>>> {
    rings.iter().map(|ring| clean_ring(ring)).collect()
}

fn clean_ring(ring: &[Position]) -> Option<Vec<Position>> {
    let mut cleaned = simplify_run(ring);
    if cleaned.first() != cleaned.last() {
        let first = *cleaned.first()?;
        cleaned.push(first);
    }
    (cleaned.len() >= 4).then_some(cleaned)
}

/// 保留首尾点，删除连续重复点和位于相邻两点连线段上的点。
fn simplify_run(coords: &[Position]) -> Vec<Position> {
    let deduped: Vec<Position> = LineString::from(coords.to_vec())
        .remove_repeated_points()
        .coords()
        .map(|coord| [coord.x, coord.y])
        .collect();

    let mut result: Vec<Position> = Vec::with_capacity(deduped.len());
    for (index, &position) in deduped.iter().enumerate() {
        let Some(&next) = deduped.get(index + 1) else {
            result.push(position);
            continue;
        };
        match result.last() {
            Some(&previous) if lies_on_segment(previous, next, position) => {}
            _ => result.push(position),
        }
    }
    result
}

fn lies_on_segment(start: Position, end: Position, point: Position) -> bool {
    let cross = (point[0] - start[0]) * (end[1] - start[1])
        - (point[1] - start[1]) * (end[0] - start[0]);
    if cross != 0.0 {
        return false;
    }
    let within = |a: f64, b: f64, v: f64| a.min(b) <= v && v <= a.max(b);
    within(start[0], end[0], point[0]) && within(start[1], end[1], point[1])
}

#[cfg(test)]
mod tests {
    use super::*;
    use dxfgeo_core::geojson::Properties;
    use serde_json::json;

    fn line(coords: Vec<Position>, layer: &str) -> Feature {
        let mut properties = Properties::new();
        properties.insert("layer".to_string(), json!(layer));
        Feature::new(Geometry::LineString(coords), properties)
    }

    fn polygon() -> Feature {
        Feature::new(
            Geometry::Polygon(vec![vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]),
            Properties::new(),
        )
    }

    #[test]
    fn line_only_drops_other_geometries() {
        let collection = FeatureCollection::new(vec![
            line(vec![[0.0, 0.0], [1.0, 0.0]], "A"),
            polygon(),
            Feature::new(
                Geometry::MultiLineString(vec![vec![[0.0, 0.0], [1.0, 0.0]]]),
                Properties::new(),
            ),
        ]);
        let lines = line_only(&collection);
        assert_eq!(lines.len(), 1);
        assert_eq!(lines.features[0].geometry_type(), Some("LineString"));
    }

    #[test]
    fn combining_in_batches_matches_single_pass() {
        let collection = FeatureCollection::new(
            (0..5)
                .map(|i| line(vec![[i as f64, 0.0], [i as f64, 1.0]], "GRID"))
                .collect(),
        );
        let batched = combine_lines(&collection, 2);
        let single = combine_lines(&collection, DEFAULT_LINE_BATCH_SIZE);
        assert_eq!(batched, single);
        assert_eq!(batched.len(), 1);

        let combined = &batched.features[0];
        assert_eq!(combined.properties["originalCount"], json!(5));
        match &combined.geometry {
            Some(Geometry::MultiLineString(parts)) => {
                assert_eq!(parts.len(), 5);
                assert_eq!(parts[3], vec![[3.0, 0.0], [3.0, 1.0]]);
            }
            other => panic!("期望 MultiLineString，实际为 {other:?}"),
        }
    }

    #[test]
    fn combining_without_lines_yields_empty_collection() {
        let collection = FeatureCollection::new(vec![polygon()]);
        assert!(combine_lines(&collection, 10).is_empty());
    }

    #[test]
    fn clean_removes_duplicates_and_collinear_points() {
        let collection = FeatureCollection::new(vec![line(
            vec![[0.0, 0.0], [0.0, 0.0], [1.0, 0.0], [2.0, 0.0], [2.0, 1.0]],
            "A",
        )]);
        let cleaned = clean_coords(&collection);
        assert_eq!(
            cleaned.features[0].geometry,
            Some(Geometry::LineString(vec![[0.0, 0.0], [2.0, 0.0], [2.0, 1.0]]))
        );
        assert_eq!(cleaned.features[0].property("layer"), Some(&json!("A")));
    }

    #[test]
    fn clean_drops_repeated_multipoint_members() {
        let collection = FeatureCollection::new(vec![Feature::new(
            Geometry::MultiPoint(vec![[1.0, 1.0], [2.0, 2.0], [1.0, 1.0]]),
            Properties::new(),
        )]);
        let cleaned = clean_coords(&collection);
        assert_eq!(
            cleaned.features[0].geometry,
            Some(Geometry::MultiPoint(vec![[1.0, 1.0], [2.0, 2.0]]))
        );
    }

    #[test]
    fn clean_keeps_spikes_that_turn_back() {
        let collection =
            FeatureCollection::new(vec![line(vec![[0.0, 0.0], [2.0, 0.0], [1.0, 0.0]], "A")]);
        let cleaned = clean_coords(&collection);
        assert_eq!(cleaned, collection);
    }

    #[test]
    fn clean_ring_stays_closed() {
        let feature = Feature::new(
            Geometry::Polygon(vec![vec![
                [0.0, 0.0],
                [1.0, 0.0],
                [2.0, 0.0],
                [2.0, 2.0],
                [2.0, 2.0],
                [0.0, 2.0],
                [0.0, 0.0],
            ]]),
            Properties::new(),
        );
        let cleaned = clean_coords(&FeatureCollection::new(vec![feature]));
        assert_eq!(
            cleaned.features[0].geometry,
            Some(Geometry::Polygon(vec![vec![
                [0.0, 0.0],
                [2.0, 0.0],
                [2.0, 2.0],
                [0.0, 2.0],
                [0.0, 0.0],
            ]]))
        );
    }

    #[test]
    fn degenerate_lines_pass_through_unchanged() {
        let collection = FeatureCollection::new(vec![line(vec![[1.0, 1.0], [1.0, 1.0]], "A")]);
        assert_eq!(clean_coords(&collection), collection);
    }
}
