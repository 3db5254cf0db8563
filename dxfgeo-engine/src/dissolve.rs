//! 面要素合并（dissolve）与多部件拆分（flatten）。

use dxfgeo_core::geojson::{Feature, FeatureCollection, Geometry};
use tracing::{debug, warn};

use crate::errors::EngineError;
use crate::planar::{GeoOps, PlanarOps, from_multi_polygon, to_multi_polygon};

/// 将全部面要素合并为一个要素，属性取自第一个面要素。
pub fn union_polygons(collection: &FeatureCollection) -> Result<Feature, EngineError> {
    union_polygons_with(collection, &GeoOps)
}

pub fn union_polygons_with<O: PlanarOps>(
    collection: &FeatureCollection,
    ops: &O,
) -> Result<Feature, EngineError> {
    let polygons: Vec<&Feature> = collection
        .features
        .iter()
        .filter(|feature| feature.is_polygonal())
        .collect();
    let Some((first, rest)) = polygons.split_first() else {
        return Err(EngineError::NoPolygons);
    };
    if rest.is_empty() {
        return Ok((*first).clone());
    }

    let mut merged = None;
    for (index, feature) in polygons.iter().enumerate() {
        let Some(shape) = feature.geometry.as_ref().and_then(to_multi_polygon) else {
            warn!(index, "面要素缺少有效外环，未参与合并");
            continue;
        };
        merged = Some(match merged {
            None => shape,
            Some(current) => ops.union(&current, &shape)?,
        });
    }
    let merged = merged.ok_or(EngineError::NoPolygons)?;
    debug!(
        inputs = polygons.len(),
        parts = merged.0.len(),
        "面要素合并完成"
    );

    let mut feature = Feature::new(from_multi_polygon(&merged), first.properties.clone());
    feature.id = first.id.clone();
    Ok(feature)
}

/// 多部件几何拆分为单部件要素，各部件复制父要素属性。
pub fn flatten(collection: &FeatureCollection) -> FeatureCollection {
    let mut features = Vec::with_capacity(collection.features.len());
    for feature in &collection.features {
        let parts: Vec<Geometry> = match &feature.geometry {
            Some(Geometry::MultiPoint(points)) => {
                points.iter().copied().map(Geometry::Point).collect()
            }
            Some(Geometry::MultiLineString(lines)) => {
                lines.iter().cloned().map(Geometry::LineString).collect()
            }
            Some(Geometry::MultiPolygon(polygons)) => {
                polygons.iter().cloned().map(Geometry::Polygon).collect()
            }
            _ => {
                features.push(feature.clone());
                continue;
            }
        };
        features.extend(
            parts
                .into_iter()
                .map(|geometry| Feature::new(geometry, feature.properties.clone())),
        );
    }
    FeatureCollection {
        features,
        ..collection.clone()
    }
}
