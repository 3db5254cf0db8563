//! 重叠面消隐：按叠放次序自上而下扣除被遮挡部分，覆盖率过高的面直接丢弃。

use dxfgeo_core::geojson::{Feature, FeatureCollection, Geometry};
use dxfgeo_core::geometry::Bounds2D;
use geo::MultiPolygon;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::planar::{GeoOps, PlanarOps, from_multi_polygon, to_multi_polygon};

const MIN_AREA: f64 = 1e-8;

pub const DEFAULT_ORDER_BY: &str = "z";
pub const DEFAULT_MIN_COVERED_PCT: f64 = 70.0;

#[derive(Debug, Clone, PartialEq)]
pub struct VisibilityOptions {
    /// 叠放次序属性名，值越大越靠上。
    pub order_by: String,
    /// 覆盖率达到该百分比（0..=100）即丢弃。
    pub min_covered_pct: f64,
    /// 保留时输出可见剩余部分，否则输出原始几何。
    pub clip_remainder: bool,
}

impl Default for VisibilityOptions {
    fn default() -> Self {
        Self {
            order_by: DEFAULT_ORDER_BY.to_string(),
            min_covered_pct: DEFAULT_MIN_COVERED_PCT,
            clip_remainder: true,
        }
    }
}

struct Occluder {
    geometry: MultiPolygon<f64>,
    bounds: Option<Bounds2D>,
}

enum Visibility {
    Covered,
    Visible(MultiPolygon<f64>),
}

/// 使用默认的 `geo` 后端执行消隐。
pub fn keep_top_visible(
    collection: &FeatureCollection,
    options: &VisibilityOptions,
) -> FeatureCollection {
    keep_top_visible_with(collection, options, &GeoOps)
}

pub fn keep_top_visible_with<O: PlanarOps>(
    collection: &FeatureCollection,
    options: &VisibilityOptions,
    ops: &O,
) -> FeatureCollection {
    let mut ordered: Vec<&Feature> = collection
        .features
        .iter()
        .filter(|feature| feature.is_polygonal())
        .collect();
    // sort_by 为稳定排序，同值保持输入次序
    ordered.sort_by(|a, b| {
        stacking_key(b, &options.order_by).total_cmp(&stacking_key(a, &options.order_by))
    });
    debug!(polygons = ordered.len(), "开始消隐计算");

    let mut kept = Vec::new();
    let mut top: Vec<Occluder> = Vec::new();

    for (index, feature) in ordered.into_iter().enumerate() {
        let Some(original) = feature.geometry.as_ref().and_then(to_multi_polygon) else {
            warn!(index, "面要素缺少有效外环，已跳过");
            continue;
        };
        let prepared = match ops.normalize(&original) {
            Ok(normalized) => normalized,
            Err(err) => {
                debug!(index, error = %err, "规范化失败，使用原始几何");
                original
            }
        };
        let area = ops.area(&prepared).max(MIN_AREA);
        let bounds = ops.bounding_box(&prepared);

        match visible_part(&prepared, bounds.as_ref(), area, &top, options, ops, index) {
            Visibility::Visible(remainder) => {
                let geometry = if options.clip_remainder {
                    from_multi_polygon(&remainder)
                } else {
                    feature.geometry.clone().unwrap_or_else(|| from_multi_polygon(&remainder))
                };
                let mut output = Feature::new(geometry, feature.properties.clone());
                output.id = feature.id.clone();
                kept.push(output);
            }
            Visibility::Covered => debug!(index, "面要素被上层覆盖，已丢弃"),
        }

        top.push(Occluder {
            geometry: prepared,
            bounds,
        });
    }

    info!(
        input = collection.features.len(),
        kept = kept.len(),
        "消隐计算完成"
    );
    FeatureCollection::new(kept)
}

fn visible_part<O: PlanarOps>(
    prepared: &MultiPolygon<f64>,
    bounds: Option<&Bounds2D>,
    area: f64,
    top: &[Occluder],
    options: &VisibilityOptions,
    ops: &O,
    index: usize,
) -> Visibility {
    let mut visible = prepared.clone();
    for occluder in top {
        if let (Some(own), Some(other)) = (bounds, occluder.bounds.as_ref()) {
            if own.is_disjoint(other) {
                continue;
            }
        }
        if ops.is_disjoint(&visible, &occluder.geometry) {
            continue;
        }

        match ops.difference(&visible, &occluder.geometry) {
            Ok(Some(remainder)) => visible = remainder,
            Ok(None) => return Visibility::Covered,
            Err(err) => {
                warn!(index, error = %err, "差集运算失败，跳过该遮挡面");
                continue;
            }
        }

        let covered_pct = (1.0 - ops.area(&visible) / area) * 100.0;
        if covered_pct >= options.min_covered_pct {
            return Visibility::Covered;
        }
    }
    Visibility::Visible(visible)
}

/// 缺失或非数值的叠放值按 0 处理。
fn stacking_key(feature: &Feature, key: &str) -> f64 {
    feature
        .property(key)
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

/// 按数组次序写入 `z = start_z - index`，首个要素位于最上层。
pub fn add_z_index(features: Vec<Feature>, start_z: Option<i64>) -> Vec<Feature> {
    let start_z = start_z.unwrap_or(features.len() as i64);
    features
        .into_iter()
        .enumerate()
        .map(|(index, mut feature)| {
            feature
                .properties
                .insert("z".to_string(), Value::from(start_z - index as i64));
            feature
        })
        .collect()
}

/// 面要素消隐的完整入口：筛选面要素、必要时补充 `z`，再替换输入集合中的要素。
///
/// 空集合或不含面要素时原样返回。
pub fn process_overlapping_polygons(
    collection: &FeatureCollection,
    options: &VisibilityOptions,
) -> FeatureCollection {
    process_overlapping_polygons_with(collection, options, &GeoOps)
}

pub fn process_overlapping_polygons_with<O: PlanarOps>(
    collection: &FeatureCollection,
    options: &VisibilityOptions,
    ops: &O,
) -> FeatureCollection {
    if collection.is_empty() {
        return collection.clone();
    }

    let polygons: Vec<Feature> = collection
        .features
        .iter()
        .filter(|feature| {
            matches!(
                feature.geometry,
                Some(Geometry::Polygon(_)) | Some(Geometry::MultiPolygon(_))
            )
        })
        .cloned()
        .collect();
    if polygons.is_empty() {
        debug!("集合中没有面要素，跳过消隐");
        return collection.clone();
    }

    let stacked = if polygons.iter().any(|feature| feature.property("z").is_some()) {
        polygons
    } else {
        add_z_index(polygons, None)
    };

    let visible = keep_top_visible_with(&FeatureCollection::new(stacked), options, ops);
    FeatureCollection {
        features: visible.features,
        ..collection.clone()
    }
}
