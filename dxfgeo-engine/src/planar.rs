//! 平面几何运算（差集、并集、面积、包围盒、相离判定）。默认实现基于 `geo`。

use std::panic::{self, AssertUnwindSafe};

use dxfgeo_core::geojson::{Geometry, Position};
use dxfgeo_core::geometry::{Bounds2D, Point2};
use geo::orient::{Direction, Orient};
use geo::{
    Area, BooleanOps, BoundingRect, Coord, Intersects, LineString, MultiPolygon, Polygon,
    RemoveRepeatedPoints,
};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryOpError {
    #[error("geometry contains non-finite coordinates")]
    NonFinite,
    #[error("geometry has no polygon rings")]
    Empty,
    #[error("boolean {0} panicked inside the planar backend")]
    Panicked(&'static str),
}

/// 可见性计算所依赖的平面运算集合，便于替换实现或在测试中计数。
pub trait PlanarOps {
    /// 统一外环为顺时针并去除重复坐标。
    fn normalize(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryOpError>;

    fn area(&self, geometry: &MultiPolygon<f64>) -> f64;

    fn bounding_box(&self, geometry: &MultiPolygon<f64>) -> Option<Bounds2D>;

    fn is_disjoint(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool;

    /// `a - b`；结果为空时返回 `Ok(None)`。
    fn difference(
        &self,
        a: &MultiPolygon<f64>,
        b: &MultiPolygon<f64>,
    ) -> Result<Option<MultiPolygon<f64>>, GeometryOpError>;

    fn union(
        &self,
        a: &MultiPolygon<f64>,
        b: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, GeometryOpError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct GeoOps;

impl PlanarOps for GeoOps {
    fn normalize(&self, geometry: &MultiPolygon<f64>) -> Result<MultiPolygon<f64>, GeometryOpError> {
        if geometry.0.is_empty() {
            return Err(GeometryOpError::Empty);
        }
        if !all_finite(geometry) {
            return Err(GeometryOpError::NonFinite);
        }
        Ok(geometry
            .remove_repeated_points()
            .orient(Direction::Reversed))
    }

    fn area(&self, geometry: &MultiPolygon<f64>) -> f64 {
        geometry.unsigned_area()
    }

    fn bounding_box(&self, geometry: &MultiPolygon<f64>) -> Option<Bounds2D> {
        geometry.bounding_rect().map(|rect| {
            Bounds2D::new(
                Point2::new(rect.min().x, rect.min().y),
                Point2::new(rect.max().x, rect.max().y),
            )
        })
    }

    fn is_disjoint(&self, a: &MultiPolygon<f64>, b: &MultiPolygon<f64>) -> bool {
        !a.intersects(b)
    }

    fn difference(
        &self,
        a: &MultiPolygon<f64>,
        b: &MultiPolygon<f64>,
    ) -> Result<Option<MultiPolygon<f64>>, GeometryOpError> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| a.difference(b)))
            .map_err(|_| GeometryOpError::Panicked("difference"))?;
        if result.0.is_empty() {
            Ok(None)
        } else {
            Ok(Some(result))
        }
    }

    fn union(
        &self,
        a: &MultiPolygon<f64>,
        b: &MultiPolygon<f64>,
    ) -> Result<MultiPolygon<f64>, GeometryOpError> {
        panic::catch_unwind(AssertUnwindSafe(|| a.union(b)))
            .map_err(|_| GeometryOpError::Panicked("union"))
    }
}

fn all_finite(geometry: &MultiPolygon<f64>) -> bool {
    geometry.0.iter().all(|polygon| {
        std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .all(|ring| ring.coords().all(|c| c.x.is_finite() && c.y.is_finite()))
    })
}

/// GeoJSON 面要素 → `geo::MultiPolygon`。非面几何或没有外环时返回 `None`。
pub fn to_multi_polygon(geometry: &Geometry) -> Option<MultiPolygon<f64>> {
    let polygons: Vec<Polygon<f64>> = match geometry {
        Geometry::Polygon(rings) => polygon_from_rings(rings).into_iter().collect(),
        Geometry::MultiPolygon(polygons) => polygons
            .iter()
            .filter_map(|rings| polygon_from_rings(rings))
            .collect(),
        _ => return None,
    };
    if polygons.is_empty() {
        None
    } else {
        Some(MultiPolygon::new(polygons))
    }
}

/// 单个多边形输出为 `Polygon`，其余输出为 `MultiPolygon`。
pub fn from_multi_polygon(geometry: &MultiPolygon<f64>) -> Geometry {
    let mut polygons: Vec<Vec<Vec<Position>>> = geometry.0.iter().map(polygon_to_rings).collect();
    if polygons.len() == 1 {
        Geometry::Polygon(polygons.remove(0))
    } else {
        Geometry::MultiPolygon(polygons)
    }
}

fn polygon_from_rings(rings: &[Vec<Position>]) -> Option<Polygon<f64>> {
    let (exterior, interiors) = rings.split_first()?;
    if exterior.is_empty() {
        return None;
    }
    Some(Polygon::new(
        ring_to_line_string(exterior),
        interiors
            .iter()
            .filter(|ring| !ring.is_empty())
            .map(|ring| ring_to_line_string(ring))
            .collect(),
    ))
}

fn ring_to_line_string(ring: &[Position]) -> LineString<f64> {
    LineString::new(ring.iter().map(|&[x, y]| Coord { x, y }).collect())
}

fn polygon_to_rings(polygon: &Polygon<f64>) -> Vec<Vec<Position>> {
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .map(|ring| ring.coords().map(|c| [c.x, c.y]).collect())
        .collect()
}
