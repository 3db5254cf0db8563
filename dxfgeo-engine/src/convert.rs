//! DXF 实体 → GeoJSON 要素映射。

use std::f64::consts::TAU;
use std::path::Path;

use dxfgeo_core::document::{Arc, Circle, Document, Ellipse, Entity, Line, Polyline, Solid};
use dxfgeo_core::geojson::{Feature, FeatureCollection, Geometry, Position, Properties};
use dxfgeo_core::geometry::Point2;
use dxfgeo_io::{DocumentLoader, DxfFacade, IoError};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::projection::{Projector, Utm, project_or_input};
use crate::rings::close_if_needed;
use crate::tessellate::{
    DEFAULT_SEGMENTS_PER_ARC, counter_clockwise_end, tessellate_arc, tessellate_bulge,
    tessellate_ellipse,
};

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to parse DXF file: {0}")]
    Dxf(#[from] IoError),
}

#[derive(Debug, Clone, Copy)]
pub struct ConvertOptions {
    pub segments_per_arc: usize,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            segments_per_arc: DEFAULT_SEGMENTS_PER_ARC,
        }
    }
}

pub struct Converter {
    projector: Box<dyn Projector>,
    options: ConvertOptions,
}

impl Converter {
    pub fn new(projector: Box<dyn Projector>, options: ConvertOptions) -> Self {
        Self {
            projector,
            options,
        }
    }

    #[inline]
    pub fn projector(&self) -> &dyn Projector {
        self.projector.as_ref()
    }

    #[inline]
    pub fn options(&self) -> ConvertOptions {
        self.options
    }

    /// 解析 DXF 文本并转换。仅当文本整体无法解析时返回错误。
    pub fn parse_dxf_to_geojson(&self, content: &str) -> Result<FeatureCollection, ConvertError> {
        let document = DxfFacade::new().parse_str(content)?;
        Ok(self.convert_document(&document))
    }

    pub fn convert_dxf_bytes(&self, bytes: &[u8]) -> Result<FeatureCollection, ConvertError> {
        let document = DxfFacade::new().parse_bytes(bytes)?;
        Ok(self.convert_document(&document))
    }

    pub fn convert_dxf_file(&self, path: &Path) -> Result<FeatureCollection, ConvertError> {
        let document = DxfFacade::new().load(path)?;
        Ok(self.convert_document(&document))
    }

    pub fn convert_document(&self, document: &Document) -> FeatureCollection {
        let mut features = Vec::with_capacity(document.entity_count());
        for (id, entity) in document.entities() {
            match self.convert_entity(entity) {
                Some(feature) => features.push(feature),
                None => debug!(
                    id = id.get(),
                    kind = entity.kind_name(),
                    layer = entity.layer_name(),
                    "实体未生成要素"
                ),
            }
        }
        info!(
            entities = document.entity_count(),
            layers = document.layer_count(),
            features = features.len(),
            projector = %self.projector.name(),
            "DXF 转换完成"
        );
        FeatureCollection::new(features)
    }

    /// 单个实体的映射；不支持或无法转换的实体返回 `None`。
    pub fn convert_entity(&self, entity: &Entity) -> Option<Feature> {
        let mut shape = ShapeBuilder::new(self.projector.as_ref());
        let (geometry, closed) = match entity {
            Entity::Line(line) => (shape.line(line)?, None),
            Entity::Polyline(polyline) => {
                let (geometry, closed) = shape.polyline(polyline, self.options.segments_per_arc)?;
                (geometry, Some(closed))
            }
            Entity::Arc(arc) => (shape.arc(arc, self.options.segments_per_arc)?, None),
            Entity::Circle(circle) => (shape.circle(circle, self.options.segments_per_arc)?, None),
            Entity::Ellipse(ellipse) => {
                (shape.ellipse(ellipse, self.options.segments_per_arc)?, None)
            }
            Entity::Solid(solid) => (shape.solid(solid)?, None),
            Entity::Other { .. } => return None,
        };

        let mut properties = Properties::new();
        properties.insert(
            "layer".to_string(),
            Value::String(entity.layer_name().to_string()),
        );
        properties.insert(
            "entityType".to_string(),
            Value::String(entity.kind_name().to_string()),
        );
        if let Some(closed) = closed {
            properties.insert("closed".to_string(), Value::Bool(closed));
        }
        if shape.fell_back {
            properties.insert("projectionFallback".to_string(), Value::Bool(true));
        }
        Some(Feature::new(geometry, properties))
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new(Box::new(Utm::default()), ConvertOptions::default())
    }
}

/// 逐点投影并记录是否发生过回退。
struct ShapeBuilder<'a> {
    projector: &'a dyn Projector,
    fell_back: bool,
}

impl<'a> ShapeBuilder<'a> {
    fn new(projector: &'a dyn Projector) -> Self {
        Self {
            projector,
            fell_back: false,
        }
    }

    fn project(&mut self, point: Point2) -> Position {
        let projected = project_or_input(self.projector, point.x(), point.y());
        self.fell_back |= projected.fell_back;
        projected.position
    }

    fn project_all(&mut self, points: impl IntoIterator<Item = Point2>) -> Vec<Position> {
        points.into_iter().map(|point| self.project(point)).collect()
    }

    fn line(&mut self, line: &Line) -> Option<Geometry> {
        if !line.start.is_finite() || !line.end.is_finite() {
            return None;
        }
        Some(Geometry::LineString(vec![
            self.project(line.start),
            self.project(line.end),
        ]))
    }

    fn polyline(&mut self, polyline: &Polyline, segments: usize) -> Option<(Geometry, bool)> {
        let vertices = &polyline.vertices;
        if vertices.len() < 2 {
            return None;
        }
        if vertices
            .iter()
            .any(|vertex| !vertex.position.is_finite() || !vertex.bulge.is_finite())
        {
            return None;
        }

        let count = vertices.len();
        let pairs = if polyline.is_closed { count } else { count - 1 };
        let mut coords = Vec::with_capacity(count + 1);
        coords.push(self.project(vertices[0].position));
        for index in 0..pairs {
            let current = &vertices[index];
            let next = &vertices[(index + 1) % count];
            if current.bulge != 0.0 {
                let arc = tessellate_bulge(current.position, next.position, current.bulge, segments);
                coords.extend(self.project_all(arc));
            } else {
                coords.push(self.project(next.position));
            }
        }

        if polyline.is_closed {
            let ring = close_if_needed(coords);
            if ring.len() >= 4 {
                return Some((Geometry::Polygon(vec![ring]), true));
            }
            return Some((Geometry::LineString(ring), false));
        }
        Some((Geometry::LineString(coords), false))
    }

    fn arc(&mut self, arc: &Arc, segments: usize) -> Option<Geometry> {
        if !valid_radius(arc.radius) || !arc.center.is_finite() {
            return None;
        }
        if !arc.start_angle.is_finite() || !arc.end_angle.is_finite() {
            return None;
        }
        let start = arc.start_angle.to_radians();
        let end = counter_clockwise_end(start, arc.end_angle.to_radians());
        let points = tessellate_arc(arc.center, arc.radius, start, end, segments);
        Some(Geometry::LineString(self.project_all(points)))
    }

    fn circle(&mut self, circle: &Circle, segments: usize) -> Option<Geometry> {
        if !valid_radius(circle.radius) || !circle.center.is_finite() {
            return None;
        }
        let mut points = tessellate_arc(circle.center, circle.radius, 0.0, TAU, segments);
        points.pop();
        let ring = close_if_needed(self.project_all(points));
        if ring.len() < 4 {
            return None;
        }
        Some(Geometry::Polygon(vec![ring]))
    }

    fn ellipse(&mut self, ellipse: &Ellipse, segments: usize) -> Option<Geometry> {
        let axis = ellipse.major_axis;
        if !ellipse.center.is_finite() || !axis.x().is_finite() || !axis.y().is_finite() {
            return None;
        }
        if !ellipse.ratio.is_finite() || ellipse.ratio <= 0.0 || axis.length() == 0.0 {
            return None;
        }
        if !ellipse.start_parameter.is_finite() || !ellipse.end_parameter.is_finite() {
            return None;
        }
        let end = counter_clockwise_end(ellipse.start_parameter, ellipse.end_parameter);
        let points = tessellate_ellipse(
            ellipse.center,
            axis,
            ellipse.ratio,
            ellipse.start_parameter,
            end,
            segments,
        );
        Some(Geometry::LineString(self.project_all(points)))
    }

    fn solid(&mut self, solid: &Solid) -> Option<Geometry> {
        let corners = &solid.corners;
        if corners.len() < 3 || corners.iter().any(|corner| !corner.is_finite()) {
            return None;
        }
        // DXF 的第 3、4 角点是交叉存储的，按 1,2,4,3 绕行
        let ordered: Vec<Point2> = match corners.as_slice() {
            [a, b, c, d] => vec![*a, *b, *d, *c],
            _ => corners.iter().take(3).copied().collect(),
        };
        let mut coords = self.project_all(ordered);
        coords.dedup();
        let ring = close_if_needed(coords);
        if ring.len() < 4 {
            return None;
        }
        Some(Geometry::Polygon(vec![ring]))
    }
}

#[inline]
fn valid_radius(radius: f64) -> bool {
    radius.is_finite() && radius > 0.0
}
