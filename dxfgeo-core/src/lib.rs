pub mod geometry {
    use glam::DVec2;
    use serde::{Deserialize, Serialize};

    /// 二维点，内部以 `glam::DVec2` 表示，保持双精度以承载投影前的工程坐标。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Point2(pub DVec2);

    impl Point2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn from_vec(vec: DVec2) -> Self {
            Self(vec)
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }

        #[inline]
        pub fn vector_to(self, other: Point2) -> Vector2 {
            Vector2(other.0 - self.0)
        }

        #[inline]
        pub fn midpoint(self, other: Point2) -> Point2 {
            Self((self.0 + other.0) * 0.5)
        }

        #[inline]
        pub fn is_finite(self) -> bool {
            self.0.is_finite()
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }
    }

    /// 二维向量，主要用于椭圆主轴与弦向量。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Vector2(pub DVec2);

    impl Vector2 {
        #[inline]
        pub fn new(x: f64, y: f64) -> Self {
            Self(DVec2::new(x, y))
        }

        #[inline]
        pub fn length(self) -> f64 {
            self.0.length()
        }

        #[inline]
        pub fn length_squared(self) -> f64 {
            self.0.length_squared()
        }

        /// 逆时针旋转 90° 得到的垂直向量。
        #[inline]
        pub fn perp(self) -> Vector2 {
            Self(self.0.perp())
        }

        #[inline]
        pub fn as_vec2(self) -> DVec2 {
            self.0
        }

        #[inline]
        pub fn x(self) -> f64 {
            self.0.x
        }

        #[inline]
        pub fn y(self) -> f64 {
            self.0.y
        }
    }

    /// 轴对齐边界框，消隐计算中用于快速排除不相交的面。
    #[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
    pub struct Bounds2D {
        min: Point2,
        max: Point2,
    }

    impl Bounds2D {
        #[inline]
        pub fn new(min: Point2, max: Point2) -> Self {
            Self { min, max }
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.min.x() > self.max.x() || self.min.y() > self.max.y()
        }

        #[inline]
        pub fn min(&self) -> Point2 {
            self.min
        }

        #[inline]
        pub fn max(&self) -> Point2 {
            self.max
        }

        /// 两个边界框完全分离（不接触）时返回 `true`。
        pub fn is_disjoint(&self, other: &Bounds2D) -> bool {
            if self.is_empty() || other.is_empty() {
                return true;
            }
            other.min.x() > self.max.x()
                || other.max.x() < self.min.x()
                || other.min.y() > self.max.y()
                || other.max.y() < self.min.y()
        }
    }

}

pub mod document {
    use std::collections::HashMap;

    use serde::{Deserialize, Serialize};

    use crate::geometry::{Point2, Vector2};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct EntityId(u64);

    impl EntityId {
        /// 提供原始数值，便于日志输出。
        #[inline]
        pub fn get(self) -> u64 {
            self.0
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Layer {
        pub name: String,
    }

    impl Layer {
        #[inline]
        pub fn new(name: impl Into<String>) -> Self {
            Self { name: name.into() }
        }
    }

    /// DXF 实体的封闭集合。未映射的类型保留类型名与图层，转换阶段直接跳过。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub enum Entity {
        Line(Line),
        Circle(Circle),
        Arc(Arc),
        Ellipse(Ellipse),
        Polyline(Polyline),
        Solid(Solid),
        Other { kind: String, layer: String },
    }

    impl Entity {
        #[inline]
        pub fn layer_name(&self) -> &str {
            match self {
                Entity::Line(line) => &line.layer,
                Entity::Circle(circle) => &circle.layer,
                Entity::Arc(arc) => &arc.layer,
                Entity::Ellipse(ellipse) => &ellipse.layer,
                Entity::Polyline(polyline) => &polyline.layer,
                Entity::Solid(solid) => &solid.layer,
                Entity::Other { layer, .. } => layer,
            }
        }

        /// DXF 中的实体类型名，例如 `LINE`、`LWPOLYLINE`。
        pub fn kind_name(&self) -> &str {
            match self {
                Entity::Line(_) => "LINE",
                Entity::Circle(_) => "CIRCLE",
                Entity::Arc(_) => "ARC",
                Entity::Ellipse(_) => "ELLIPSE",
                Entity::Polyline(polyline) => match polyline.kind {
                    PolylineKind::Lightweight => "LWPOLYLINE",
                    PolylineKind::Heavy => "POLYLINE",
                },
                Entity::Solid(_) => "SOLID",
                Entity::Other { kind, .. } => kind,
            }
        }
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Line {
        pub start: Point2,
        pub end: Point2,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Circle {
        pub center: Point2,
        pub radius: f64,
        pub layer: String,
    }

    /// 圆弧实体，角度保持 DXF 原始的角度制（组码 50/51），逆时针方向。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Arc {
        pub center: Point2,
        pub radius: f64,
        pub start_angle: f64,
        pub end_angle: f64,
        pub layer: String,
    }

    /// 椭圆实体，记录主轴向量与参数范围（单位为弧度）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Ellipse {
        pub center: Point2,
        pub major_axis: Vector2,
        pub ratio: f64,
        pub start_parameter: f64,
        pub end_parameter: f64,
        pub layer: String,
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub enum PolylineKind {
        Lightweight,
        Heavy,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Polyline {
        pub kind: PolylineKind,
        pub vertices: Vec<PolylineVertex>,
        pub is_closed: bool,
        pub layer: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct PolylineVertex {
        pub position: Point2,
        pub bulge: f64,
    }

    impl PolylineVertex {
        #[inline]
        pub fn new(position: Point2) -> Self {
            Self {
                position,
                bulge: 0.0,
            }
        }

        #[inline]
        pub fn with_bulge(position: Point2, bulge: f64) -> Self {
            Self { position, bulge }
        }
    }

    /// SOLID 填充面，角点按组码 10/11/12/13 的存储顺序保存（3 或 4 个）。
    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct Solid {
        pub corners: Vec<Point2>,
        pub layer: String,
    }

    #[derive(Debug, Default, Clone, Serialize, Deserialize)]
    pub struct Document {
        layers: HashMap<String, Layer>,
        entities: Vec<(EntityId, Entity)>,
        next_entity_id: u64,
    }

    impl Document {
        pub fn new() -> Self {
            let mut doc = Self::default();
            doc.ensure_layer("0");
            doc
        }

        pub fn ensure_layer(&mut self, name: impl AsRef<str>) {
            let key = name.as_ref();
            self.layers
                .entry(key.to_string())
                .or_insert_with(|| Layer::new(key));
        }

        pub fn add_entity(&mut self, entity: Entity) -> EntityId {
            self.ensure_layer(entity.layer_name());
            let id = self.next_id();
            self.entities.push((id, entity));
            id
        }

        #[inline]
        pub fn layers(&self) -> impl Iterator<Item = &Layer> {
            self.layers.values()
        }

        #[inline]
        pub fn layer_count(&self) -> usize {
            self.layers.len()
        }

        #[inline]
        pub fn entities(&self) -> impl Iterator<Item = &(EntityId, Entity)> {
            self.entities.iter()
        }

        #[inline]
        pub fn entity_count(&self) -> usize {
            self.entities.len()
        }

        #[inline]
        fn next_id(&mut self) -> EntityId {
            let id = self.next_entity_id;
            self.next_entity_id += 1;
            EntityId(id)
        }
    }

}

pub mod geojson {
    //! GeoJSON 数据模型（RFC 7946 子集），坐标顺序为 `[经度, 纬度]`。

    use serde::{Deserialize, Deserializer, Serialize};
    use serde_json::{Map, Value};

    pub type Position = [f64; 2];
    pub type Properties = Map<String, Value>;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    #[serde(tag = "type", content = "coordinates")]
    pub enum Geometry {
        Point(Position),
        MultiPoint(Vec<Position>),
        LineString(Vec<Position>),
        MultiLineString(Vec<Vec<Position>>),
        Polygon(Vec<Vec<Position>>),
        MultiPolygon(Vec<Vec<Vec<Position>>>),
    }

    impl Geometry {
        pub fn type_name(&self) -> &'static str {
            match self {
                Geometry::Point(_) => "Point",
                Geometry::MultiPoint(_) => "MultiPoint",
                Geometry::LineString(_) => "LineString",
                Geometry::MultiLineString(_) => "MultiLineString",
                Geometry::Polygon(_) => "Polygon",
                Geometry::MultiPolygon(_) => "MultiPolygon",
            }
        }

        #[inline]
        pub fn is_polygonal(&self) -> bool {
            matches!(self, Geometry::Polygon(_) | Geometry::MultiPolygon(_))
        }

        #[inline]
        pub fn is_lineal(&self) -> bool {
            matches!(self, Geometry::LineString(_) | Geometry::MultiLineString(_))
        }
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub enum FeatureTag {
        #[default]
        Feature,
    }

    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
    pub enum CollectionTag {
        #[default]
        FeatureCollection,
    }

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub struct Feature {
        #[serde(rename = "type", default)]
        pub tag: FeatureTag,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub id: Option<Value>,
        #[serde(default)]
        pub geometry: Option<Geometry>,
        #[serde(default, deserialize_with = "null_as_empty")]
        pub properties: Properties,
    }

    impl Feature {
        pub fn new(geometry: Geometry, properties: Properties) -> Self {
            Self {
                tag: FeatureTag::Feature,
                id: None,
                geometry: Some(geometry),
                properties,
            }
        }

        #[inline]
        pub fn property(&self, key: &str) -> Option<&Value> {
            self.properties.get(key)
        }

        #[inline]
        pub fn is_polygonal(&self) -> bool {
            self.geometry.as_ref().is_some_and(Geometry::is_polygonal)
        }

        #[inline]
        pub fn geometry_type(&self) -> Option<&'static str> {
            self.geometry.as_ref().map(Geometry::type_name)
        }
    }

    #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
    pub struct FeatureCollection {
        #[serde(rename = "type", default)]
        pub tag: CollectionTag,
        #[serde(default)]
        pub features: Vec<Feature>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub crs: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub properties: Option<Properties>,
    }

    impl FeatureCollection {
        pub fn new(features: Vec<Feature>) -> Self {
            Self {
                features,
                ..Self::default()
            }
        }

        #[inline]
        pub fn len(&self) -> usize {
            self.features.len()
        }

        #[inline]
        pub fn is_empty(&self) -> bool {
            self.features.is_empty()
        }
    }

    fn null_as_empty<'de, D>(deserializer: D) -> Result<Properties, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Properties>::deserialize(deserializer).map(Option::unwrap_or_default)
    }

}
