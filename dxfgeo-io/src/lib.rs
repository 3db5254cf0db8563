use std::convert::TryFrom;
use std::fs;
use std::path::{Path, PathBuf};

use dxfgeo_core::{
    document::{
        Arc, Circle, Document, Ellipse, Entity, Line, Polyline, PolylineKind, PolylineVertex,
        Solid,
    },
    geojson::FeatureCollection,
    geometry::{Point2, Vector2},
};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum IoError {
    #[error("invalid or empty DXF: {0}")]
    InvalidDocument(String),
    #[error("failed to read file {path:?}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write file {path:?}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid GeoJSON in {path:?}: {source}")]
    InvalidGeoJson {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to encode GeoJSON: {0}")]
    Encode(#[from] serde_json::Error),
}

pub trait DocumentLoader {
    fn load(&self, path: &Path) -> Result<Document, IoError>;
}

pub trait CollectionLoader {
    fn load_collection(&self, path: &Path) -> Result<FeatureCollection, IoError>;
}

pub trait CollectionSaver {
    fn save_collection(&self, collection: &FeatureCollection, path: &Path) -> Result<(), IoError>;
}

/// DXF 文本读取入口。只解释 ENTITIES 段，其余段落整体跳过。
pub struct DxfFacade;

impl DxfFacade {
    pub fn new() -> Self {
        Self
    }

    /// 解析 DXF 文本。结构性错误（空内容、组码无法配对等）视为整体失败；
    /// 单个实体缺字段或数值损坏时记录警告并跳过该实体。
    pub fn parse_str(&self, content: &str) -> Result<Document, IoError> {
        DxfParser::new(content).parse().map_err(|err| match err {
            DxfError::Syntax { message } => IoError::InvalidDocument(message),
            DxfError::Entity { kind, message } => {
                IoError::InvalidDocument(format!("{kind}: {message}"))
            }
        })
    }

    /// 以 UTF-8（有损）解码字节后解析。
    pub fn parse_bytes(&self, bytes: &[u8]) -> Result<Document, IoError> {
        self.parse_str(&String::from_utf8_lossy(bytes))
    }
}

impl Default for DxfFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentLoader for DxfFacade {
    fn load(&self, path: &Path) -> Result<Document, IoError> {
        let data = fs::read(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        self.parse_bytes(&data)
    }
}

/// GeoJSON FeatureCollection 文件读写。
pub struct GeoJsonFacade {
    pretty: bool,
}

impl GeoJsonFacade {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn to_string(&self, collection: &FeatureCollection) -> Result<String, IoError> {
        let text = if self.pretty {
            serde_json::to_string_pretty(collection)?
        } else {
            serde_json::to_string(collection)?
        };
        Ok(text)
    }
}

impl Default for GeoJsonFacade {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectionLoader for GeoJsonFacade {
    fn load_collection(&self, path: &Path) -> Result<FeatureCollection, IoError> {
        let data = fs::read_to_string(path).map_err(|source| IoError::ReadError {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&data).map_err(|source| IoError::InvalidGeoJson {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl CollectionSaver for GeoJsonFacade {
    fn save_collection(&self, collection: &FeatureCollection, path: &Path) -> Result<(), IoError> {
        let text = self.to_string(collection)?;
        fs::write(path, text).map_err(|source| IoError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Debug)]
enum DxfError {
    Syntax { message: String },
    Entity { kind: &'static str, message: String },
}

impl DxfError {
    fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    fn entity(kind: &'static str, message: impl Into<String>) -> Self {
        Self::Entity {
            kind,
            message: message.into(),
        }
    }
}

struct DxfParser<'a> {
    reader: DxfReader<'a>,
}

impl<'a> DxfParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            reader: DxfReader::new(source),
        }
    }

    fn parse(mut self) -> Result<Document, DxfError> {
        let mut document = Document::new();
        let mut saw_content = false;
        while let Some((code, value)) = self.reader.next_pair()? {
            saw_content = true;
            if code == 999 {
                continue;
            }
            if code != 0 {
                return Err(DxfError::syntax(format!(
                    "意外的组码 {code}（期望 0 表示 SECTION/EOF）"
                )));
            }
            match value.trim() {
                "SECTION" => {
                    let (name_code, name) = self
                        .reader
                        .next_pair()?
                        .ok_or_else(|| DxfError::syntax("SECTION 缺少名称（组码 2）"))?;
                    if name_code != 2 {
                        return Err(DxfError::syntax(format!(
                            "SECTION 名称使用了组码 {name_code}（期望 2）"
                        )));
                    }
                    match name.trim() {
                        "ENTITIES" => self.parse_entities(&mut document)?,
                        _ => self.skip_section()?,
                    }
                }
                "EOF" => break,
                unexpected => {
                    return Err(DxfError::syntax(format!(
                        "意外的标记 {unexpected}，期望 SECTION 或 EOF"
                    )));
                }
            }
        }
        if !saw_content {
            return Err(DxfError::syntax("DXF 内容为空"));
        }
        Ok(document)
    }

    fn skip_section(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) if value.trim() == "ENDSEC" => break,
                Some(_) => continue,
                None => {
                    return Err(DxfError::syntax("SECTION 未找到 ENDSEC 终止标记"));
                }
            }
        }
        Ok(())
    }

    fn parse_entities(&mut self, document: &mut Document) -> Result<(), DxfError> {
        loop {
            let (code, value) = match self.reader.next_pair()? {
                Some(pair) => pair,
                None => return Err(DxfError::syntax("ENTITIES 段提前结束")),
            };
            if code != 0 {
                return Err(DxfError::syntax(format!(
                    "ENTITIES 段遇到组码 {code}（期望 0 表示实体起始）"
                )));
            }

            match value.trim() {
                "ENDSEC" => break,
                "SEQEND" => self.skip_entity_body()?,
                kind => match self.parse_entity(kind) {
                    Ok(entity) => {
                        document.add_entity(entity);
                    }
                    Err(DxfError::Entity { kind, message }) => {
                        warn!(kind, error = %message, "跳过无法解析的实体");
                        self.skip_entity_body()?;
                    }
                    Err(err) => return Err(err),
                },
            }
        }
        Ok(())
    }

    fn parse_entity(&mut self, kind: &str) -> Result<Entity, DxfError> {
        match kind {
            "LINE" => self.parse_line(),
            "CIRCLE" => self.parse_circle(),
            "ARC" => self.parse_arc(),
            "ELLIPSE" => self.parse_ellipse(),
            "LWPOLYLINE" => self.parse_lwpolyline(),
            "POLYLINE" => self.parse_polyline(),
            "SOLID" => self.parse_solid(),
            other => self.parse_other(other),
        }
    }

    fn parse_line(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut start_x = None;
        let mut start_y = None;
        let mut end_x = None;
        let mut end_y = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut start_x, &value, "LINE", "起点 X（组码 10）")?,
                    20 => assign_coord(&mut start_y, &value, "LINE", "起点 Y（组码 20）")?,
                    11 => assign_coord(&mut end_x, &value, "LINE", "终点 X（组码 11）")?,
                    21 => assign_coord(&mut end_y, &value, "LINE", "终点 Y（组码 21）")?,
                    30 | 31 => {} // 忽略 Z 坐标
                    _ => {}
                },
                None => return Err(DxfError::syntax("LINE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let sx = start_x.ok_or_else(|| DxfError::entity("LINE", "缺少起点 X（组码 10）"))?;
        let sy = start_y.ok_or_else(|| DxfError::entity("LINE", "缺少起点 Y（组码 20）"))?;
        let ex = end_x.ok_or_else(|| DxfError::entity("LINE", "缺少终点 X（组码 11）"))?;
        let ey = end_y.ok_or_else(|| DxfError::entity("LINE", "缺少终点 Y（组码 21）"))?;

        Ok(Entity::Line(Line {
            start: Point2::new(sx, sy),
            end: Point2::new(ex, ey),
            layer,
        }))
    }

    fn parse_circle(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center_x, &value, "CIRCLE", "圆心 X（组码 10）")?,
                    20 => assign_coord(&mut center_y, &value, "CIRCLE", "圆心 Y（组码 20）")?,
                    40 => assign_coord(&mut radius, &value, "CIRCLE", "半径（组码 40）")?,
                    _ => {}
                },
                None => return Err(DxfError::syntax("CIRCLE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let cx = center_x.ok_or_else(|| DxfError::entity("CIRCLE", "缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::entity("CIRCLE", "缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::entity("CIRCLE", "缺少半径（组码 40）"))?;

        Ok(Entity::Circle(Circle {
            center: Point2::new(cx, cy),
            radius,
            layer,
        }))
    }

    fn parse_arc(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center_x = None;
        let mut center_y = None;
        let mut radius = None;
        let mut start_angle = None;
        let mut end_angle = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center_x, &value, "ARC", "圆心 X（组码 10）")?,
                    20 => assign_coord(&mut center_y, &value, "ARC", "圆心 Y（组码 20）")?,
                    40 => assign_coord(&mut radius, &value, "ARC", "半径（组码 40）")?,
                    50 => assign_coord(&mut start_angle, &value, "ARC", "起始角（组码 50）")?,
                    51 => assign_coord(&mut end_angle, &value, "ARC", "终止角（组码 51）")?,
                    _ => {}
                },
                None => return Err(DxfError::syntax("ARC 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let cx = center_x.ok_or_else(|| DxfError::entity("ARC", "缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::entity("ARC", "缺少圆心 Y（组码 20）"))?;
        let radius = radius.ok_or_else(|| DxfError::entity("ARC", "缺少半径（组码 40）"))?;

        Ok(Entity::Arc(Arc {
            center: Point2::new(cx, cy),
            radius,
            start_angle: start_angle.unwrap_or(0.0),
            end_angle: end_angle.unwrap_or(0.0),
            layer,
        }))
    }

    fn parse_ellipse(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut center_x = None;
        let mut center_y = None;
        let mut major_x = None;
        let mut major_y = None;
        let mut ratio = None;
        let mut start_parameter = None;
        let mut end_parameter = None;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10 => assign_coord(&mut center_x, &value, "ELLIPSE", "圆心 X（组码 10）")?,
                    20 => assign_coord(&mut center_y, &value, "ELLIPSE", "圆心 Y（组码 20）")?,
                    11 => assign_coord(&mut major_x, &value, "ELLIPSE", "主轴向量 X（组码 11）")?,
                    21 => assign_coord(&mut major_y, &value, "ELLIPSE", "主轴向量 Y（组码 21）")?,
                    40 => assign_coord(&mut ratio, &value, "ELLIPSE", "半径比（组码 40）")?,
                    41 => {
                        start_parameter = Some(parse_f64(&value, "ELLIPSE", "起始参数（组码 41）")?)
                    }
                    42 => {
                        end_parameter = Some(parse_f64(&value, "ELLIPSE", "终止参数（组码 42）")?)
                    }
                    // Z 分量与法向量暂不参与平面投影
                    _ => {}
                },
                None => return Err(DxfError::syntax("ELLIPSE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        let cx = center_x.ok_or_else(|| DxfError::entity("ELLIPSE", "缺少圆心 X（组码 10）"))?;
        let cy = center_y.ok_or_else(|| DxfError::entity("ELLIPSE", "缺少圆心 Y（组码 20）"))?;
        let major_axis = Vector2::new(major_x.unwrap_or(1.0), major_y.unwrap_or(0.0));
        if major_axis.length_squared() < f64::EPSILON * f64::EPSILON {
            return Err(DxfError::entity("ELLIPSE", "主轴向量长度为 0"));
        }

        let ratio = ratio.unwrap_or(1.0);
        if ratio <= 0.0 {
            return Err(DxfError::entity(
                "ELLIPSE",
                format!("半径比必须为正数，实际为 {ratio}"),
            ));
        }

        Ok(Entity::Ellipse(Ellipse {
            center: Point2::new(cx, cy),
            major_axis,
            ratio,
            start_parameter: start_parameter.unwrap_or(0.0),
            end_parameter: end_parameter.unwrap_or(std::f64::consts::TAU),
            layer,
        }))
    }

    fn parse_lwpolyline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut is_closed = false;
        let mut vertices: Vec<PolylineVertex> = Vec::new();
        let mut pending_x: Option<f64> = None;
        let mut pending_y: Option<f64> = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => {
                        let flag = parse_i32(&value, "LWPOLYLINE", "标志（组码 70）")?;
                        is_closed = flag & 0x01 == 0x01;
                    }
                    10 => {
                        let x = parse_f64(&value, "LWPOLYLINE", "顶点 X（组码 10）")?;
                        if let Some(y) = pending_y.take() {
                            vertices.push(PolylineVertex::new(Point2::new(x, y)));
                        } else if pending_x.replace(x).is_some() {
                            return Err(DxfError::entity(
                                "LWPOLYLINE",
                                "顶点缺少对应的 Y（组码 20）",
                            ));
                        }
                    }
                    20 => {
                        let y = parse_f64(&value, "LWPOLYLINE", "顶点 Y（组码 20）")?;
                        if let Some(x) = pending_x.take() {
                            vertices.push(PolylineVertex::new(Point2::new(x, y)));
                        } else if pending_y.replace(y).is_some() {
                            return Err(DxfError::entity(
                                "LWPOLYLINE",
                                "顶点缺少对应的 X（组码 10）",
                            ));
                        }
                    }
                    42 => {
                        let bulge = parse_f64(&value, "LWPOLYLINE", "顶点 bulge（组码 42）")?;
                        match vertices.last_mut() {
                            Some(vertex) => vertex.bulge = bulge,
                            None => {
                                return Err(DxfError::entity(
                                    "LWPOLYLINE",
                                    "在定义首个顶点前遇到 bulge（组码 42）",
                                ));
                            }
                        }
                    }
                    _ => {}
                },
                None => return Err(DxfError::syntax("LWPOLYLINE 未正确结束")),
            }
        }

        if pending_x.is_some() || pending_y.is_some() {
            return Err(DxfError::entity(
                "LWPOLYLINE",
                "顶点坐标需成对出现（组码 10/20），检测到不完整的顶点",
            ));
        }

        if vertices.is_empty() {
            return Err(DxfError::entity("LWPOLYLINE", "未解析到任何顶点"));
        }

        Ok(Entity::Polyline(Polyline {
            kind: PolylineKind::Lightweight,
            vertices,
            is_closed,
            layer: layer.unwrap_or_else(|| "0".to_string()),
        }))
    }

    /// 旧式 POLYLINE：头部之后跟随若干 VERTEX 记录，以 SEQEND 结束。
    /// 多面网格（标志 0x40）与多边形网格（0x10）不属于平面轮廓，按未支持实体处理。
    fn parse_polyline(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut flags: i16 = 0;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    70 => flags = parse_i16(&value, "POLYLINE", "标志（组码 70）")?,
                    _ => {}
                },
                None => return Err(DxfError::syntax("POLYLINE 未正确结束")),
            }
        }

        let layer = layer.unwrap_or_else(|| "0".to_string());
        if flags & (0x40 | 0x10) != 0 {
            self.skip_polyline_sequence()?;
            debug!(flags, "POLYLINE 网格模式不参与平面转换");
            return Ok(Entity::Other {
                kind: "POLYLINE".to_string(),
                layer,
            });
        }

        let mut vertices = Vec::new();
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => {
                        if let Some(vertex) = self.parse_vertex_record()? {
                            vertices.push(vertex);
                        }
                    }
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        // 缺少 SEQEND 时以下一个实体为界
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => continue,
                None => return Err(DxfError::syntax("POLYLINE 顶点序列未正确结束")),
            }
        }

        if vertices.is_empty() {
            return Err(DxfError::entity("POLYLINE", "未解析到任何顶点"));
        }

        Ok(Entity::Polyline(Polyline {
            kind: PolylineKind::Heavy,
            vertices,
            is_closed: flags & 0x01 == 0x01,
            layer,
        }))
    }

    fn parse_vertex_record(&mut self) -> Result<Option<PolylineVertex>, DxfError> {
        let mut x = None;
        let mut y = None;
        let mut bulge = 0.0;
        let mut flags: i16 = 0;

        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    10 => x = Some(parse_f64(&value, "VERTEX", "X（组码 10）")?),
                    20 => y = Some(parse_f64(&value, "VERTEX", "Y（组码 20）")?),
                    42 => bulge = parse_f64(&value, "VERTEX", "bulge（组码 42）")?,
                    70 => flags = parse_i16(&value, "VERTEX", "标志（组码 70）")?,
                    _ => {}
                },
                None => return Err(DxfError::syntax("VERTEX 未正确结束")),
            }
        }

        // 样条拟合控制点不属于可见轮廓
        if flags & 0x10 != 0 {
            return Ok(None);
        }

        match (x, y) {
            (Some(x), Some(y)) => Ok(Some(PolylineVertex::with_bulge(Point2::new(x, y), bulge))),
            _ => Err(DxfError::entity("VERTEX", "缺少完整的 XY 坐标")),
        }
    }

    fn skip_polyline_sequence(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => match value.trim() {
                    "VERTEX" => self.skip_entity_body()?,
                    "SEQEND" => {
                        self.skip_entity_body()?;
                        break;
                    }
                    _ => {
                        self.reader.put_back((0, value));
                        break;
                    }
                },
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }

    fn parse_solid(&mut self) -> Result<Entity, DxfError> {
        let mut layer = None;
        let mut xs: [Option<f64>; 4] = [None; 4];
        let mut ys: [Option<f64>; 4] = [None; 4];
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((code, value)) => match code {
                    8 => layer = Some(value.trim().to_string()),
                    10..=13 => {
                        let index = (code - 10) as usize;
                        assign_coord(&mut xs[index], &value, "SOLID", "角点 X")?;
                    }
                    20..=23 => {
                        let index = (code - 20) as usize;
                        assign_coord(&mut ys[index], &value, "SOLID", "角点 Y")?;
                    }
                    _ => {}
                },
                None => return Err(DxfError::syntax("SOLID 未正确结束")),
            }
        }

        let mut corners = Vec::with_capacity(4);
        for (index, (x, y)) in xs.into_iter().zip(ys).enumerate() {
            if let Some(corner) = build_corner(index, x, y)? {
                corners.push(corner);
            }
        }
        if corners.len() < 3 {
            return Err(DxfError::entity(
                "SOLID",
                format!("至少需要 3 个角点，实际为 {}", corners.len()),
            ));
        }

        Ok(Entity::Solid(Solid {
            corners,
            layer: layer.unwrap_or_else(|| "0".to_string()),
        }))
    }

    /// 文字、填充、块参照等实体只记录类型与图层。
    fn parse_other(&mut self, kind: &str) -> Result<Entity, DxfError> {
        let mut layer = None;
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some((8, value)) => layer = Some(value.trim().to_string()),
                Some(_) => continue,
                None => break,
            }
        }
        Ok(Entity::Other {
            kind: kind.to_string(),
            layer: layer.unwrap_or_else(|| "0".to_string()),
        })
    }

    fn skip_entity_body(&mut self) -> Result<(), DxfError> {
        loop {
            match self.reader.next_pair()? {
                Some((0, value)) => {
                    self.reader.put_back((0, value));
                    break;
                }
                Some(_) => continue,
                None => break,
            }
        }
        Ok(())
    }
}

struct DxfReader<'a> {
    lines: std::str::Lines<'a>,
    buffer: Option<(i32, String)>,
    line_number: usize,
}

impl<'a> DxfReader<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            lines: source.trim_start_matches('\u{feff}').lines(),
            buffer: None,
            line_number: 0,
        }
    }

    fn next_pair(&mut self) -> Result<Option<(i32, String)>, DxfError> {
        if let Some(pair) = self.buffer.take() {
            return Ok(Some(pair));
        }

        let code_line = loop {
            match self.lines.next() {
                Some(line) => {
                    self.line_number += 1;
                    // 文件末尾的空行不构成组码
                    if !line.trim().is_empty() {
                        break line;
                    }
                }
                None => return Ok(None),
            }
        };

        let value_line = match self.lines.next() {
            Some(line) => {
                self.line_number += 1;
                line
            }
            None => {
                return Err(DxfError::syntax(format!(
                    "文件在第 {} 行结束，缺少与组码对应的值行",
                    self.line_number
                )));
            }
        };

        let code = code_line.trim().parse::<i32>().map_err(|_| {
            DxfError::syntax(format!(
                "第 {} 行的组码 \"{}\" 无法解析为整数",
                self.line_number - 1,
                code_line.trim()
            ))
        })?;
        let value = value_line.trim_end_matches('\r').to_string();
        Ok(Some((code, value)))
    }

    fn put_back(&mut self, pair: (i32, String)) {
        debug_assert!(self.buffer.is_none(), "内部错误：尝试多次回退 DXF pair");
        self.buffer = Some(pair);
    }
}

fn assign_coord(
    slot: &mut Option<f64>,
    raw: &str,
    kind: &'static str,
    context: &str,
) -> Result<(), DxfError> {
    if slot.is_some() {
        return Err(DxfError::entity(kind, format!("{context} 出现重复值")));
    }
    *slot = Some(parse_f64(raw, kind, context)?);
    Ok(())
}

fn build_corner(index: usize, x: Option<f64>, y: Option<f64>) -> Result<Option<Point2>, DxfError> {
    match (x, y) {
        (None, None) => Ok(None),
        (Some(x), Some(y)) => Ok(Some(Point2::new(x, y))),
        _ => Err(DxfError::entity(
            "SOLID",
            format!("角点 {index} 缺少完整的 XY 坐标"),
        )),
    }
}

fn parse_f64(raw: &str, kind: &'static str, context: &str) -> Result<f64, DxfError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|_| DxfError::entity(kind, format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i32(raw: &str, kind: &'static str, context: &str) -> Result<i32, DxfError> {
    raw.trim()
        .parse::<i32>()
        .map_err(|_| DxfError::entity(kind, format!("{context} 解析失败（值：\"{raw}\"）")))
}

fn parse_i16(raw: &str, kind: &'static str, context: &str) -> Result<i16, DxfError> {
    let value = parse_i32(raw, kind, context)?;
    i16::try_from(value)
        .map_err(|_| DxfError::entity(kind, format!("{context} 超出 i16 范围（值：{value}）")))
}
