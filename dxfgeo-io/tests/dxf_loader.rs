
use std::path::PathBuf;

use golden::assert_golden;
use dxfgeo_core::document::{Entity, PolylineKind};
use dxfgeo_core::geojson::{Feature, FeatureCollection, Geometry, Properties};
use dxfgeo_io::{
    CollectionLoader, CollectionSaver, DocumentLoader, DxfFacade, GeoJsonFacade, IoError,
};
use serde_json::json;

fn fixture(name: &str) -> PathBuf {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests/data");
    path.push(name);
    path
}

#[test]
fn load_basic_entities_matches_expected_document() {
    let loader = DxfFacade::new();
    let doc = loader
        .load(&fixture("basic_entities.dxf"))
        .expect("读取 DXF 失败");
    assert_golden("basic_entities", &doc);
}

#[test]
fn load_polyline_with_bulge_preserves_value() {
    let loader = DxfFacade::new();
    let doc = loader
        .load(&fixture("bulge_polyline.dxf"))
        .expect("读取带 bulge 的 DXF 失败");
    assert_golden("bulge_polyline", &doc);

    let mut polylines = doc.entities().filter_map(|(_, entity)| match entity {
        Entity::Polyline(polyline) => Some(polyline),
        _ => None,
    });

    let polyline = polylines.next().expect("未找到多段线实体");
    assert!(polylines.next().is_none(), "期望仅有一个多段线实体");
    assert_eq!(polyline.vertices.len(), 2);
    assert!((polyline.vertices[0].bulge - 1.0).abs() < 1e-9);
    assert!(polyline.vertices[1].bulge.abs() < 1e-9);
    assert!(!polyline.is_closed);
}

#[test]
fn load_heavy_polyline_and_solid() {
    let loader = DxfFacade::new();
    let doc = loader
        .load(&fixture("heavy_polyline.dxf"))
        .expect("读取 POLYLINE DXF 失败");
    assert_golden("heavy_polyline", &doc);

    let heavy = doc
        .entities()
        .find_map(|(_, entity)| match entity {
            Entity::Polyline(polyline) if polyline.kind == PolylineKind::Heavy => Some(polyline),
            _ => None,
        })
        .expect("未找到旧式多段线");
    assert!(heavy.is_closed);
    assert_eq!(heavy.vertices.len(), 3);

    let mesh = doc
        .entities()
        .find(|(_, entity)| entity.layer_name() == "MESH")
        .map(|(_, entity)| entity)
        .expect("未找到网格多段线");
    assert!(matches!(mesh, Entity::Other { kind, .. } if kind == "POLYLINE"));
}

#[test]
fn text_only_drawing_yields_unsupported_entities() {
    let loader = DxfFacade::new();
    let doc = loader.load(&fixture("text_only.dxf")).expect("读取文字 DXF 失败");
    let kinds: Vec<&str> = doc.entities().map(|(_, entity)| entity.kind_name()).collect();
    assert_eq!(kinds, vec!["TEXT", "MTEXT"]);
    let mut layers: Vec<&str> = doc.layers().map(|layer| layer.name.as_str()).collect();
    layers.sort_unstable();
    assert_eq!(layers, vec!["0", "ANNOT"]);
}

#[test]
fn malformed_entity_is_skipped_and_parsing_continues() {
    let loader = DxfFacade::new();
    let doc = loader
        .load(&fixture("malformed_entity.dxf"))
        .expect("单个实体损坏不应导致整体失败");
    assert_eq!(doc.entity_count(), 1);
    let (_, entity) = doc.entities().next().expect("缺少实体");
    match entity {
        Entity::Circle(circle) => {
            assert_eq!(circle.layer, "KEEP");
            assert!((circle.radius - 0.5).abs() < 1e-9);
        }
        other => panic!("期望 CIRCLE，实际为 {}", other.kind_name()),
    }
}

#[test]
fn empty_content_is_invalid() {
    let facade = DxfFacade::new();
    for content in ["", "   \n\n  \n"] {
        let err = facade.parse_str(content).expect_err("空内容应报错");
        assert!(matches!(err, IoError::InvalidDocument(_)));
        assert!(err.to_string().starts_with("invalid or empty DXF"));
    }
}

#[test]
fn dangling_group_code_is_a_syntax_error() {
    let facade = DxfFacade::new();
    let err = facade
        .parse_str("0\nSECTION\n2\nENTITIES\n0\n")
        .expect_err("缺少值行应报错");
    assert!(matches!(err, IoError::InvalidDocument(_)));

    let err = facade
        .parse_str("nonsense\nvalue\n")
        .expect_err("非整数组码应报错");
    assert!(matches!(err, IoError::InvalidDocument(_)));
}

#[test]
fn parse_bytes_tolerates_crlf_and_bom() {
    let raw = "\u{feff}0\r\nSECTION\r\n2\r\nENTITIES\r\n0\r\nLINE\r\n8\r\nA\r\n10\r\n1.0\r\n20\r\n2.0\r\n11\r\n3.0\r\n21\r\n4.0\r\n0\r\nENDSEC\r\n0\r\nEOF\r\n";
    let doc = DxfFacade::new()
        .parse_bytes(raw.as_bytes())
        .expect("CRLF 内容应可解析");
    match doc.entities().next().map(|(_, entity)| entity) {
        Some(Entity::Line(line)) => {
            assert_eq!(line.layer, "A");
            assert!((line.end.x() - 3.0).abs() < 1e-9);
            assert!((line.end.y() - 4.0).abs() < 1e-9);
        }
        _ => panic!("期望 LINE 实体"),
    }
}

#[test]
fn missing_file_reports_read_error() {
    let err = DxfFacade::new()
        .load(&fixture("does_not_exist.dxf"))
        .expect_err("文件不存在应报错");
    assert!(matches!(err, IoError::ReadError { .. }));
}

#[test]
fn geojson_collection_round_trips_through_disk() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("out.geojson");

    let mut properties = Properties::new();
    properties.insert("layer".to_string(), json!("WALLS"));
    let collection = FeatureCollection::new(vec![Feature::new(
        Geometry::LineString(vec![[81.0, 0.0], [81.5, 0.25]]),
        properties,
    )]);

    let facade = GeoJsonFacade::new();
    facade
        .save_collection(&collection, &path)
        .expect("写出 GeoJSON 失败");
    let loaded = facade.load_collection(&path).expect("读取 GeoJSON 失败");
    assert_eq!(loaded, collection);
}

#[test]
fn invalid_geojson_reports_path() {
    let dir = tempfile::tempdir().expect("创建临时目录失败");
    let path = dir.path().join("broken.geojson");
    std::fs::write(&path, "{ not json").expect("写入临时文件失败");
    let err = GeoJsonFacade::new()
        .load_collection(&path)
        .expect_err("非法 JSON 应报错");
    assert!(matches!(err, IoError::InvalidGeoJson { .. }));
}
