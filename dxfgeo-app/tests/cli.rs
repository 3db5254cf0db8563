use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

fn entities(body: &str) -> String {
    format!("0\nSECTION\n2\nENTITIES\n{body}0\nENDSEC\n0\nEOF\n")
}

fn square(x0: f64, y0: f64, size: f64, layer: &str) -> String {
    let x1 = x0 + size;
    let y1 = y0 + size;
    format!(
        "0\nLWPOLYLINE\n8\n{layer}\n90\n4\n70\n1\n10\n{x0}\n20\n{y0}\n10\n{x1}\n20\n{y0}\n10\n{x1}\n20\n{y1}\n10\n{x0}\n20\n{y1}\n"
    )
}

const LINE: &str = "0\nLINE\n8\nWALLS\n10\n0.0\n20\n0.0\n11\n10.0\n21\n0.0\n";

fn write_input(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("写入输入文件");
    path
}

/// 在临时目录中运行，避免读到仓库里的配置。
fn dxfgeo(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dxfgeo").expect("binary");
    cmd.current_dir(dir).env_remove("DXFGEO_CONFIG");
    cmd
}

fn parse_stdout(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout 应为 GeoJSON")
}

#[test]
fn converts_dxf_to_stdout_with_identity_projection() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(&dir, "drawing.dxf", &entities(LINE));

    let output = dxfgeo(dir.path())
        .arg(&input)
        .arg("--identity")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = parse_stdout(&output);
    assert_eq!(json["type"], "FeatureCollection");
    let features = json["features"].as_array().expect("features");
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["properties"]["layer"], "WALLS");
    assert_eq!(features[0]["properties"]["entityType"], "LINE");
    assert_eq!(
        features[0]["geometry"]["coordinates"],
        serde_json::json!([[0.0, 0.0], [10.0, 0.0]])
    );
}

#[test]
fn default_projection_is_utm_zone_44() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(&dir, "drawing.dxf", &entities(LINE));

    let output = dxfgeo(dir.path()).arg(&input).assert().success().get_output().stdout.clone();

    let json = parse_stdout(&output);
    let lon = json["features"][0]["geometry"]["coordinates"][0][0]
        .as_f64()
        .expect("lon");
    assert!(lon > 76.0 && lon < 77.0, "经度 {lon}");
}

#[test]
fn resolve_stage_drops_fully_covered_polygon_and_writes_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let body = format!("{}{}{}", square(0.0, 0.0, 2.0, "TOP"), square(0.0, 0.0, 2.0, "HIDDEN"), LINE);
    let input = write_input(&dir, "plots.dxf", &entities(&body));
    let out = dir.path().join("out.geojson");

    dxfgeo(dir.path())
        .arg(&input)
        .args(["--identity", "--stage", "resolve", "-o"])
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    let json: Value = serde_json::from_str(&fs::read_to_string(&out).expect("读取输出")).expect("GeoJSON");
    let features = json["features"].as_array().expect("features");
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["properties"]["layer"], "TOP");
    assert_eq!(features[0]["properties"]["z"], 2);
}

#[test]
fn geojson_input_runs_merge_then_flatten() {
    let dir = tempfile::tempdir().expect("temp dir");
    let collection = serde_json::json!({
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"layer": "A"},
                "geometry": {"type": "LineString", "coordinates": [[0.0, 0.0], [1.0, 0.0]]}
            },
            {
                "type": "Feature",
                "properties": {"layer": "B"},
                "geometry": {"type": "LineString", "coordinates": [[0.0, 1.0], [1.0, 1.0]]}
            }
        ]
    });
    let input = write_input(&dir, "lines.geojson", &collection.to_string());

    let merged = dxfgeo(dir.path())
        .arg(&input)
        .args(["--stage", "merge"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let merged = parse_stdout(&merged);
    assert_eq!(merged["features"].as_array().map(Vec::len), Some(1));
    assert_eq!(merged["features"][0]["geometry"]["type"], "MultiLineString");

    let flat = dxfgeo(dir.path())
        .arg(&input)
        .args(["--stage", "merge", "--stage", "flatten"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(parse_stdout(&flat)["features"].as_array().map(Vec::len), Some(2));
}

#[test]
fn unknown_stage_exits_with_code_one() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(&dir, "drawing.dxf", &entities(LINE));

    dxfgeo(dir.path())
        .arg(&input)
        .args(["--stage", "explode"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("explode"));
}

#[test]
fn union_without_polygons_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(&dir, "drawing.dxf", &entities(LINE));

    dxfgeo(dir.path())
        .arg(&input)
        .args(["--identity", "--stage", "union"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("union"));
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(&dir, "drawing.shp", "");

    dxfgeo(dir.path())
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unsupported input"));
}

#[test]
fn empty_dxf_reports_parse_failure() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(&dir, "empty.dxf", "");

    dxfgeo(dir.path())
        .arg(&input)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Failed to parse DXF file"));
}

#[test]
fn config_file_sets_projection_and_pipeline() {
    let dir = tempfile::tempdir().expect("temp dir");
    let body = format!("{}{}", square(0.0, 0.0, 2.0, "TOP"), square(1.0, 0.0, 2.0, "HALF"));
    let input = write_input(&dir, "plots.dxf", &entities(&body));
    let config = write_input(
        &dir,
        "dxfgeo.toml",
        "[projection]\nkind = \"identity\"\n\n[visibility]\nmin_covered_pct = 40.0\n\n[pipeline]\nstages = [\"resolve\"]\n",
    );

    let output = dxfgeo(dir.path())
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    // HALF 被遮挡 50%，超过 40% 的阈值
    let json = parse_stdout(&output);
    let features = json["features"].as_array().expect("features");
    assert_eq!(features.len(), 1);
    assert_eq!(features[0]["properties"]["layer"], "TOP");
}

#[test]
fn invalid_config_file_is_reported_and_fatal() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(&dir, "drawing.dxf", &entities(LINE));
    let config = write_input(
        &dir,
        "bad.toml",
        "[projection]\nkind = \"identity\"\n\n[visibility]\nmin_covered_pct = 150.0\n",
    );

    dxfgeo(dir.path())
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("min_covered_pct"));
}

#[test]
fn missing_config_file_is_reported_and_fatal() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(&dir, "drawing.dxf", &entities(LINE));

    dxfgeo(dir.path())
        .arg(&input)
        .args(["--config", "absent.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("absent.toml"));
}

#[test]
fn out_of_range_covered_pct_flag_exits_with_code_one() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write_input(&dir, "drawing.dxf", &entities(LINE));

    dxfgeo(dir.path())
        .arg(&input)
        .args(["--identity", "--min-covered-pct", "150"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("min_covered_pct"));
}
