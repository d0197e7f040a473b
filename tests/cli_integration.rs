use std::path::Path;
use std::process::{Command, Output};

fn cqlfilter(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cqlfilter"))
        .args(args)
        .output()
        .expect("failed to execute process")
}

fn stdout(output: &Output) -> String {
    String::from_utf8(output.stdout.clone()).unwrap()
}

const FEATURES: &str = r#"{
  "type": "FeatureCollection",
  "features": [
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [1.0, 1.0]},
     "properties": {"name": "Bahnhofstrasse", "lanes": 1}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [2.0, 2.0]},
     "properties": {"name": "Bundesplatz", "lanes": 2}},
    {"type": "Feature", "geometry": {"type": "Point", "coordinates": [10.0, 10.0]},
     "properties": {"name": "Marktgasse", "lanes": 3, "note": null}}
  ]
}"#;

fn write_fixture(dir: &Path, name: &str, content: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path.to_str().unwrap().to_string()
}

#[test]
fn formats_canonical_text() {
    let output = cqlfilter(&["format", "a = 1 and b = 2 AND c = 3"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "(a = 1 AND b = 2 AND c = 3)");
}

#[test]
fn parses_to_json_tree() {
    let output = cqlfilter(&["parse", "name IS NULL", "--output-format", "json"]);
    assert!(output.status.success());
    let tree: serde_json::Value = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(tree["type"], "is_null");
    assert_eq!(tree["property"], "name");
}

#[test]
fn parse_error_exits_non_zero() {
    let output = cqlfilter(&["format", "name = "]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Syntax error"), "{stderr}");
}

#[test]
fn writes_tree_file_as_cql() {
    let dir = tempfile::tempdir().unwrap();
    let tree = write_fixture(
        dir.path(),
        "tree.json",
        r#"{"type": "between", "property": "h", "lower": 10, "upper": 20}"#,
    );
    let output = cqlfilter(&["write", "--input", &tree]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).trim(), "h BETWEEN 10 AND 20");
}

#[test]
fn lints_layer_filters() {
    let dir = tempfile::tempdir().unwrap();
    let good = write_fixture(
        dir.path(),
        "good.yaml",
        "layers:\n  roads:\n    filter: \"lanes >= 2\"\n  buildings:\n    geometry_property: shape\n",
    );
    let output = cqlfilter(&["lint", &good]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("roads: lanes >= 2"), "{text}");
    assert!(text.contains("buildings: (no filter)"), "{text}");

    let bad = write_fixture(
        dir.path(),
        "bad.yaml",
        "layers:\n  roads:\n    filter: \"h BETWEEN 1 OR 2\"\n",
    );
    let output = cqlfilter(&["lint", &bad]);
    assert!(!output.status.success());
}

#[test]
fn filters_geojson_features() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "roads.geojson", FEATURES);
    let output_file = tempfile::NamedTempFile::with_suffix(".geojsonl").unwrap();
    let output_path = output_file.path().to_str().unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_cqlfilter"))
        .args(["filter", "--input", input.as_str(), "--cql", "lanes >= 2", "--output"])
        .arg(output_path)
        .arg("--verbose")
        .status()
        .expect("failed to execute process");
    assert!(status.success());

    let content = std::fs::read_to_string(output_path).unwrap();
    let names: Vec<String> = content
        .lines()
        .map(|line| {
            let feature: serde_json::Value = serde_json::from_str(line).unwrap();
            feature["properties"]["name"].as_str().unwrap().to_string()
        })
        .collect();
    assert_eq!(names, vec!["Bundesplatz", "Marktgasse"]);
}

#[test]
fn filters_with_area_restriction() {
    let dir = tempfile::tempdir().unwrap();
    let input = write_fixture(dir.path(), "roads.geojson", FEATURES);

    let output = cqlfilter(&[
        "filter",
        "--input",
        &input,
        "--cql",
        "name LIKE 'B%'",
        "--within",
        "POLYGON((0 0, 5 0, 5 5, 0 5, 0 0))",
    ]);
    assert!(output.status.success());
    assert_eq!(stdout(&output).lines().count(), 2);

    let output = cqlfilter(&[
        "filter",
        "--input",
        &input,
        "--cql",
        "lanes >= 2",
        "--within",
        "POLYGON((0 0, 5 0, 5 5, 0 5, 0 0))",
    ]);
    assert!(output.status.success());
    let lines: Vec<String> = stdout(&output).lines().map(String::from).collect();
    assert_eq!(lines.len(), 1);
    assert!(lines[0].contains("Bundesplatz"));
}

#[test]
fn parser_options_come_from_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_fixture(dir.path(), "options.yaml", "max_depth: 2\n");

    let output = cqlfilter(&["--config", &config, "format", "NOT(a = 1)"]);
    assert!(output.status.success());

    let output = cqlfilter(&["--config", &config, "format", "NOT(NOT(a = 1))"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("too complex"), "{stderr}");
}
