use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use tempfile::tempdir;

fn sales_csv() -> String {
    fs::read_to_string("test/sales.csv").expect("Failed to read test CSV")
}

#[allow(deprecated)]
fn chartspec() -> Command {
    Command::cargo_bin("chartspec").expect("binary")
}

fn run_json(args: &[&str], stdin: &str) -> Value {
    let output = chartspec().args(args).write_stdin(stdin).output().expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

#[test]
fn test_bar_chart_from_csv() {
    let vl = run_json(&["Bar Chart", "x: region, y: sum(revenue)"], &sales_csv());
    assert_eq!(vl["mark"]["type"], "bar");
    assert_eq!(vl["encoding"]["x"]["field"], "region");
    // south 217.25, east 105, west 102, north 70.5
    assert_eq!(
        vl["encoding"]["x"]["scale"]["domain"],
        json!(["south", "east", "west", "north"])
    );
    assert_eq!(vl["encoding"]["y"]["title"], "Sum of revenue");
    assert_eq!(vl["data"]["values"].as_array().unwrap().len(), 10);
}

#[test]
fn test_top_k_flag() {
    let vl = run_json(&["bar", "x: region, y: sum(revenue)", "-k", "2"], &sales_csv());
    assert_eq!(
        vl["encoding"]["x"]["scale"]["domain"],
        json!(["south", "east", "(other)"])
    );
    assert_eq!(vl["transform"][0]["as"], "region");
}

#[test]
fn test_options_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("options.json");
    fs::write(&path, r#"{"maxCategories": 1, "placeholder": "Other", "width": 500}"#).unwrap();

    let vl = run_json(
        &[
            "bar",
            "x: region, y: sum(revenue)",
            "--options",
            path.to_str().unwrap(),
            "--width",
            "400",
        ],
        &sales_csv(),
    );
    assert_eq!(vl["encoding"]["x"]["scale"]["domain"], json!(["south", "Other"]));
    assert_eq!(vl["width"], 400);
}

#[test]
fn test_metadata_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("metadata.json");
    fs::write(&path, r#"{"year": {"semanticType": "Year"}}"#).unwrap();

    let vl = run_json(
        &["line", "x: year, y: sum(units)", "--metadata", path.to_str().unwrap()],
        &sales_csv(),
    );
    assert_eq!(vl["encoding"]["x"]["type"], "ordinal");
    // 2023: 17, 2021: 13, 2022: 9
    assert_eq!(vl["encoding"]["x"]["scale"]["domain"], json!(["2023", "2021", "2022"]));
}

#[test]
fn test_json_input_and_no_data() {
    let table = r#"[{"k": "a", "v": 1}, {"k": "b", "v": 5}]"#;
    let vl = run_json(
        &["pie", "color: k, theta: sum(v)", "--format", "json", "--no-data", "--no-legend"],
        table,
    );
    assert_eq!(vl["mark"]["type"], "arc");
    assert_eq!(vl["encoding"]["color"]["scale"]["domain"], json!(["b", "a"]));
    assert!(vl["encoding"]["color"]["legend"].is_null());
    assert!(vl.get("data").is_none());
}

#[test]
fn test_emit_spec() {
    let spec = run_json(&["histogram", "x: revenue", "--emit", "spec"], &sales_csv());
    assert_eq!(spec["chart_type"], "Histogram");
    assert_eq!(spec["encoding"]["y"]["aggregate"], "count");
    assert_eq!(spec["encoding"]["x"]["bin"], true);
}

#[test]
fn test_labels_flag_adds_layer() {
    let vl = run_json(&["bar", "x: product, y: sum(units)", "--labels"], &sales_csv());
    let layers = vl["layer"].as_array().unwrap();
    assert_eq!(layers.len(), 2);
    assert_eq!(layers[1]["mark"]["type"], "text");
}

#[test]
fn test_illegal_channel_fails() {
    chartspec()
        .args(["Bar Chart", "x: region, radius: units"])
        .write_stdin(sales_csv())
        .assert()
        .failure()
        .stderr(predicate::str::contains("radius"));
}

#[test]
fn test_unknown_chart_type_fails() {
    chartspec()
        .args(["Sankey", "x: region"])
        .write_stdin(sales_csv())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unsupported chart type"));
}

#[test]
fn test_unknown_field_fails() {
    chartspec()
        .args(["bar", "x: nowhere"])
        .write_stdin(sales_csv())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Field not found: nowhere"));
}

#[test]
fn test_invalid_top_k_fails() {
    chartspec()
        .args(["bar", "x: region", "--top-k", "0"])
        .write_stdin(sales_csv())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Top-K"));
}

#[test]
fn test_parse_error_fails() {
    chartspec()
        .args(["bar", "x region"])
        .write_stdin(sales_csv())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse encoding"));
}
