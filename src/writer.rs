//! Vega-Lite output
//!
//! Turns a [`CompiledSpec`] into a Vega-Lite v5 document. Single views are
//! emitted flat, views with overlays as a `layer` array, and faceted views
//! wrap either of those in a `facet`/`spec` pair sized by the facet cell.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};

use crate::data::WorkingTable;
use crate::encoding::Channel;
use crate::ir::{ChannelSpec, CompiledSpec, LayerSpec, MarkSpec};
use crate::normalize::Aggregate;

pub const VEGA_LITE_SCHEMA: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Build the Vega-Lite document for `spec`, embedding `data` inline when given.
pub fn to_vega_lite(spec: &CompiledSpec, data: Option<&WorkingTable>) -> Value {
    let base = view_json(&spec.mark, &spec.encoding);

    let mut inner = if spec.layers.is_empty() {
        base
    } else {
        let mut layers = vec![base];
        layers.extend(spec.layers.iter().map(layer_json));
        json!({ "layer": layers })
    };

    let mut vl_spec = json!({ "$schema": VEGA_LITE_SCHEMA });

    if spec.is_faceted() {
        let mut facet = Map::new();
        for channel in [Channel::Row, Channel::Column] {
            if let Some(c) = spec.channel(channel) {
                facet.insert(channel.to_string(), facet_json(c));
            }
        }
        inner["width"] = json!(spec.facet.cell_width);
        inner["height"] = json!(spec.facet.cell_height);
        vl_spec["facet"] = Value::Object(facet);
        vl_spec["spec"] = inner;
    } else {
        if let Value::Object(view) = inner {
            if let Some(target) = vl_spec.as_object_mut() {
                target.extend(view);
            }
        }
        vl_spec["width"] = json!(spec.width);
        vl_spec["height"] = json!(spec.height);
    }

    let transforms = category_transforms(&spec.encoding, data);
    if !transforms.is_empty() {
        vl_spec["transform"] = json!(transforms);
    }

    if let Some(table) = data {
        vl_spec["data"] = json!({ "values": table.rows });
    }

    vl_spec
}

fn mark_json(mark: &MarkSpec) -> Value {
    // Vega-Lite accepts the serialized mark definition as-is.
    serde_json::to_value(mark).unwrap_or_else(|_| json!({ "type": mark.mark }))
}

fn view_json(mark: &MarkSpec, encoding: &BTreeMap<Channel, ChannelSpec>) -> Value {
    let mut enc = Map::new();
    for (channel, c) in encoding {
        if channel.is_facet() {
            continue;
        }
        enc.insert(channel.to_string(), channel_json(c));
    }
    json!({
        "mark": mark_json(mark),
        "encoding": enc,
    })
}

fn layer_json(layer: &LayerSpec) -> Value {
    let mut view = view_json(&layer.mark, &layer.encoding);
    if !layer.transform.is_empty() {
        view["transform"] = json!(layer.transform);
    }
    view
}

fn channel_json(c: &ChannelSpec) -> Value {
    let mut obj = Map::new();
    if let Some(field) = &c.field {
        obj.insert("field".to_string(), json!(field));
    }
    obj.insert("type".to_string(), json!(c.ty));
    match c.aggregate {
        Some(Aggregate::None) | None => {}
        Some(op) => {
            obj.insert("aggregate".to_string(), json!(op));
        }
    }
    if let Some(bin) = c.bin {
        obj.insert("bin".to_string(), json!(bin));
    }
    if let Some(domain) = c.domain() {
        obj.insert("scale".to_string(), json!({ "domain": domain }));
    }
    // An explicit domain already carries the order; Vega-Lite ignores `sort` next to it.
    if let (Some(sort), None) = (c.sort, c.domain()) {
        obj.insert("sort".to_string(), json!(sort));
    }
    if let Some(title) = &c.title {
        obj.insert("title".to_string(), json!(title));
    }
    if let Some(stack) = c.stack {
        obj.insert("stack".to_string(), json!(stack));
    }
    if !c.legend {
        obj.insert("legend".to_string(), Value::Null);
    }
    Value::Object(obj)
}

/// Facet headers have no scale; the ranked domain becomes the header order.
fn facet_json(c: &ChannelSpec) -> Value {
    let mut obj = Map::new();
    if let Some(field) = &c.field {
        obj.insert("field".to_string(), json!(field));
    }
    obj.insert("type".to_string(), json!(c.ty));
    if let Some(title) = &c.title {
        obj.insert("title".to_string(), json!(title));
    }
    match (c.domain(), c.sort) {
        (Some(domain), _) => {
            obj.insert("sort".to_string(), json!(domain));
        }
        (None, Some(sort)) => {
            obj.insert("sort".to_string(), json!(sort));
        }
        (None, None) => {}
    }
    Value::Object(obj)
}

/// Domains hold category text, so every field with a domain is recast to text
/// once, and values outside a truncated domain fold into its placeholder.
/// A column that is already text needs nothing unless it was truncated.
fn category_transforms(encoding: &BTreeMap<Channel, ChannelSpec>, data: Option<&WorkingTable>) -> Vec<Value> {
    let mut seen: Vec<&str> = Vec::new();
    let mut transforms = Vec::new();

    for c in encoding.values() {
        let (field, scale) = match (&c.field, &c.scale) {
            (Some(field), Some(scale)) => (field.as_str(), scale),
            _ => continue,
        };
        if seen.contains(&field) {
            continue;
        }
        seen.push(field);

        let datum = format!("datum[{}]", json!(field));
        let calculate = match &scale.other {
            Some(other) => {
                let kept = &scale.domain[..scale.domain.len().saturating_sub(1)];
                format!(
                    "isValid({datum}) ? (indexof({}, toString({datum})) < 0 ? {} : toString({datum})) : null",
                    json!(kept),
                    json!(other),
                    datum = datum
                )
            }
            None if data.map(|t| is_text_column(t, field)).unwrap_or(false) => continue,
            None => format!("toString({})", datum),
        };
        transforms.push(json!({
            "calculate": calculate,
            "as": field,
        }));
    }

    transforms
}

fn is_text_column(table: &WorkingTable, column: &str) -> bool {
    table.column(column).all(|v| v.is_string() || v.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::compile_with_options;
    use crate::encoding::{EncodingMap, EncodingSpec};
    use crate::field::{FieldMetadata, FieldRegistry};
    use crate::CompileOptions;

    fn table() -> WorkingTable {
        WorkingTable::from_json(&json!([
            {"cat": "a", "val": 3, "grp": "g1"},
            {"cat": "b", "val": 2, "grp": "g2"},
            {"cat": "c", "val": 1, "grp": "g1"}
        ]))
        .unwrap()
    }

    fn compile(chart: &str, pairs: &[(Channel, EncodingSpec)], options: &CompileOptions) -> CompiledSpec {
        let table = table();
        let registry = FieldRegistry::from_table("t", &table);
        let encoding: EncodingMap = pairs.iter().cloned().collect();
        compile_with_options(chart, &encoding, &registry, &table, &FieldMetadata::new(), options)
            .unwrap()
            .1
    }

    fn id(name: &str) -> String {
        format!("original--t--{}", name)
    }

    #[test]
    fn test_single_view() {
        let spec = compile(
            "Bar Chart",
            &[
                (Channel::X, EncodingSpec::field(&id("cat"))),
                (Channel::Y, EncodingSpec::field(&id("val")).with_aggregate("sum")),
            ],
            &CompileOptions::default(),
        );
        let vl = to_vega_lite(&spec, Some(&table()));
        assert_eq!(vl["$schema"], VEGA_LITE_SCHEMA);
        assert_eq!(vl["mark"]["type"], "bar");
        assert_eq!(vl["width"], 300);
        assert_eq!(vl["encoding"]["x"]["field"], "cat");
        assert_eq!(vl["encoding"]["x"]["type"], "nominal");
        assert_eq!(vl["encoding"]["x"]["scale"]["domain"], json!(["a", "b", "c"]));
        assert_eq!(vl["encoding"]["y"]["aggregate"], "sum");
        assert_eq!(vl["encoding"]["y"]["title"], "Sum of val");
        assert!(vl.get("layer").is_none());
        assert_eq!(vl["data"]["values"].as_array().unwrap().len(), 3);
        // text column, full domain
        assert!(vl.get("transform").is_none());
    }

    #[test]
    fn test_truncated_domain_folds_values() {
        let options = CompileOptions {
            top_k: 2,
            ..CompileOptions::default()
        };
        let spec = compile(
            "Bar Chart",
            &[
                (Channel::X, EncodingSpec::field(&id("cat"))),
                (Channel::Y, EncodingSpec::field(&id("val")).with_aggregate("sum")),
            ],
            &options,
        );
        let vl = to_vega_lite(&spec, Some(&table()));
        assert_eq!(vl["encoding"]["x"]["scale"]["domain"], json!(["a", "b", "(other)"]));
        let transform = &vl["transform"][0];
        assert_eq!(transform["as"], "cat");
        assert_eq!(
            transform["calculate"],
            r#"isValid(datum["cat"]) ? (indexof(["a","b"], toString(datum["cat"])) < 0 ? "(other)" : toString(datum["cat"])) : null"#
        );
        assert_eq!(vl["data"]["values"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_suppressed_legend_is_null() {
        let options = CompileOptions {
            color_legend_suppressed: true,
            ..CompileOptions::default()
        };
        let spec = compile(
            "Scatter Plot",
            &[
                (Channel::X, EncodingSpec::field(&id("val"))),
                (Channel::Y, EncodingSpec::field(&id("val"))),
                (Channel::Color, EncodingSpec::field(&id("grp"))),
            ],
            &options,
        );
        let vl = to_vega_lite(&spec, None);
        assert!(vl["encoding"]["color"]["legend"].is_null());
        assert!(vl["encoding"]["color"].as_object().unwrap().contains_key("legend"));
        assert!(!vl["encoding"]["x"].as_object().unwrap().contains_key("legend"));
    }

    #[test]
    fn test_layered_view() {
        let options = CompileOptions {
            show_labels: true,
            ..CompileOptions::default()
        };
        let spec = compile(
            "Bar Chart",
            &[
                (Channel::X, EncodingSpec::field(&id("cat"))),
                (Channel::Y, EncodingSpec::field(&id("val"))),
            ],
            &options,
        );
        let vl = to_vega_lite(&spec, None);
        let layers = vl["layer"].as_array().unwrap();
        assert_eq!(layers.len(), 2);
        assert_eq!(layers[0]["mark"]["type"], "bar");
        assert_eq!(layers[1]["mark"]["type"], "text");
        assert_eq!(layers[1]["mark"]["dy"], -6);
        assert_eq!(layers[1]["encoding"]["text"]["field"], "val");
        assert_eq!(vl["height"], 300);
    }

    #[test]
    fn test_faceted_view() {
        let options = CompileOptions {
            width: 200,
            ..CompileOptions::default()
        };
        let spec = compile(
            "Scatter Plot",
            &[
                (Channel::X, EncodingSpec::field(&id("val"))),
                (Channel::Y, EncodingSpec::field(&id("val"))),
                (Channel::Column, EncodingSpec::field(&id("grp"))),
            ],
            &options,
        );
        let vl = to_vega_lite(&spec, None);
        assert_eq!(vl["facet"]["column"]["field"], "grp");
        assert_eq!(vl["facet"]["column"]["sort"], json!(["g1", "g2"]));
        assert_eq!(vl["spec"]["width"], 100);
        assert_eq!(vl["spec"]["mark"]["type"], "point");
        assert!(vl["spec"]["encoding"].get("column").is_none());
        assert!(vl.get("width").is_none());
    }

    #[test]
    fn test_regression_layer_transform() {
        let spec = compile(
            "Linear Regression",
            &[
                (Channel::X, EncodingSpec::field(&id("val"))),
                (Channel::Y, EncodingSpec::field(&id("val"))),
            ],
            &CompileOptions::default(),
        );
        let vl = to_vega_lite(&spec, None);
        assert_eq!(vl["layer"][1]["mark"]["type"], "line");
        assert_eq!(vl["layer"][1]["transform"][0]["regression"], "val");
        assert_eq!(vl["layer"][1]["transform"][0]["on"], "val");
        assert!(vl["layer"][1]["transform"][0].get("groupby").is_none());
    }

    #[test]
    fn test_numeric_categories_are_recast_to_text() {
        let table = WorkingTable::from_json(&json!([
            {"year": 2021, "v": 1},
            {"year": 2022, "v": 5},
            {"year": 2021, "v": 2}
        ]))
        .unwrap();
        let registry = FieldRegistry::from_table("t", &table);
        let mut metadata = FieldMetadata::new();
        metadata.insert(
            "year".to_string(),
            crate::field::ColumnMetadata {
                semantic_type: "Category".to_string(),
                ..Default::default()
            },
        );
        let encoding: EncodingMap = [
            (Channel::X, EncodingSpec::field(&id("year"))),
            (Channel::Y, EncodingSpec::field(&id("v")).with_aggregate("sum")),
        ]
        .into_iter()
        .collect();
        let (_, spec) = compile_with_options(
            "Bar Chart",
            &encoding,
            &registry,
            &table,
            &metadata,
            &CompileOptions::default(),
        )
        .unwrap();

        let vl = to_vega_lite(&spec, Some(&table));
        assert_eq!(vl["encoding"]["x"]["scale"]["domain"], json!(["2022", "2021"]));
        assert_eq!(
            vl["transform"],
            json!([{"calculate": "toString(datum[\"year\"])", "as": "year"}])
        );

        // without inline data the column type is unknown, so recast anyway
        let vl = to_vega_lite(&spec, None);
        assert_eq!(vl["transform"][0]["as"], "year");
    }

    #[test]
    fn test_sort_not_emitted_beside_domain() {
        let spec = compile(
            "Bar Chart",
            &[
                (Channel::X, EncodingSpec::field(&id("cat")).with_sort(crate::encoding::SortOrder::Descending)),
                (Channel::Y, EncodingSpec::field(&id("val")).with_sort(crate::encoding::SortOrder::Ascending)),
            ],
            &CompileOptions::default(),
        );
        let vl = to_vega_lite(&spec, None);
        assert!(vl["encoding"]["x"].get("sort").is_none());
        assert_eq!(vl["encoding"]["x"]["scale"]["domain"], json!(["c", "b", "a"]));
        assert_eq!(vl["encoding"]["y"]["sort"], "ascending");
    }
}
