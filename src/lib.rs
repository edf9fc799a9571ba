// Library exports for chartspec

pub mod data;
pub mod encoding;
pub mod error;
pub mod field;
pub mod parser;
pub mod writer;

// Compilation pipeline
pub mod ir;
pub mod normalize;
pub mod topk;
pub mod layout;
pub mod compiler;

use serde::{Deserialize, Serialize};

pub use compiler::{compile, compile_with_options};
pub use encoding::{Channel, EncodingMap, EncodingSpec};
pub use error::{CompileError, Result};
pub use field::{FieldMetadata, FieldRegistry};
pub use ir::CompiledSpec;

/// Categories kept per channel before the rest collapse into the placeholder.
pub const DEFAULT_TOP_K: i64 = 30;
pub const DEFAULT_PLACEHOLDER: &str = "(other)";

/// Tuning knobs for one compilation, loadable from a JSON options file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileOptions {
    #[serde(default = "default_top_k", alias = "maxCategories")]
    pub top_k: i64,
    #[serde(default = "default_width")]
    pub width: i64,
    #[serde(default = "default_height")]
    pub height: i64,
    #[serde(default)]
    pub color_legend_suppressed: bool,
    #[serde(default)]
    pub show_labels: bool,
    /// Label standing in for categories beyond the top `k`.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    /// Smallest facet cell, in pixels, before cells stop shrinking.
    #[serde(default = "default_min_facet_cell")]
    pub min_facet_cell: u32,
}

fn default_top_k() -> i64 { DEFAULT_TOP_K }
fn default_width() -> i64 { 300 }
fn default_height() -> i64 { 300 }
fn default_placeholder() -> String { DEFAULT_PLACEHOLDER.to_string() }
fn default_min_facet_cell() -> u32 { 60 }

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            width: default_width(),
            height: default_height(),
            color_legend_suppressed: false,
            show_labels: false,
            placeholder: default_placeholder(),
            min_facet_cell: default_min_facet_cell(),
        }
    }
}
