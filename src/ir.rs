use std::collections::BTreeMap;

use serde::Serialize;

use crate::encoding::{Binning, Channel, SortOrder};
use crate::field::FieldDefinition;
use crate::layout::{Mark, StackMode, ViewShape};
use crate::normalize::{Aggregate, EncodingType};

// =============================================================================
// Phase 1: Resolution
// =============================================================================

/// A populated channel after field resolution and normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedChannel {
    pub channel: Channel,
    /// Resolved field with metadata applied; `None` for an implied row count.
    pub definition: Option<FieldDefinition>,
    pub ty: EncodingType,
    pub aggregate: Option<Aggregate>,
    pub bin: Option<Binning>,
    pub sort: Option<SortOrder>,
    /// Explicit domain supplied by the user.
    pub custom_domain: Option<Vec<String>>,
}

impl ResolvedChannel {
    /// Count of rows, for channels a chart type fills in by itself.
    pub fn row_count(channel: Channel) -> Self {
        Self {
            channel,
            definition: None,
            ty: EncodingType::Quantitative,
            aggregate: Some(Aggregate::Count),
            bin: None,
            sort: None,
            custom_domain: None,
        }
    }

    /// Column name in the working table.
    pub fn field(&self) -> Option<&str> {
        self.definition.as_ref().map(|d| d.name.as_str())
    }

    pub fn is_measure(&self) -> bool {
        self.ty == EncodingType::Quantitative
    }

    /// Categorical channels with a scale and no user domain get Top-K.
    pub fn needs_domain(&self) -> bool {
        self.ty.is_categorical() && self.channel.has_scale() && self.custom_domain.is_none()
    }

    pub fn title(&self) -> String {
        match (self.field(), self.aggregate) {
            (Some(name), Some(op)) => op.title(name),
            (Some(name), None) => name.to_string(),
            (None, _) => "Count of Records".to_string(),
        }
    }
}

// =============================================================================
// Phase 2: Compiled output
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScaleSpec {
    pub domain: Vec<String>,
    /// Placeholder closing a truncated domain; values outside the kept
    /// categories are shown under this label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other: Option<String>,
}

/// Fully resolved channel, ready for the renderer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(rename = "type")]
    pub ty: EncodingType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<Aggregate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bin: Option<Binning>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale: Option<ScaleSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<SortOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<StackMode>,
    /// `false` hides the legend for this channel.
    pub legend: bool,
}

impl ChannelSpec {
    pub fn domain(&self) -> Option<&[String]> {
        self.scale.as_ref().map(|s| s.domain.as_slice())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkSpec {
    #[serde(rename = "type")]
    pub mark: Mark,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub point: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dx: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dy: Option<i32>,
}

impl MarkSpec {
    pub fn new(mark: Mark) -> Self {
        Self {
            mark,
            point: false,
            dx: None,
            dy: None,
        }
    }
}

/// Fitted line over the base marks.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionTransform {
    pub regression: String,
    pub on: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub groupby: Vec<String>,
}

/// A view drawn on top of the base marks, with its own complete encoding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub mark: MarkSpec,
    pub encoding: BTreeMap<Channel, ChannelSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub transform: Vec<RegressionTransform>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FacetLayout {
    pub rows: usize,
    pub columns: usize,
    pub cell_width: u32,
    pub cell_height: u32,
}

/// Compiler output. Callers treat it as an immutable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledSpec {
    pub chart_type: String,
    pub mark: MarkSpec,
    pub encoding: BTreeMap<Channel, ChannelSpec>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<LayerSpec>,
    pub width: u32,
    pub height: u32,
    pub facet: FacetLayout,
}

impl CompiledSpec {
    pub fn shape(&self) -> ViewShape {
        if self.layers.is_empty() {
            ViewShape::Single
        } else {
            ViewShape::Layered
        }
    }

    pub fn is_faceted(&self) -> bool {
        self.encoding.contains_key(&Channel::Column) || self.encoding.contains_key(&Channel::Row)
    }

    pub fn channel(&self, channel: Channel) -> Option<&ChannelSpec> {
        self.encoding.get(&channel)
    }
}
