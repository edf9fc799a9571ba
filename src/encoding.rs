// User-facing encoding model: which field goes on which channel

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::data;

/// Visual encoding slot. Declaration order is the canonical channel order
/// used everywhere a deterministic iteration is needed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Channel {
    X,
    Y,
    XOffset,
    YOffset,
    Theta,
    Radius,
    Color,
    Size,
    Shape,
    Opacity,
    Column,
    Row,
    Detail,
    Text,
    Tooltip,
}

impl Channel {
    pub const ALL: [Channel; 15] = [
        Channel::X,
        Channel::Y,
        Channel::XOffset,
        Channel::YOffset,
        Channel::Theta,
        Channel::Radius,
        Channel::Color,
        Channel::Size,
        Channel::Shape,
        Channel::Opacity,
        Channel::Column,
        Channel::Row,
        Channel::Detail,
        Channel::Text,
        Channel::Tooltip,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::X => "x",
            Channel::Y => "y",
            Channel::XOffset => "xOffset",
            Channel::YOffset => "yOffset",
            Channel::Theta => "theta",
            Channel::Radius => "radius",
            Channel::Color => "color",
            Channel::Size => "size",
            Channel::Shape => "shape",
            Channel::Opacity => "opacity",
            Channel::Column => "column",
            Channel::Row => "row",
            Channel::Detail => "detail",
            Channel::Text => "text",
            Channel::Tooltip => "tooltip",
        }
    }

    pub fn is_facet(&self) -> bool {
        matches!(self, Channel::Column | Channel::Row)
    }

    /// Channels that own a scale (and so can carry an explicit domain).
    pub fn has_scale(&self) -> bool {
        !matches!(self, Channel::Detail | Channel::Text | Channel::Tooltip)
    }

    /// Measure channels to rank this channel's categories by, most
    /// preferred first. Positional channels prefer the orthogonal axis.
    pub fn ranking_partners(&self) -> &'static [Channel] {
        use Channel::*;
        match self {
            X | XOffset => &[Y, Size, Color, Theta, Radius],
            Y | YOffset => &[X, Size, Color, Theta, Radius],
            Color => &[Theta, Radius, Y, X, Size],
            _ => &[Y, X, Theta, Radius, Size, Color],
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("Unknown channel '{}'", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[serde(alias = "asc")]
    Ascending,
    #[serde(alias = "desc")]
    Descending,
}

/// Binning request: `true`, or an explicit bin budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binning {
    Flag(bool),
    MaxBins { maxbins: u32 },
}

impl Binning {
    pub fn is_enabled(&self) -> bool {
        !matches!(self, Binning::Flag(false))
    }
}

/// What the user dropped onto one channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodingSpec {
    #[serde(default, rename = "fieldID", skip_serializing_if = "Option::is_none")]
    pub field_id: Option<String>,
    /// Raw operator text; validated during compilation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<SortOrder>,
    #[serde(default, deserialize_with = "deserialize_domain", skip_serializing_if = "Option::is_none")]
    pub custom_domain: Option<Vec<String>>,
    #[serde(default, alias = "bin", skip_serializing_if = "Option::is_none")]
    pub binning: Option<Binning>,
}

impl EncodingSpec {
    pub fn field(field_id: &str) -> Self {
        Self {
            field_id: Some(field_id.to_string()),
            ..Default::default()
        }
    }

    pub fn with_aggregate(mut self, op: &str) -> Self {
        self.aggregate = Some(op.to_string());
        self
    }

    pub fn with_sort(mut self, order: SortOrder) -> Self {
        self.sort_order = Some(order);
        self
    }

    pub fn with_domain<I, S>(mut self, domain: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.custom_domain = Some(domain.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_binning(mut self, binning: Binning) -> Self {
        self.binning = Some(binning);
        self
    }

    /// A channel is populated only when it names a field.
    pub fn populated_field(&self) -> Option<&str> {
        self.field_id.as_deref().filter(|id| !id.trim().is_empty())
    }

    pub fn is_binned(&self) -> bool {
        self.binning.map(|b| b.is_enabled()).unwrap_or(false)
    }
}

/// Channel -> encoding, as supplied by the caller.
pub type EncodingMap = BTreeMap<Channel, EncodingSpec>;

fn deserialize_domain<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw.map(|values| values.iter().filter_map(data::category_key).collect()))
}
