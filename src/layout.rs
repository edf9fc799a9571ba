// Chart-type dispatch table and structural layout planning

use serde::{Deserialize, Serialize};

use crate::encoding::{Channel, EncodingMap};
use crate::error::{CompileError, Result};

/// Mark family a chart type draws with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mark {
    Bar,
    Line,
    Point,
    Area,
    Arc,
    Rect,
    Boxplot,
    Text,
}

/// Stacking applied to the measure axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackMode {
    Zero,
    Normalize,
}

/// Structural rules for one chart type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartTemplate {
    pub name: &'static str,
    pub aliases: &'static [&'static str],
    pub mark: Mark,
    /// Channels a user may populate.
    pub channels: &'static [Channel],
    /// Draw points on top of a line mark.
    pub point_overlay: bool,
    /// Add a fitted regression line over the base layer.
    pub regression: bool,
    pub stack: Option<StackMode>,
    /// Channel filled with a row count when the user leaves it empty.
    pub implied_count: Option<Channel>,
    /// Channel binned by default when populated with a quantitative field.
    pub default_bin: Option<Channel>,
    /// `(source, target)`: copy the source field onto an empty target.
    pub mirror: Option<(Channel, Channel)>,
}

impl ChartTemplate {
    const fn new(name: &'static str, aliases: &'static [&'static str], mark: Mark, channels: &'static [Channel]) -> Self {
        Self {
            name,
            aliases,
            mark,
            channels,
            point_overlay: false,
            regression: false,
            stack: None,
            implied_count: None,
            default_bin: None,
            mirror: None,
        }
    }

    const fn with_points(mut self) -> Self {
        self.point_overlay = true;
        self
    }

    const fn with_regression(mut self) -> Self {
        self.regression = true;
        self
    }

    const fn stacked(mut self, mode: StackMode) -> Self {
        self.stack = Some(mode);
        self
    }

    const fn counting(mut self, channel: Channel) -> Self {
        self.implied_count = Some(channel);
        self
    }

    const fn binning(mut self, channel: Channel) -> Self {
        self.default_bin = Some(channel);
        self
    }

    const fn mirroring(mut self, source: Channel, target: Channel) -> Self {
        self.mirror = Some((source, target));
        self
    }

    pub fn allows(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }

    pub fn supports_facets(&self) -> bool {
        self.allows(Channel::Column) || self.allows(Channel::Row)
    }

    fn matches(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name) || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

use Channel::*;

const SCATTER: &[Channel] = &[X, Y, Color, Size, Shape, Opacity, Column, Row, Detail, Tooltip];
const REGRESSION: &[Channel] = &[X, Y, Color, Size, Column, Row];
const BOXPLOT: &[Channel] = &[X, Y, Color, Opacity, Column, Row];
const BAR: &[Channel] = &[X, Y, Color, Opacity, Column, Row, Tooltip];
const GROUPED_BAR: &[Channel] = &[X, Y, Color, XOffset, Column, Row, Tooltip];
const STACKED_BAR: &[Channel] = &[X, Y, Color, Column, Row, Tooltip];
const HISTOGRAM: &[Channel] = &[X, Color, Column, Row];
const HEATMAP: &[Channel] = &[X, Y, Color, Column, Row, Tooltip];
const LINE: &[Channel] = &[X, Y, Color, Opacity, Detail, Column, Row, Tooltip];
const AREA: &[Channel] = &[X, Y, Color, Column, Row];
const PIE: &[Channel] = &[Theta, Color, Column, Row, Tooltip];
const ROSE: &[Channel] = &[Theta, Radius, Color, Column, Row, Tooltip];
const CUSTOM: &[Channel] = &[
    X, Y, XOffset, YOffset, Color, Size, Shape, Opacity, Column, Row, Detail, Text, Tooltip,
];
const CUSTOM_TEXT: &[Channel] = &[X, Y, Color, Size, Opacity, Column, Row, Text, Tooltip];

/// Every supported chart type. Adding a chart type means adding an entry here.
pub const CHART_TYPES: &[ChartTemplate] = &[
    ChartTemplate::new("Scatter Plot", &["scatter", "scatterplot", "point"], Mark::Point, SCATTER),
    ChartTemplate::new("Linear Regression", &["regression"], Mark::Point, REGRESSION).with_regression(),
    ChartTemplate::new("Boxplot", &["box plot", "box"], Mark::Boxplot, BOXPLOT),
    ChartTemplate::new("Bar Chart", &["bar"], Mark::Bar, BAR),
    ChartTemplate::new("Grouped Bar Chart", &["grouped bar"], Mark::Bar, GROUPED_BAR).mirroring(Color, XOffset),
    ChartTemplate::new("Stacked Bar Chart", &["stacked bar"], Mark::Bar, STACKED_BAR).stacked(StackMode::Zero),
    ChartTemplate::new("Normalized Bar Chart", &["normalized bar", "percent bar"], Mark::Bar, STACKED_BAR)
        .stacked(StackMode::Normalize),
    ChartTemplate::new("Histogram", &[], Mark::Bar, HISTOGRAM).binning(X).counting(Y),
    ChartTemplate::new("Heatmap", &["heat map"], Mark::Rect, HEATMAP),
    ChartTemplate::new("Line Chart", &["line"], Mark::Line, LINE),
    ChartTemplate::new("Dotted Line Chart", &["dotted line"], Mark::Line, LINE).with_points(),
    ChartTemplate::new("Area Chart", &["area"], Mark::Area, AREA),
    ChartTemplate::new("Stacked Area Chart", &["stacked area"], Mark::Area, AREA).stacked(StackMode::Zero),
    ChartTemplate::new("Pie Chart", &["pie"], Mark::Arc, PIE).counting(Theta),
    ChartTemplate::new("Rose Chart", &["rose", "radial"], Mark::Arc, ROSE).counting(Theta),
    ChartTemplate::new("Custom Point", &[], Mark::Point, CUSTOM),
    ChartTemplate::new("Custom Line", &[], Mark::Line, CUSTOM),
    ChartTemplate::new("Custom Bar", &[], Mark::Bar, CUSTOM),
    ChartTemplate::new("Custom Rect", &[], Mark::Rect, CUSTOM),
    ChartTemplate::new("Custom Area", &[], Mark::Area, CUSTOM),
    ChartTemplate::new("Custom Text", &[], Mark::Text, CUSTOM_TEXT),
];

/// Look a chart type up by name or alias, ignoring case.
pub fn lookup_chart_type(name: &str) -> Result<&'static ChartTemplate> {
    let name = name.trim();
    CHART_TYPES
        .iter()
        .find(|t| t.matches(name))
        .ok_or_else(|| CompileError::UnsupportedChartType(name.to_string()))
}

/// Structural shape of the compiled view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewShape {
    Single,
    Layered,
}

/// Result of checking an encoding against its chart type.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutPlan {
    pub template: &'static ChartTemplate,
    /// Populated channels, canonical order.
    pub channels: Vec<Channel>,
    pub shape: ViewShape,
    pub facet_row: bool,
    pub facet_column: bool,
    /// Empty channel that gets a row count.
    pub implied_count: Option<Channel>,
    /// Empty target channel receiving a copy of a populated source.
    pub mirror: Option<(Channel, Channel)>,
}

impl LayoutPlan {
    pub fn is_faceted(&self) -> bool {
        self.facet_row || self.facet_column
    }

    pub fn uses(&self, channel: Channel) -> bool {
        self.channels.contains(&channel)
    }
}

/// Validate the chart type and every populated channel against the table.
pub fn plan_layout(chart_type: &str, encoding: &EncodingMap) -> Result<LayoutPlan> {
    let template = lookup_chart_type(chart_type)?;

    let mut channels = Vec::new();
    for (channel, spec) in encoding {
        if spec.populated_field().is_none() {
            continue;
        }
        if !template.allows(*channel) {
            return Err(CompileError::IllegalChannelForChartType {
                chart_type: template.name.to_string(),
                channel: channel.to_string(),
            });
        }
        channels.push(*channel);
    }

    let facet_row = channels.contains(&Row);
    let facet_column = channels.contains(&Column);

    let implied_count = template.implied_count.filter(|c| !channels.contains(c));
    let mirror = template
        .mirror
        .filter(|(source, target)| channels.contains(source) && !channels.contains(target));

    let shape = if template.regression {
        ViewShape::Layered
    } else {
        ViewShape::Single
    };

    Ok(LayoutPlan {
        template,
        channels,
        shape,
        facet_row,
        facet_column,
        implied_count,
        mirror,
    })
}
