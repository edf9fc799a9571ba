use std::collections::BTreeMap;

use log::{debug, warn};

use crate::data::{self, WorkingTable};
use crate::encoding::{Binning, Channel, EncodingMap};
use crate::error::{CompileError, Result};
use crate::field::{self, FieldMetadata, FieldRegistry};
use crate::ir::{
    ChannelSpec, CompiledSpec, FacetLayout, LayerSpec, MarkSpec, RegressionTransform, ResolvedChannel,
    ScaleSpec,
};
use crate::layout::{plan_layout, LayoutPlan, Mark};
use crate::normalize::{normalize_channel, Aggregate, EncodingType};
use crate::topk::{self, RankingMeasure};
use crate::CompileOptions;

/// Compile an encoding into a renderable chart specification.
///
/// Returns the canonical chart type name together with the spec. Fails with
/// the first input error found; no partial spec is ever returned.
#[allow(clippy::too_many_arguments)]
pub fn compile(
    chart_type: &str,
    encoding: &EncodingMap,
    registry: &FieldRegistry,
    table: &WorkingTable,
    metadata: &FieldMetadata,
    top_k: i64,
    color_legend_suppressed: bool,
    width: i64,
    height: i64,
    show_labels: bool,
) -> Result<(String, CompiledSpec)> {
    let options = CompileOptions {
        top_k,
        width,
        height,
        color_legend_suppressed,
        show_labels,
        ..CompileOptions::default()
    };
    compile_with_options(chart_type, encoding, registry, table, metadata, &options)
}

/// Same as [`compile`], with every tuning knob taken from `options`.
pub fn compile_with_options(
    chart_type: &str,
    encoding: &EncodingMap,
    registry: &FieldRegistry,
    table: &WorkingTable,
    metadata: &FieldMetadata,
    options: &CompileOptions,
) -> Result<(String, CompiledSpec)> {
    if options.top_k <= 0 {
        return Err(CompileError::InvalidTopKValue(options.top_k));
    }
    let width = check_dimension("width", options.width)?;
    let height = check_dimension("height", options.height)?;

    // 1. Structure
    let plan = plan_layout(chart_type, encoding)?;

    // 2. Fields and types
    let mut resolved = resolve_channels(&plan, encoding, registry, table, metadata)?;
    apply_template_channels(&plan, &mut resolved);

    // 3. Bounded domains
    let domains = select_domains(&resolved, table, options)?;

    // 4. Assembly
    let encoding_out = assemble_encoding(&plan, &resolved, &domains, options);
    let facet = facet_layout(&encoding_out, width, height, options.min_facet_cell);

    let mut mark = MarkSpec::new(plan.template.mark);
    mark.point = plan.template.point_overlay;

    let mut layers = Vec::new();
    if plan.template.regression {
        layers.extend(regression_layer(&encoding_out));
    }
    if options.show_labels {
        layers.extend(label_layer(&encoding_out));
    }

    let spec = CompiledSpec {
        chart_type: plan.template.name.to_string(),
        mark,
        encoding: encoding_out,
        layers,
        width,
        height,
        facet,
    };
    Ok((plan.template.name.to_string(), spec))
}

fn check_dimension(name: &'static str, value: i64) -> Result<u32> {
    u32::try_from(value)
        .ok()
        .filter(|v| *v > 0)
        .ok_or(CompileError::InvalidDimension { name, value })
}

/// Resolve and normalize every populated channel of the plan.
fn resolve_channels(
    plan: &LayoutPlan,
    encoding: &EncodingMap,
    registry: &FieldRegistry,
    table: &WorkingTable,
    metadata: &FieldMetadata,
) -> Result<BTreeMap<Channel, ResolvedChannel>> {
    let mut resolved = BTreeMap::new();

    for channel in &plan.channels {
        let spec = match encoding.get(channel) {
            Some(spec) => spec,
            None => continue,
        };
        let field_id = match spec.populated_field() {
            Some(id) => id,
            None => continue,
        };

        let found = field::resolve(field_id, registry)?;
        let mut definition = found.overlay(metadata.get(&found.name));
        if definition.data_type.is_none() {
            definition.data_type = data::infer_data_type(table, &definition.name);
        }

        let norm = normalize_channel(spec, &definition)?;

        let (ty, aggregate, bin) = if channel.is_facet() {
            (facet_type(norm.ty), None, None)
        } else if norm.binned {
            (norm.ty, norm.aggregate, spec.binning)
        } else if plan.template.default_bin == Some(*channel)
            && norm.ty == EncodingType::Quantitative
            && norm.aggregate.is_none()
        {
            (norm.ty, None, Some(Binning::Flag(true)))
        } else {
            (norm.ty, norm.aggregate, None)
        };

        let custom_domain = match &spec.custom_domain {
            Some(domain) if ty.is_categorical() => Some(domain.clone()),
            Some(_) => {
                warn!("ignoring custom domain on non-categorical channel '{}'", channel);
                None
            }
            None => None,
        };

        resolved.insert(
            *channel,
            ResolvedChannel {
                channel: *channel,
                definition: Some(definition),
                ty,
                aggregate,
                bin,
                sort: spec.sort_order,
                custom_domain,
            },
        );
    }

    Ok(resolved)
}

/// Facets split by distinct values, so continuous fields facet as ordinals.
fn facet_type(ty: EncodingType) -> EncodingType {
    match ty {
        EncodingType::Quantitative | EncodingType::Temporal => EncodingType::Ordinal,
        other => other,
    }
}

/// Fill the channels a chart type derives on its own.
fn apply_template_channels(plan: &LayoutPlan, resolved: &mut BTreeMap<Channel, ResolvedChannel>) {
    if let Some((source, target)) = plan.mirror {
        if let Some(copy) = resolved.get(&source).cloned() {
            resolved.insert(
                target,
                ResolvedChannel {
                    channel: target,
                    sort: None,
                    ..copy
                },
            );
        }
    }
    if let Some(channel) = plan.implied_count {
        resolved.insert(channel, ResolvedChannel::row_count(channel));
    }
}

/// Pick the measure that orders a categorical channel's values.
fn ranking_for(channel: Channel, resolved: &BTreeMap<Channel, ResolvedChannel>) -> RankingMeasure {
    for partner in channel.ranking_partners() {
        if *partner == channel {
            continue;
        }
        let candidate = match resolved.get(partner) {
            Some(c) if c.is_measure() => c,
            _ => continue,
        };
        let ranking = match candidate.field() {
            Some(column) => RankingMeasure::field(column, candidate.aggregate.unwrap_or(Aggregate::None)),
            None => RankingMeasure::RowCount,
        };
        debug!("ranking '{}' categories by {} ({:?})", channel, partner, ranking);
        return ranking;
    }
    RankingMeasure::RowCount
}

fn select_domains(
    resolved: &BTreeMap<Channel, ResolvedChannel>,
    table: &WorkingTable,
    options: &CompileOptions,
) -> Result<BTreeMap<Channel, ScaleSpec>> {
    let mut domains = BTreeMap::new();

    for (channel, rc) in resolved {
        if let Some(custom) = &rc.custom_domain {
            domains.insert(
                *channel,
                ScaleSpec {
                    domain: custom.clone(),
                    other: None,
                },
            );
            continue;
        }
        if !rc.needs_domain() {
            continue;
        }
        let definition = match &rc.definition {
            Some(d) => d,
            None => continue,
        };
        let ranking = ranking_for(*channel, resolved);
        let mut domain = topk::select_domain(definition, table, &ranking, options.top_k, &options.placeholder)?;
        // A truncated domain is exactly k kept values plus the placeholder.
        let other = if domain.len() as i64 > options.top_k {
            domain.last().cloned()
        } else {
            None
        };
        if let Some(order) = rc.sort {
            let kept = domain.len() - usize::from(other.is_some());
            topk::sort_categories(&mut domain[..kept], order);
        }
        domains.insert(*channel, ScaleSpec { domain, other });
    }

    Ok(domains)
}

/// Channel carrying the stack, when the chart type stacks.
fn stack_channel(plan: &LayoutPlan, resolved: &BTreeMap<Channel, ResolvedChannel>) -> Option<Channel> {
    plan.template.stack?;
    [Channel::Y, Channel::X, Channel::Theta]
        .into_iter()
        .find(|c| resolved.get(c).map(|rc| rc.is_measure()).unwrap_or(false))
}

fn assemble_encoding(
    plan: &LayoutPlan,
    resolved: &BTreeMap<Channel, ResolvedChannel>,
    domains: &BTreeMap<Channel, ScaleSpec>,
    options: &CompileOptions,
) -> BTreeMap<Channel, ChannelSpec> {
    let stacked = stack_channel(plan, resolved);

    resolved
        .iter()
        .map(|(channel, rc)| {
            let spec = ChannelSpec {
                field: rc.field().map(str::to_string),
                ty: rc.ty,
                aggregate: rc.aggregate,
                bin: rc.bin,
                scale: domains.get(channel).cloned(),
                sort: rc.sort,
                title: Some(rc.title()),
                stack: if stacked == Some(*channel) {
                    plan.template.stack
                } else {
                    None
                },
                legend: !(*channel == Channel::Color && options.color_legend_suppressed),
            };
            (*channel, spec)
        })
        .collect()
}

fn facet_layout(
    encoding: &BTreeMap<Channel, ChannelSpec>,
    width: u32,
    height: u32,
    min_cell: u32,
) -> FacetLayout {
    let count = |channel: Channel| {
        encoding
            .get(&channel)
            .and_then(|c| c.domain())
            .map(|d| d.len())
            .unwrap_or(1)
            .max(1)
    };
    let columns = count(Channel::Column);
    let rows = count(Channel::Row);

    let cell = |total: u32, n: usize| {
        if n > 1 {
            (total / n as u32).max(min_cell).max(1)
        } else {
            total
        }
    };

    FacetLayout {
        rows,
        columns,
        cell_width: cell(width, columns),
        cell_height: cell(height, rows),
    }
}

/// Copy of a channel stripped down to what an overlay layer needs.
fn bare(spec: &ChannelSpec) -> ChannelSpec {
    ChannelSpec {
        scale: None,
        sort: None,
        stack: None,
        ..spec.clone()
    }
}

/// Least-squares line over a scatter of two quantitative fields.
fn regression_layer(encoding: &BTreeMap<Channel, ChannelSpec>) -> Option<LayerSpec> {
    let x = encoding.get(&Channel::X)?;
    let y = encoding.get(&Channel::Y)?;
    if x.ty != EncodingType::Quantitative || y.ty != EncodingType::Quantitative {
        return None;
    }
    let (x_field, y_field) = (x.field.clone()?, y.field.clone()?);

    let mut layer_encoding = BTreeMap::new();
    layer_encoding.insert(Channel::X, ChannelSpec { aggregate: None, bin: None, ..bare(x) });
    layer_encoding.insert(Channel::Y, ChannelSpec { aggregate: None, bin: None, ..bare(y) });

    let mut groupby = Vec::new();
    if let Some(color) = encoding.get(&Channel::Color) {
        if color.ty.is_categorical() {
            if let Some(field) = &color.field {
                groupby.push(field.clone());
                layer_encoding.insert(Channel::Color, color.clone());
            }
        }
    }

    Some(LayerSpec {
        mark: MarkSpec::new(Mark::Line),
        encoding: layer_encoding,
        transform: vec![RegressionTransform {
            regression: y_field,
            on: x_field,
            groupby,
        }],
    })
}

/// Text marks printing the measure next to each base mark.
fn label_layer(encoding: &BTreeMap<Channel, ChannelSpec>) -> Option<LayerSpec> {
    let (measure_channel, measure) = [Channel::Y, Channel::X, Channel::Theta, Channel::Radius]
        .into_iter()
        .find_map(|c| {
            encoding
                .get(&c)
                .filter(|spec| spec.ty == EncodingType::Quantitative)
                .map(|spec| (c, spec))
        })?;

    let mut layer_encoding: BTreeMap<Channel, ChannelSpec> = encoding
        .iter()
        .filter(|(c, _)| {
            !matches!(
                c,
                Channel::Size
                    | Channel::Shape
                    | Channel::Opacity
                    | Channel::Detail
                    | Channel::Tooltip
                    | Channel::Text
                    | Channel::Column
                    | Channel::Row
            )
        })
        .map(|(c, spec)| (*c, spec.clone()))
        .collect();
    layer_encoding.insert(
        Channel::Text,
        ChannelSpec {
            title: None,
            ..bare(measure)
        },
    );

    let mut mark = MarkSpec::new(Mark::Text);
    match measure_channel {
        Channel::Y => mark.dy = Some(-6),
        Channel::X => mark.dx = Some(6),
        _ => {}
    }

    Some(LayerSpec {
        mark,
        encoding: layer_encoding,
        transform: Vec::new(),
    })
}
