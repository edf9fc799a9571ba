// Top-K domain selection for high-cardinality categorical channels

use std::cmp::Ordering;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};

use log::debug;

use crate::data::{self, WorkingTable};
use crate::encoding::SortOrder;
use crate::error::{CompileError, Result};
use crate::field::FieldDefinition;
use crate::normalize::Aggregate;

/// How categories are ranked against each other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankingMeasure {
    /// Number of rows per category.
    RowCount,
    /// The paired measure channel's column, reduced with its operator.
    Field { column: String, aggregate: Aggregate },
}

impl RankingMeasure {
    pub fn field(column: &str, aggregate: Aggregate) -> Self {
        match aggregate {
            // A bare or counted measure ranks like plain row counts.
            Aggregate::None | Aggregate::Count => RankingMeasure::RowCount,
            _ => RankingMeasure::Field {
                column: column.to_string(),
                aggregate,
            },
        }
    }
}

/// One distinct category and its ranking score.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedCategory {
    pub value: String,
    pub score: Option<f64>,
}

#[derive(Debug, Default)]
struct Accumulator {
    rows: usize,
    numeric: usize,
    sum: f64,
    min: Option<f64>,
    max: Option<f64>,
    samples: Vec<f64>,
    distinct: HashSet<String>,
}

impl Accumulator {
    fn push(&mut self, measure: &RankingMeasure, value: Option<&serde_json::Value>) {
        self.rows += 1;
        let (column_value, op) = match (measure, value) {
            (RankingMeasure::Field { aggregate, .. }, Some(v)) => (v, *aggregate),
            _ => return,
        };

        if op == Aggregate::Distinct {
            if let Some(key) = data::category_key(column_value) {
                self.distinct.insert(key);
            }
            return;
        }

        if let Some(x) = data::numeric_value(column_value) {
            self.numeric += 1;
            self.sum += x;
            self.min = Some(self.min.map_or(x, |m| m.min(x)));
            self.max = Some(self.max.map_or(x, |m| m.max(x)));
            if op == Aggregate::Median {
                self.samples.push(x);
            }
        }
    }

    fn score(&mut self, measure: &RankingMeasure) -> Option<f64> {
        let op = match measure {
            RankingMeasure::RowCount => return Some(self.rows as f64),
            RankingMeasure::Field { aggregate, .. } => *aggregate,
        };
        match op {
            Aggregate::None | Aggregate::Count => Some(self.rows as f64),
            Aggregate::Sum => Some(self.sum),
            Aggregate::Mean if self.numeric > 0 => Some(self.sum / self.numeric as f64),
            Aggregate::Mean => None,
            Aggregate::Min => self.min,
            Aggregate::Max => self.max,
            Aggregate::Distinct => Some(self.distinct.len() as f64),
            Aggregate::Median => median(&mut self.samples),
        }
    }
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Higher scores first; categories without a score sink to the end.
fn descending(a: &Option<f64>, b: &Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.total_cmp(x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Group the table by `field` and rank every distinct category.
///
/// Known levels of the field seed the tie-break order; other categories follow
/// in order of first appearance. The sort is stable, so equal scores keep that
/// order and repeated calls over the same table give the same result.
pub fn rank_categories(
    field: &FieldDefinition,
    table: &WorkingTable,
    ranking: &RankingMeasure,
) -> Vec<RankedCategory> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (usize, Accumulator)> = HashMap::new();

    for level in &field.levels {
        if !groups.contains_key(level) {
            groups.insert(level.clone(), (order.len(), Accumulator::default()));
            order.push(level.clone());
        }
    }

    let measure_column = match ranking {
        RankingMeasure::Field { column, .. } => Some(column.as_str()),
        RankingMeasure::RowCount => None,
    };

    for row in &table.rows {
        let key = match row.get(&field.name).and_then(data::category_key) {
            Some(key) => key,
            None => continue,
        };
        let (_, acc) = match groups.entry(key) {
            Entry::Occupied(e) => e.into_mut(),
            Entry::Vacant(e) => {
                order.push(e.key().clone());
                e.insert((order.len() - 1, Accumulator::default()))
            }
        };
        acc.push(ranking, measure_column.and_then(|c| row.get(c)));
    }

    let mut ranked: Vec<(usize, RankedCategory)> = order
        .into_iter()
        .filter_map(|value| {
            let (pos, mut acc) = groups.remove(&value)?;
            if acc.rows == 0 {
                return None;
            }
            let score = acc.score(ranking);
            Some((pos, RankedCategory { value, score }))
        })
        .collect();

    ranked.sort_by(|(pa, a), (pb, b)| descending(&a.score, &b.score).then(pa.cmp(pb)));
    ranked.into_iter().map(|(_, c)| c).collect()
}

/// Bounded, ordered scale domain for a categorical field.
///
/// Returns every category when there are at most `k`; otherwise the top `k`
/// followed by a single placeholder entry standing in for the rest.
pub fn select_domain(
    field: &FieldDefinition,
    table: &WorkingTable,
    ranking: &RankingMeasure,
    k: i64,
    placeholder: &str,
) -> Result<Vec<String>> {
    if k <= 0 {
        return Err(CompileError::InvalidTopKValue(k));
    }
    let k = k as usize;

    let ranked = rank_categories(field, table, ranking);
    if ranked.len() <= k {
        return Ok(ranked.into_iter().map(|c| c.value).collect());
    }

    let placeholder = reserve_placeholder(placeholder, ranked.iter().map(|c| c.value.as_str()));
    debug!(
        "top-k on '{}': keeping {} of {} categories, rest under '{}'",
        field.name,
        k,
        ranked.len(),
        placeholder
    );

    let mut domain: Vec<String> = ranked.into_iter().take(k).map(|c| c.value).collect();
    domain.push(placeholder);
    Ok(domain)
}

/// Reorder categories by value. Numeric labels compare as numbers and sort
/// ahead of text.
pub fn sort_categories(values: &mut [String], order: SortOrder) {
    values.sort_by(|a, b| {
        let ord = match (a.parse::<f64>().ok(), b.parse::<f64>().ok()) {
            (Some(x), Some(y)) => x.total_cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => a.cmp(b),
        };
        match order {
            SortOrder::Ascending => ord,
            SortOrder::Descending => ord.reverse(),
        }
    });
}

/// Placeholder label that does not collide with any real category.
fn reserve_placeholder<'a, I>(base: &str, categories: I) -> String
where
    I: Iterator<Item = &'a str>,
{
    let taken: HashSet<&str> = categories.collect();
    let mut label = base.to_string();
    while taken.contains(label.as_str()) {
        label.insert(0, '~');
    }
    label
}
