use std::fmt;
use std::str::FromStr;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::encoding::EncodingSpec;
use crate::error::{CompileError, Result};
use crate::field::{DataType, FieldDefinition};

/// Measurement type declared on a compiled channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingType {
    Quantitative,
    Nominal,
    Ordinal,
    Temporal,
}

impl EncodingType {
    pub fn is_categorical(&self) -> bool {
        matches!(self, EncodingType::Nominal | EncodingType::Ordinal)
    }
}

/// Reduction applied to the rows sharing a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregate {
    Sum,
    Mean,
    Median,
    Min,
    Max,
    Count,
    Distinct,
    None,
}

impl Aggregate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Sum => "sum",
            Aggregate::Mean => "mean",
            Aggregate::Median => "median",
            Aggregate::Min => "min",
            Aggregate::Max => "max",
            Aggregate::Count => "count",
            Aggregate::Distinct => "distinct",
            Aggregate::None => "none",
        }
    }

    /// Counting operators work on any field type.
    pub fn is_counting(&self) -> bool {
        matches!(self, Aggregate::Count | Aggregate::Distinct)
    }

    /// Axis/legend title for `field` under this operator.
    pub fn title(&self, field: &str) -> String {
        match self {
            Aggregate::Sum => format!("Sum of {}", field),
            Aggregate::Mean => format!("Average of {}", field),
            Aggregate::Median => format!("Median of {}", field),
            Aggregate::Min => format!("Min of {}", field),
            Aggregate::Max => format!("Max of {}", field),
            Aggregate::Count => format!("Count of {}", field),
            Aggregate::Distinct => format!("Distinct count of {}", field),
            Aggregate::None => field.to_string(),
        }
    }
}

impl fmt::Display for Aggregate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Aggregate {
    type Err = CompileError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(Aggregate::Sum),
            "mean" | "average" => Ok(Aggregate::Mean),
            "median" => Ok(Aggregate::Median),
            "min" => Ok(Aggregate::Min),
            "max" => Ok(Aggregate::Max),
            "count" => Ok(Aggregate::Count),
            "distinct" => Ok(Aggregate::Distinct),
            "none" | "" => Ok(Aggregate::None),
            _ => Err(CompileError::UnsupportedAggregate(s.to_string())),
        }
    }
}

/// Effective type and operator for one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizedChannel {
    pub ty: EncodingType,
    pub aggregate: Option<Aggregate>,
    pub binned: bool,
}

/// Decide the declared type and legal aggregate for a channel.
pub fn normalize_channel(spec: &EncodingSpec, field: &FieldDefinition) -> Result<NormalizedChannel> {
    let requested = match &spec.aggregate {
        Some(op) => op.parse::<Aggregate>()?,
        None => Aggregate::None,
    };

    let base = display_type(field);
    let binned = spec.is_binned() && base == EncodingType::Quantitative;

    let (ty, aggregate) = match requested {
        Aggregate::None => (base, None),
        op if op.is_counting() => (EncodingType::Quantitative, Some(op)),
        op if base == EncodingType::Quantitative => (base, Some(op)),
        op => {
            warn!(
                "dropping aggregate '{}' on {} field '{}'",
                op,
                type_name(base),
                field.name
            );
            (base, None)
        }
    };

    Ok(NormalizedChannel { ty, aggregate, binned })
}

/// Type a field displays as, before any aggregate is considered.
pub fn display_type(field: &FieldDefinition) -> EncodingType {
    let raw = field.data_type.unwrap_or(DataType::String);
    let from_raw = match raw {
        DataType::Number => EncodingType::Quantitative,
        DataType::String | DataType::Boolean => EncodingType::Nominal,
        DataType::Date => EncodingType::Temporal,
    };

    let ty = match semantic_family(&field.semantic_type) {
        // A quantitative label on text data can't be plotted as a measure.
        Some(EncodingType::Quantitative) if raw != DataType::Number => from_raw,
        Some(family) => family,
        None => from_raw,
    };

    if ty == EncodingType::Nominal && !field.levels.is_empty() {
        EncodingType::Ordinal
    } else {
        ty
    }
}

/// Map a free-form semantic type onto a display family. Unknown labels
/// return `None` so the raw storage type decides.
pub fn semantic_family(semantic_type: &str) -> Option<EncodingType> {
    let key: String = semantic_type
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    if key.is_empty() {
        return None;
    }

    const TEMPORAL: &[&str] = &["date", "datetime", "timestamp", "yearmonth", "yearmonthday", "time"];
    const ORDINAL: &[&str] = &[
        "year", "decade", "quarter", "month", "weekday", "dayofweek", "day", "hour", "rank",
        "level", "grade", "rating", "range", "timerange", "agegroup",
    ];
    const QUANTITATIVE: &[&str] = &[
        "number", "integer", "float", "quantity", "count", "amount", "price", "currency",
        "percentage", "percent", "ratio", "score", "duration", "temperature", "distance",
        "weight", "area", "volume", "latitude", "longitude", "age",
    ];
    const NOMINAL: &[&str] = &[
        "string", "category", "name", "location", "country", "city", "state", "region",
        "address", "id", "identifier", "boolean", "bool", "binary", "email", "url", "text",
        "type", "gender", "phone",
    ];

    let k = key.as_str();
    if TEMPORAL.contains(&k) {
        Some(EncodingType::Temporal)
    } else if ORDINAL.contains(&k) {
        Some(EncodingType::Ordinal)
    } else if QUANTITATIVE.contains(&k) {
        Some(EncodingType::Quantitative)
    } else if NOMINAL.contains(&k) {
        Some(EncodingType::Nominal)
    } else {
        None
    }
}

fn type_name(ty: EncodingType) -> &'static str {
    match ty {
        EncodingType::Quantitative => "quantitative",
        EncodingType::Nominal => "nominal",
        EncodingType::Ordinal => "ordinal",
        EncodingType::Temporal => "temporal",
    }
}
