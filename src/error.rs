use thiserror::Error;

pub type Result<T> = std::result::Result<T, CompileError>;

/// Input-validation failures raised while compiling a chart.
///
/// None of these are retryable: the compiler performs no I/O, so every error
/// points at something the caller has to fix in its encoding or settings.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    #[error("Unsupported aggregate '{0}' (expected one of sum, mean, median, min, max, count, distinct, none)")]
    UnsupportedAggregate(String),

    #[error("Unsupported chart type: {0}")]
    UnsupportedChartType(String),

    #[error("Channel '{channel}' is not allowed on chart type '{chart_type}'")]
    IllegalChannelForChartType { chart_type: String, channel: String },

    #[error("Top-K value must be a positive integer, got {0}")]
    InvalidTopKValue(i64),

    #[error("Chart {name} must be a positive number of pixels, got {value}")]
    InvalidDimension { name: &'static str, value: i64 },
}
