use std::collections::HashSet;
use std::io::Read;

use anyhow::{anyhow, Context, Result};
use serde_json::{Map, Number, Value};

use crate::field::DataType;

static NULL: Value = Value::Null;

/// One flat record: column name -> scalar.
pub type Row = Map<String, Value>;

/// The in-memory table a chart is compiled against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkingTable {
    pub rows: Vec<Row>,
}

impl WorkingTable {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column names in first-seen order across all rows.
    pub fn columns(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut columns = Vec::new();
        for row in &self.rows {
            for key in row.keys() {
                if seen.insert(key.as_str()) {
                    columns.push(key.clone());
                }
            }
        }
        columns
    }

    /// Iterate the values of one column, `Null` where a row lacks it.
    pub fn column<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.rows.iter().map(move |row| row.get(name).unwrap_or(&NULL))
    }

    /// Create a table from a JSON Array of Objects
    pub fn from_json(value: &Value) -> Result<Self> {
        let array = value
            .as_array()
            .ok_or_else(|| anyhow!("Input data must be a JSON array of objects"))?;

        let mut rows = Vec::with_capacity(array.len());
        for (idx, item) in array.iter().enumerate() {
            let obj = item
                .as_object()
                .ok_or_else(|| anyhow!("Item {} in array must be an object", idx))?;
            for (key, val) in obj {
                if val.is_array() || val.is_object() {
                    return Err(anyhow!("Unsupported nested value for field '{}' in row {}", key, idx));
                }
            }
            rows.push(obj.clone());
        }

        Ok(Self { rows })
    }

    /// Read a CSV document with a header row.
    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers: Vec<String> = rdr
            .headers()
            .context("Failed to read CSV headers")?
            .iter()
            .map(str::to_string)
            .collect();

        let mut rows = Vec::new();
        for (idx, record) in rdr.records().enumerate() {
            let record = record.with_context(|| format!("Failed to read CSV row {}", idx + 1))?;
            let mut row = Row::new();
            for (header, cell) in headers.iter().zip(record.iter()) {
                row.insert(header.clone(), parse_cell(cell));
            }
            rows.push(row);
        }

        Ok(Self { rows })
    }
}

/// Type a raw CSV cell. Numbers are only produced when they print back to the
/// same text, so labels like `007` or `1.50` stay strings.
fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    if let Ok(i) = raw.parse::<i64>() {
        if i.to_string() == raw {
            return Value::Number(i.into());
        }
    }
    if let Ok(f) = raw.parse::<f64>() {
        if f.to_string() == raw {
            if let Some(n) = Number::from_f64(f) {
                return Value::Number(n);
            }
        }
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::String(raw.to_string()),
    }
}

/// Identity of a value used as a category: its exact string form.
/// `Null` never forms a category.
pub fn category_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

/// Numeric reading of a value; numeric strings count.
pub fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
        _ => None,
    }
}

/// Fallback storage type for a column nobody declared a type for.
pub fn infer_data_type(table: &WorkingTable, column: &str) -> Option<DataType> {
    let mut seen_any = false;
    let mut all_numeric = true;
    let mut all_bool = true;
    let mut all_dates = true;

    for value in table.column(column) {
        if value.is_null() {
            continue;
        }
        seen_any = true;
        all_numeric &= numeric_value(value).is_some();
        all_bool &= matches!(value, Value::Bool(_))
            || matches!(value.as_str(), Some("true") | Some("false"));
        all_dates &= value.as_str().map(looks_like_date).unwrap_or(false);
        if !(all_numeric || all_bool || all_dates) {
            return Some(DataType::String);
        }
    }

    if !seen_any {
        None
    } else if all_numeric {
        Some(DataType::Number)
    } else if all_bool {
        Some(DataType::Boolean)
    } else if all_dates {
        Some(DataType::Date)
    } else {
        Some(DataType::String)
    }
}

/// Accepts `YYYY-MM`, `YYYY-MM-DD`, `YYYY/MM/DD`, optionally followed by a
/// time part after `T` or a space.
pub fn looks_like_date(s: &str) -> bool {
    let s = s.trim();
    let date = s.split(|c: char| c == 'T' || c == ' ').next().unwrap_or(s);

    let sep = if date.contains('-') { '-' } else { '/' };
    let parts: Vec<&str> = date.split(sep).collect();
    if parts.len() < 2 || parts.len() > 3 {
        return false;
    }
    let all_digits = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
    if parts[0].len() != 4 || !parts.iter().all(|p| all_digits(*p)) {
        return false;
    }
    if parts[1..].iter().any(|p| p.len() > 2) {
        return false;
    }
    let month: u32 = parts[1].parse().unwrap_or(0);
    let day_ok = parts
        .get(2)
        .map(|d| matches!(d.parse::<u32>(), Ok(1..=31)))
        .unwrap_or(true);
    (1..=12).contains(&month) && day_ok
}
