use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::data::{self, WorkingTable};
use crate::error::{CompileError, Result};

/// Source tag used for columns that come straight from a loaded table.
pub const ORIGINAL_SOURCE: &str = "original";

const ID_SEPARATOR: &str = "--";

/// Stable field identifier: `source--table--name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct FieldId {
    pub source: String,
    pub table_ref: String,
    pub name: String,
}

impl FieldId {
    pub fn new(source: &str, table_ref: &str, name: &str) -> Self {
        Self {
            source: source.to_string(),
            table_ref: table_ref.to_string(),
            name: name.to_string(),
        }
    }

    pub fn original(table_ref: &str, name: &str) -> Self {
        Self::new(ORIGINAL_SOURCE, table_ref, name)
    }

    /// Split an identifier into its parts. The name keeps any further
    /// separators so column names containing `--` survive a round trip.
    /// Text without separators is a bare name with no source or table.
    pub fn parse(id: &str) -> Self {
        let mut parts = id.splitn(3, ID_SEPARATOR);
        match (parts.next(), parts.next(), parts.next()) {
            (Some(source), Some(table_ref), Some(name)) => Self::new(source, table_ref, name),
            _ => Self::new("", "", id),
        }
    }

    pub fn is_bare(&self) -> bool {
        self.source.is_empty() && self.table_ref.is_empty()
    }
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_bare() {
            return write!(f, "{}", self.name);
        }
        write!(
            f,
            "{}{sep}{}{sep}{}",
            self.source,
            self.table_ref,
            self.name,
            sep = ID_SEPARATOR
        )
    }
}

impl From<String> for FieldId {
    fn from(s: String) -> Self {
        FieldId::parse(&s)
    }
}

impl From<FieldId> for String {
    fn from(id: FieldId) -> Self {
        id.to_string()
    }
}

/// Declared storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    String,
    #[serde(alias = "integer", alias = "float")]
    Number,
    #[serde(alias = "bool")]
    Boolean,
    #[serde(alias = "datetime", alias = "time")]
    Date,
}

/// One logical column, either loaded or derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDefinition {
    pub id: FieldId,
    pub name: String,
    #[serde(default, rename = "type")]
    pub data_type: Option<DataType>,
    #[serde(default)]
    pub semantic_type: String,
    #[serde(default, deserialize_with = "deserialize_levels")]
    pub levels: Vec<String>,
}

impl FieldDefinition {
    pub fn new(id: FieldId, data_type: Option<DataType>) -> Self {
        Self {
            name: id.name.clone(),
            id,
            data_type,
            semantic_type: String::new(),
            levels: Vec::new(),
        }
    }

    pub fn with_semantic_type(mut self, semantic_type: &str) -> Self {
        self.semantic_type = semantic_type.to_string();
        self
    }

    pub fn with_levels<I, S>(mut self, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.levels = levels.into_iter().map(Into::into).collect();
        self
    }

    /// Copy of this definition with non-empty metadata values laid over it.
    pub fn overlay(&self, meta: Option<&ColumnMetadata>) -> FieldDefinition {
        let mut merged = self.clone();
        if let Some(meta) = meta {
            if meta.data_type.is_some() {
                merged.data_type = meta.data_type;
            }
            if !meta.semantic_type.is_empty() {
                merged.semantic_type = meta.semantic_type.clone();
            }
            if !meta.levels.is_empty() {
                merged.levels = meta.levels.clone();
            }
        }
        merged
    }
}

/// Per-column type information supplied alongside the registry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMetadata {
    #[serde(default, rename = "type")]
    pub data_type: Option<DataType>,
    #[serde(default)]
    pub semantic_type: String,
    #[serde(default, deserialize_with = "deserialize_levels")]
    pub levels: Vec<String>,
}

/// Column name -> metadata.
pub type FieldMetadata = HashMap<String, ColumnMetadata>;

fn deserialize_levels<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .iter()
        .filter_map(data::category_key)
        .collect())
}

/// Read-only lookup of field definitions, kept in insertion order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<FieldDefinition>", into = "Vec<FieldDefinition>")]
pub struct FieldRegistry {
    fields: Vec<FieldDefinition>,
    index: HashMap<String, usize>,
}

impl FieldRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a definition, replacing any earlier one with the same id.
    pub fn insert(&mut self, field: FieldDefinition) {
        let key = field.id.to_string();
        match self.index.get(&key) {
            Some(&pos) => self.fields[pos] = field,
            None => {
                self.index.insert(key, self.fields.len());
                self.fields.push(field);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&FieldDefinition> {
        self.index.get(id).map(|&pos| &self.fields[pos])
    }

    /// Find a field by display name, first registered wins.
    pub fn find_by_name(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDefinition> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Build a registry of original columns for every column of `table`,
    /// with storage types inferred from the values.
    pub fn from_table(table_ref: &str, table: &WorkingTable) -> Self {
        let mut registry = Self::new();
        for column in table.columns() {
            let data_type = data::infer_data_type(table, &column);
            registry.insert(FieldDefinition::new(
                FieldId::original(table_ref, &column),
                data_type,
            ));
        }
        registry
    }
}

impl From<Vec<FieldDefinition>> for FieldRegistry {
    fn from(fields: Vec<FieldDefinition>) -> Self {
        let mut registry = Self::new();
        for field in fields {
            registry.insert(field);
        }
        registry
    }
}

impl From<FieldRegistry> for Vec<FieldDefinition> {
    fn from(registry: FieldRegistry) -> Self {
        registry.fields
    }
}

/// Look a field up by its exact identifier.
pub fn resolve<'a>(field_id: &str, registry: &'a FieldRegistry) -> Result<&'a FieldDefinition> {
    registry
        .get(field_id)
        .ok_or_else(|| CompileError::FieldNotFound(field_id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> FieldRegistry {
        FieldRegistry::from(vec![
            FieldDefinition::new(FieldId::original("t", "category"), Some(DataType::String)),
            FieldDefinition::new(FieldId::new("derived", "t", "ratio"), Some(DataType::Number))
                .with_semantic_type("Percentage"),
        ])
    }

    #[test]
    fn test_parse_field_id() {
        let id = FieldId::parse("original--t--category");
        assert_eq!(id.source, "original");
        assert_eq!(id.table_ref, "t");
        assert_eq!(id.name, "category");
        assert_eq!(id.to_string(), "original--t--category");
    }

    #[test]
    fn test_parse_field_id_keeps_separator_in_name() {
        let id = FieldId::parse("derived--t--a--b");
        assert_eq!(id.name, "a--b");
        assert_eq!(id.to_string(), "derived--t--a--b");
    }

    #[test]
    fn test_parse_bare_name() {
        let id = FieldId::parse("price");
        assert!(id.is_bare());
        assert_eq!(id.name, "price");
        assert_eq!(id.to_string(), "price");
    }

    #[test]
    fn test_empty_table_ref_round_trips() {
        let id = FieldId::parse("original----x");
        assert_eq!(id.source, ORIGINAL_SOURCE);
        assert_eq!(id.table_ref, "");
        assert!(!id.is_bare());
        assert_eq!(id.to_string(), "original----x");

        let reg: FieldRegistry =
            serde_json::from_value(json!([{"id": "original----x", "name": "x"}])).unwrap();
        assert_eq!(resolve("original----x", &reg).unwrap().name, "x");
        assert!(resolve("x", &reg).is_err());
    }

    #[test]
    fn test_resolve_found() {
        let reg = registry();
        let field = resolve("derived--t--ratio", &reg).unwrap();
        assert_eq!(field.name, "ratio");
        assert_eq!(field.semantic_type, "Percentage");
    }

    #[test]
    fn test_resolve_missing() {
        let reg = registry();
        let err = resolve("original--t--nope", &reg).unwrap_err();
        assert_eq!(err, CompileError::FieldNotFound("original--t--nope".to_string()));
    }

    #[test]
    fn test_insert_replaces_same_id() {
        let mut reg = registry();
        reg.insert(FieldDefinition::new(FieldId::original("t", "category"), Some(DataType::Date)));
        assert_eq!(reg.len(), 2);
        assert_eq!(reg.get("original--t--category").unwrap().data_type, Some(DataType::Date));
    }

    #[test]
    fn test_overlay_metadata() {
        let field = FieldDefinition::new(FieldId::original("t", "month"), Some(DataType::String));
        let meta = ColumnMetadata {
            data_type: None,
            semantic_type: "Month".to_string(),
            levels: vec!["Jan".to_string(), "Feb".to_string()],
        };
        let merged = field.overlay(Some(&meta));
        assert_eq!(merged.data_type, Some(DataType::String));
        assert_eq!(merged.semantic_type, "Month");
        assert_eq!(merged.levels, vec!["Jan", "Feb"]);
        assert_eq!(field.overlay(None), field);
    }

    #[test]
    fn test_registry_from_json() {
        let value = json!([
            {"id": "original--t--year", "name": "year", "type": "integer", "levels": [2020, 2021]},
            {"id": "derived--t--label", "name": "label"}
        ]);
        let reg: FieldRegistry = serde_json::from_value(value).unwrap();
        let year = reg.get("original--t--year").unwrap();
        assert_eq!(year.data_type, Some(DataType::Number));
        assert_eq!(year.levels, vec!["2020", "2021"]);
        assert_eq!(reg.get("derived--t--label").unwrap().data_type, None);
    }

    #[test]
    fn test_metadata_from_json() {
        let value = json!({
            "category": {"type": "string", "semanticType": "", "levels": []},
            "value": {"type": "number", "semanticType": "Price", "levels": []}
        });
        let meta: FieldMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(meta["value"].semantic_type, "Price");
        assert_eq!(meta["category"].data_type, Some(DataType::String));
    }
}
