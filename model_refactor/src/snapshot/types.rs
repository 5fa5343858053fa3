//! Snapshot value types
//!
//! A [`Snapshot`] captures the class, table and column identity of one model at
//! one point in time. It serializes to the stable JSON artifact format:
//!
//! ```json
//! { "className": "App\\Models\\Student", "tableName": "students",
//!   "columns": [ { "name": "id", "type": "bigInteger", "nullable": false, "default": null } ] }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

use crate::error::{Error, Result};

/// Semantic column type tag
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ColumnType {
    String,
    Text,
    Integer,
    BigInteger,
    SmallInteger,
    Float,
    Double,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Timestamp,
    Time,
    Uuid,
    Json,
    Binary,
    /// Any tag not known to model_refactor, kept verbatim
    Other(String),
}

impl ColumnType {
    /// Parse a semantic tag or a common SQL type name
    pub fn parse(tag: &str) -> Self {
        let trimmed = tag.trim();
        // Strip length/precision arguments: varchar(255), numeric(20,6)
        let base = trimmed.split('(').next().unwrap_or(trimmed).trim();

        match base.to_lowercase().as_str() {
            "string" | "varchar" | "character varying" | "char" | "character" | "nvarchar" => ColumnType::String,
            "text" | "longtext" | "mediumtext" | "tinytext" | "clob" => ColumnType::Text,
            "integer" | "int" | "int4" | "mediumint" | "unsignedinteger" => ColumnType::Integer,
            "biginteger" | "bigint" | "int8" | "bigserial" | "unsignedbiginteger" => ColumnType::BigInteger,
            "smallinteger" | "smallint" | "int2" | "tinyinteger" => ColumnType::SmallInteger,
            "float" | "real" | "float4" => ColumnType::Float,
            "double" | "double precision" | "float8" => ColumnType::Double,
            "decimal" | "numeric" => ColumnType::Decimal,
            "boolean" | "bool" | "tinyint" => ColumnType::Boolean,
            "date" => ColumnType::Date,
            "datetime" | "timestamp without time zone" => ColumnType::DateTime,
            "timestamp" | "timestamptz" | "timestamp with time zone" => ColumnType::Timestamp,
            "time" | "time without time zone" => ColumnType::Time,
            "uuid" => ColumnType::Uuid,
            "json" | "jsonb" => ColumnType::Json,
            "binary" | "blob" | "bytea" | "varbinary" => ColumnType::Binary,
            _ => ColumnType::Other(trimmed.to_string()),
        }
    }

    /// The canonical tag written to snapshot artifacts
    pub fn as_tag(&self) -> &str {
        match self {
            ColumnType::String => "string",
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::BigInteger => "bigInteger",
            ColumnType::SmallInteger => "smallInteger",
            ColumnType::Float => "float",
            ColumnType::Double => "double",
            ColumnType::Decimal => "decimal",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::DateTime => "dateTime",
            ColumnType::Timestamp => "timestamp",
            ColumnType::Time => "time",
            ColumnType::Uuid => "uuid",
            ColumnType::Json => "json",
            ColumnType::Binary => "binary",
            ColumnType::Other(tag) => tag,
        }
    }
}

impl From<String> for ColumnType {
    fn from(tag: String) -> Self {
        ColumnType::parse(&tag)
    }
}

impl From<ColumnType> for String {
    fn from(column_type: ColumnType) -> Self {
        column_type.as_tag().to_string()
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// One column definition inside a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default)]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

impl ColumnDef {
    /// Create a new non-nullable column without a default
    pub fn new(name: &str, column_type: ColumnType) -> Self {
        Self {
            name: name.to_string(),
            column_type,
            nullable: false,
            default: None,
        }
    }

    /// Set whether the column is nullable
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    /// Set a default value for the column
    pub fn default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Same definition under another name
    pub fn renamed(&self, name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..self.clone()
        }
    }

    /// Whether type, nullability or default differ (the name is ignored)
    pub fn definition_differs(&self, other: &ColumnDef) -> bool {
        self.column_type != other.column_type
            || self.nullable != other.nullable
            || self.default != other.default
    }
}

/// Structural description of one model at one point in time
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    class_name: String,
    table_name: String,
    columns: Vec<ColumnDef>,
}

impl Snapshot {
    /// Create a snapshot, rejecting empty or duplicate column names
    pub fn new(class_name: &str, table_name: &str, columns: Vec<ColumnDef>) -> Result<Self> {
        let snapshot = Self {
            class_name: class_name.to_string(),
            table_name: table_name.to_string(),
            columns,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Check the invariants a deserialized snapshot must also hold
    pub fn validate(&self) -> Result<()> {
        if self.class_name.trim().is_empty() {
            return Err(Error::ValidationError("Snapshot has an empty class name".to_string()));
        }
        if self.table_name.trim().is_empty() {
            return Err(Error::ValidationError(format!(
                "Snapshot for {} has an empty table name",
                self.class_name
            )));
        }

        let mut seen = HashSet::new();
        for column in &self.columns {
            if column.name.trim().is_empty() {
                return Err(Error::ValidationError(format!(
                    "Snapshot for {} has a column with an empty name",
                    self.class_name
                )));
            }
            if !seen.insert(column.name.as_str()) {
                return Err(Error::ValidationError(format!(
                    "Duplicate column '{}' in snapshot for {}",
                    column.name, self.class_name
                )));
            }
        }

        Ok(())
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Columns in declaration order
    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|col| col.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub(crate) fn with_class_name(&self, class_name: &str) -> Self {
        Self {
            class_name: class_name.to_string(),
            ..self.clone()
        }
    }

    pub(crate) fn with_table_name(&self, table_name: &str) -> Self {
        Self {
            table_name: table_name.to_string(),
            ..self.clone()
        }
    }

    pub(crate) fn with_columns(&self, columns: Vec<ColumnDef>) -> Self {
        Self {
            columns,
            ..self.clone()
        }
    }

    /// Serialize to the pretty-printed JSON artifact format
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a JSON artifact
    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: Snapshot = serde_json::from_str(json)?;
        snapshot.validate()?;
        Ok(snapshot)
    }
}

/// Columns are keyed by name: declaration order is not part of structural identity
impl PartialEq for Snapshot {
    fn eq(&self, other: &Self) -> bool {
        if self.class_name != other.class_name
            || self.table_name != other.table_name
            || self.columns.len() != other.columns.len()
        {
            return false;
        }

        let by_name: HashMap<&str, &ColumnDef> = other
            .columns
            .iter()
            .map(|col| (col.name.as_str(), col))
            .collect();

        self.columns
            .iter()
            .all(|col| by_name.get(col.name.as_str()) == Some(&col))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    fn student() -> Snapshot {
        Snapshot::new(
            "App\\Models\\Student",
            "students",
            vec![
                ColumnDef::new("id", ColumnType::BigInteger),
                ColumnDef::new("full_name", ColumnType::String).nullable(true),
                ColumnDef::new("credits", ColumnType::Integer).default(0),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_json_artifact_shape() {
        let value = serde_json::to_value(student()).unwrap();

        assert_eq!(
            value,
            json!({
                "className": "App\\Models\\Student",
                "tableName": "students",
                "columns": [
                    { "name": "id", "type": "bigInteger", "nullable": false, "default": null },
                    { "name": "full_name", "type": "string", "nullable": true, "default": null },
                    { "name": "credits", "type": "integer", "nullable": false, "default": 0 }
                ]
            })
        );
    }

    #[test]
    fn test_reads_previously_written_artifact() {
        let json = r#"{
            "className": "App\\Models\\Student",
            "tableName": "students",
            "columns": [
                {"name": "id", "type": "bigint", "nullable": false, "default": null},
                {"name": "meta", "type": "geometry", "nullable": true, "default": {"x": 1}}
            ]
        }"#;

        let snapshot = Snapshot::from_json(json).unwrap();

        assert_eq!(snapshot.columns()[0].column_type, ColumnType::BigInteger);
        assert_eq!(snapshot.columns()[1].column_type, ColumnType::Other("geometry".to_string()));
        assert_eq!(snapshot.columns()[1].default, Some(json!({"x": 1})));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let result = Snapshot::new(
            "App\\Models\\Student",
            "students",
            vec![
                ColumnDef::new("id", ColumnType::Integer),
                ColumnDef::new("id", ColumnType::BigInteger),
            ],
        );

        assert!(matches!(result, Err(Error::ValidationError(_))));
    }

    #[test]
    fn test_equality_ignores_column_order() {
        let original = student();
        let mut reversed = original.columns().to_vec();
        reversed.reverse();

        assert_eq!(original, original.with_columns(reversed));
        assert_ne!(original, original.with_table_name("pupils"));
        assert_ne!(
            original,
            original.with_columns(vec![ColumnDef::new("id", ColumnType::BigInteger)])
        );
    }

    #[rstest]
    #[case("VARCHAR(255)", ColumnType::String)]
    #[case("character varying", ColumnType::String)]
    #[case("int", ColumnType::Integer)]
    #[case("bigInteger", ColumnType::BigInteger)]
    #[case("NUMERIC(20,6)", ColumnType::Decimal)]
    #[case("timestamp with time zone", ColumnType::Timestamp)]
    #[case("jsonb", ColumnType::Json)]
    #[case("bytea", ColumnType::Binary)]
    fn test_column_type_parse(#[case] input: &str, #[case] expected: ColumnType) {
        assert_eq!(ColumnType::parse(input), expected);
    }
}
