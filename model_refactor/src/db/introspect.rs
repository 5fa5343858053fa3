//! Live database introspection
//!
//! Reads the current columns of each registered model's table, so snapshots
//! reflect the schema as deployed rather than as declared.

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use sqlx::{FromRow, MySql, Pool, Postgres, Row, Sqlite};
use std::collections::HashMap;

use crate::db::connection::DatabaseConnection;
use crate::error::{Error, Result};
use crate::models::registry::ModelRegistry;
use crate::snapshot::extractor::{MetadataProvider, ModelMetadata};
use crate::snapshot::types::{ColumnDef, ColumnType};

/// A column as reported by the database
#[derive(Debug, Clone, PartialEq)]
pub struct IntrospectedColumn {
    pub name: String,
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
}

impl IntrospectedColumn {
    pub fn to_column_def(&self) -> ColumnDef {
        let mut column = ColumnDef::new(&self.name, ColumnType::parse(&self.data_type))
            .nullable(self.nullable);
        if let Some(default) = self.default.as_deref().and_then(parse_sql_default) {
            column = column.default(default);
        }
        column
    }
}

/// Table column introspection for one database dialect
#[async_trait]
pub trait TableIntrospector: Send + Sync {
    /// Columns of `table` in ordinal order; empty when the table does not exist
    async fn table_columns(&self, table: &str) -> Result<Vec<IntrospectedColumn>>;
}

#[derive(FromRow)]
struct ColumnRow {
    column_name: String,
    data_type: String,
    is_nullable: String,
    column_default: Option<String>,
}

impl From<ColumnRow> for IntrospectedColumn {
    fn from(row: ColumnRow) -> Self {
        Self {
            name: row.column_name,
            data_type: row.data_type,
            nullable: row.is_nullable.eq_ignore_ascii_case("YES"),
            default: row.column_default,
        }
    }
}

/// PostgreSQL introspector
struct PostgresIntrospector<'a> {
    pool: &'a Pool<Postgres>,
    schema: &'a str,
}

#[async_trait]
impl<'a> TableIntrospector for PostgresIntrospector<'a> {
    async fn table_columns(&self, table: &str) -> Result<Vec<IntrospectedColumn>> {
        let sql = r#"
            SELECT
                column_name::text AS column_name,
                data_type::text AS data_type,
                is_nullable::text AS is_nullable,
                column_default::text AS column_default
            FROM information_schema.columns
            WHERE table_schema = $1 AND table_name = $2
            ORDER BY ordinal_position
        "#;

        let rows = sqlx::query_as::<_, ColumnRow>(sql)
            .bind(self.schema)
            .bind(table)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(IntrospectedColumn::from).collect())
    }
}

/// MySQL introspector, reading the connection's current database
struct MySqlIntrospector<'a> {
    pool: &'a Pool<MySql>,
}

#[async_trait]
impl<'a> TableIntrospector for MySqlIntrospector<'a> {
    async fn table_columns(&self, table: &str) -> Result<Vec<IntrospectedColumn>> {
        let sql = r#"
            SELECT
                CAST(column_name AS CHAR) AS column_name,
                CAST(data_type AS CHAR) AS data_type,
                CAST(is_nullable AS CHAR) AS is_nullable,
                CAST(column_default AS CHAR) AS column_default
            FROM information_schema.columns
            WHERE table_schema = DATABASE() AND table_name = ?
            ORDER BY ordinal_position
        "#;

        let rows = sqlx::query_as::<_, ColumnRow>(sql)
            .bind(table)
            .fetch_all(self.pool)
            .await?;

        Ok(rows.into_iter().map(IntrospectedColumn::from).collect())
    }
}

/// SQLite introspector
struct SqliteIntrospector<'a> {
    pool: &'a Pool<Sqlite>,
}

#[async_trait]
impl<'a> TableIntrospector for SqliteIntrospector<'a> {
    async fn table_columns(&self, table: &str) -> Result<Vec<IntrospectedColumn>> {
        let sql = r#"SELECT name, type, "notnull", dflt_value FROM pragma_table_info(?) ORDER BY cid"#;

        let rows = sqlx::query(sql).bind(table).fetch_all(self.pool).await?;

        rows.iter()
            .map(|row| -> Result<IntrospectedColumn> {
                let not_null: i64 = row.try_get("notnull")?;
                Ok(IntrospectedColumn {
                    name: row.try_get("name")?,
                    data_type: row.try_get("type")?,
                    nullable: not_null == 0,
                    default: row.try_get("dflt_value")?,
                })
            })
            .collect()
    }
}

impl DatabaseConnection {
    /// Introspector for this connection's dialect
    pub fn introspector<'a>(&'a self, schema: Option<&'a str>) -> Box<dyn TableIntrospector + 'a> {
        match self {
            DatabaseConnection::Postgres(pool) => Box::new(PostgresIntrospector {
                pool,
                schema: schema.unwrap_or("public"),
            }),
            DatabaseConnection::MySql(pool) => Box::new(MySqlIntrospector { pool }),
            DatabaseConnection::Sqlite(pool) => Box::new(SqliteIntrospector { pool }),
        }
    }
}

/// Convert a column default reported by the database into a snapshot value
///
/// `NULL` defaults become no default; quoted literals lose their quotes and
/// any PostgreSQL cast; numbers and booleans become JSON values; anything
/// else (`CURRENT_TIMESTAMP`, `nextval(...)`) is kept as an expression string.
pub fn parse_sql_default(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null") {
        return None;
    }

    // 'active'::character varying -> 'active'
    let without_cast = match (trimmed.starts_with('\''), trimmed.rfind("'::")) {
        (true, Some(end)) => &trimmed[..=end],
        _ => trimmed,
    };

    if without_cast.len() >= 2 && without_cast.starts_with('\'') && without_cast.ends_with('\'') {
        let inner = &without_cast[1..without_cast.len() - 1];
        return Some(Value::String(inner.replace("''", "'")));
    }

    match without_cast.to_lowercase().as_str() {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        _ => {}
    }

    if let Ok(number) = without_cast.parse::<i64>() {
        return Some(Value::from(number));
    }
    if let Ok(number) = without_cast.parse::<f64>() {
        return Some(Value::from(number));
    }

    Some(Value::String(without_cast.to_string()))
}

/// Metadata provider backed by the live database
///
/// Columns are prefetched for every registered model so resolution stays
/// synchronous. Models whose table does not exist resolve to their declared
/// columns.
pub struct DatabaseMetadataProvider<'r> {
    registry: &'r ModelRegistry,
    introspected: HashMap<String, ModelMetadata>,
}

impl<'r> DatabaseMetadataProvider<'r> {
    /// Introspect the tables of every registered model
    pub async fn load(
        connection: &DatabaseConnection,
        registry: &'r ModelRegistry,
        schema: Option<&str>,
    ) -> Result<Self> {
        let introspector = connection.introspector(schema);
        let introspector = introspector.as_ref();

        let targets: Vec<(String, String)> = registry
            .models()
            .map(|definition| (definition.class_name.clone(), registry.table_name_for(definition)))
            .collect();

        let results = try_join_all(targets.into_iter().map(|(class_name, table_name)| async move {
            let columns = introspector.table_columns(&table_name).await?;
            Ok::<_, Error>((class_name, table_name, columns))
        }))
        .await?;

        let mut introspected = HashMap::new();
        for (class_name, table_name, columns) in results {
            if columns.is_empty() {
                tracing::debug!(table = %table_name, "Table not found, declared columns will be used");
                continue;
            }

            tracing::debug!(table = %table_name, columns = columns.len(), "Introspected table");
            introspected.insert(
                class_name.clone(),
                ModelMetadata {
                    class_name,
                    table_name,
                    columns: columns.iter().map(IntrospectedColumn::to_column_def).collect(),
                },
            );
        }

        tracing::info!(
            driver = %connection.driver(),
            tables = introspected.len(),
            "Database introspection finished"
        );

        Ok(Self {
            registry,
            introspected,
        })
    }
}

impl<'r> MetadataProvider for DatabaseMetadataProvider<'r> {
    fn resolve(&self, identifier: &str) -> Result<ModelMetadata> {
        let definition = self
            .registry
            .find(identifier)
            .ok_or_else(|| Error::ModelNotFoundError(identifier.to_string()))?;

        match self.introspected.get(&definition.class_name) {
            Some(metadata) => Ok(metadata.clone()),
            None => self.registry.metadata_for(definition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, DatabaseConfig, Driver};
    use crate::models::registry::{FieldDefinition, ModelDefinition};
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case("NULL", None)]
    #[case("'active'", Some(json!("active")))]
    #[case("'active'::character varying", Some(json!("active")))]
    #[case("'O''Hara'", Some(json!("O'Hara")))]
    #[case("0", Some(json!(0)))]
    #[case("1.5", Some(json!(1.5)))]
    #[case("false", Some(json!(false)))]
    #[case("CURRENT_TIMESTAMP", Some(json!("CURRENT_TIMESTAMP")))]
    fn test_parse_sql_default(#[case] raw: &str, #[case] expected: Option<Value>) {
        assert_eq!(parse_sql_default(raw), expected);
    }

    async fn sqlite_memory() -> DatabaseConnection {
        // One connection, otherwise each pooled connection gets its own database
        DatabaseConnection::connect(&DatabaseConfig {
            driver: Driver::Sqlite,
            url: "sqlite::memory:".to_string(),
            pool_size: Some(1),
            timeout_seconds: Some(5),
            schema: None,
        })
        .await
        .unwrap()
    }

    fn registry() -> ModelRegistry {
        let mut registry = ModelRegistry::new(&Config::default());
        registry.register_definition(
            ModelDefinition::new("App\\Models\\Student")
                .field(FieldDefinition::new("id", "i64"))
                .field(FieldDefinition::new("name", "String")),
        );
        registry.register_definition(
            ModelDefinition::new("App\\Models\\Course").field(FieldDefinition::new("title", "String")),
        );
        registry
    }

    #[tokio::test]
    async fn test_sqlite_introspection() {
        let connection = sqlite_memory().await;
        connection
            .execute(
                "CREATE TABLE students (\
                    id INTEGER NOT NULL, \
                    full_name VARCHAR(255) NOT NULL DEFAULT 'unknown', \
                    nickname TEXT\
                )",
            )
            .await
            .unwrap();

        let columns = connection
            .introspector(None)
            .table_columns("students")
            .await
            .unwrap();

        assert_eq!(
            columns,
            vec![
                IntrospectedColumn {
                    name: "id".to_string(),
                    data_type: "INTEGER".to_string(),
                    nullable: false,
                    default: None,
                },
                IntrospectedColumn {
                    name: "full_name".to_string(),
                    data_type: "VARCHAR(255)".to_string(),
                    nullable: false,
                    default: Some("'unknown'".to_string()),
                },
                IntrospectedColumn {
                    name: "nickname".to_string(),
                    data_type: "TEXT".to_string(),
                    nullable: true,
                    default: None,
                },
            ]
        );
        assert!(connection
            .introspector(None)
            .table_columns("missing")
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_provider_prefers_live_columns() {
        let connection = sqlite_memory().await;
        connection
            .execute("CREATE TABLE students (id INTEGER NOT NULL, full_name VARCHAR(255) NOT NULL DEFAULT 'unknown')")
            .await
            .unwrap();
        let registry = registry();

        let provider = DatabaseMetadataProvider::load(&connection, &registry, None)
            .await
            .unwrap();

        let student = provider.resolve("App\\Models\\Student").unwrap();
        assert_eq!(student.table_name, "students");
        assert_eq!(
            student.columns,
            vec![
                ColumnDef::new("id", ColumnType::Integer),
                ColumnDef::new("full_name", ColumnType::String).default("unknown"),
            ]
        );

        // No table yet: declared columns
        let course = provider.resolve("App\\Models\\Course").unwrap();
        assert_eq!(course.table_name, "courses");
        assert_eq!(course.columns, vec![ColumnDef::new("title", ColumnType::String)]);

        assert!(matches!(
            provider.resolve("App\\Models\\Ghost"),
            Err(Error::ModelNotFoundError(_))
        ));
    }
}
