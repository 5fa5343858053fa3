//! SQL generator
//!
//! This module renders migration operations as SQL statements for each
//! supported database dialect.

use serde_json::Value;

use crate::config::Driver;
use crate::schema::migration::MigrationOperation;
use crate::snapshot::types::{ColumnDef, ColumnType};
use crate::utils::naming::{format_sql_identifier, quote_sql_string};

/// Default expressions passed through without quoting
const SQL_KEYWORD_DEFAULTS: &[&str] = &[
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "NOW()",
    "NULL",
];

/// Migration SQL generator for one dialect
pub struct SqlGenerator {
    driver: Driver,
}

impl SqlGenerator {
    /// Create a new SQL generator
    pub fn new(driver: Driver) -> Self {
        Self { driver }
    }

    pub fn driver(&self) -> Driver {
        self.driver
    }

    /// Render one operation; may span several lines
    pub fn operation_sql(&self, op: &MigrationOperation) -> String {
        match op {
            MigrationOperation::RenameTable { from, to } => self.rename_table_sql(from, to),
            MigrationOperation::AddColumn { table, column } => self.add_column_sql(table, column),
            MigrationOperation::DropColumn { table, column } => {
                format!(
                    "ALTER TABLE {} DROP COLUMN {};",
                    self.ident(table),
                    self.ident(&column.name)
                )
            }
            MigrationOperation::RenameColumn { table, from, to } => format!(
                "ALTER TABLE {} RENAME COLUMN {} TO {};",
                self.ident(table),
                self.ident(from),
                self.ident(to)
            ),
            MigrationOperation::AlterColumn { table, from, to } => {
                self.alter_column_sql(table, from, to)
            }
        }
    }

    fn ident(&self, name: &str) -> String {
        format_sql_identifier(name, self.driver)
    }

    fn rename_table_sql(&self, from: &str, to: &str) -> String {
        match self.driver {
            Driver::Mysql => format!("RENAME TABLE {} TO {};", self.ident(from), self.ident(to)),
            Driver::Postgres | Driver::Sqlite => {
                format!("ALTER TABLE {} RENAME TO {};", self.ident(from), self.ident(to))
            }
        }
    }

    fn add_column_sql(&self, table: &str, column: &ColumnDef) -> String {
        let statement = format!(
            "ALTER TABLE {} ADD COLUMN {};",
            self.ident(table),
            self.column_definition(column)
        );

        // SQLite can only add NOT NULL columns that carry a default
        if self.driver == Driver::Sqlite && !column.nullable && column.default.is_none() {
            return format!(
                "-- SQLite rejects NOT NULL columns without a default; add one to {} before running\n{}",
                self.ident(&column.name),
                statement
            );
        }

        statement
    }

    fn alter_column_sql(&self, table: &str, from: &ColumnDef, to: &ColumnDef) -> String {
        match self.driver {
            Driver::Postgres => {
                let table = self.ident(table);
                let column = self.ident(&to.name);
                let mut statements = Vec::new();

                if from.column_type != to.column_type {
                    let sql_type = self.column_type_sql(&to.column_type);
                    statements.push(format!(
                        "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
                        table, column, sql_type, column, sql_type
                    ));
                }

                if from.nullable != to.nullable {
                    let action = if to.nullable { "DROP NOT NULL" } else { "SET NOT NULL" };
                    statements.push(format!("ALTER TABLE {} ALTER COLUMN {} {};", table, column, action));
                }

                if from.default != to.default {
                    match &to.default {
                        Some(value) => statements.push(format!(
                            "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                            table,
                            column,
                            self.default_sql(value)
                        )),
                        None => statements.push(format!(
                            "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                            table, column
                        )),
                    }
                }

                if statements.is_empty() {
                    format!("-- {}.{} unchanged", table, column)
                } else {
                    statements.join("\n")
                }
            }
            Driver::Mysql => format!(
                "ALTER TABLE {} MODIFY COLUMN {};",
                self.ident(table),
                self.column_definition(to)
            ),
            Driver::Sqlite => format!(
                "-- SQLite cannot alter column {} on {} ({} -> {}); rebuild the table to apply this change",
                self.ident(&to.name),
                self.ident(table),
                from.column_type,
                to.column_type
            ),
        }
    }

    /// Column definition as used in ADD COLUMN and MODIFY COLUMN
    pub fn column_definition(&self, column: &ColumnDef) -> String {
        let mut definition = format!(
            "{} {}",
            self.ident(&column.name),
            self.column_type_sql(&column.column_type)
        );

        if let Some(value) = &column.default {
            definition.push_str(&format!(" DEFAULT {}", self.default_sql(value)));
        }

        definition.push_str(if column.nullable { " NULL" } else { " NOT NULL" });
        definition
    }

    /// SQL type for a semantic column type
    pub fn column_type_sql(&self, column_type: &ColumnType) -> String {
        match self.driver {
            Driver::Postgres => match column_type {
                ColumnType::String => "VARCHAR(255)".to_string(),
                ColumnType::Text => "TEXT".to_string(),
                ColumnType::Integer => "INTEGER".to_string(),
                ColumnType::BigInteger => "BIGINT".to_string(),
                ColumnType::SmallInteger => "SMALLINT".to_string(),
                ColumnType::Float => "REAL".to_string(),
                ColumnType::Double => "DOUBLE PRECISION".to_string(),
                ColumnType::Decimal => "DECIMAL(10,2)".to_string(),
                ColumnType::Boolean => "BOOLEAN".to_string(),
                ColumnType::Date => "DATE".to_string(),
                ColumnType::DateTime => "TIMESTAMP".to_string(),
                ColumnType::Timestamp => "TIMESTAMPTZ".to_string(),
                ColumnType::Time => "TIME".to_string(),
                ColumnType::Uuid => "UUID".to_string(),
                ColumnType::Json => "JSONB".to_string(),
                ColumnType::Binary => "BYTEA".to_string(),
                ColumnType::Other(tag) => tag.to_uppercase(),
            },
            Driver::Mysql => match column_type {
                ColumnType::String => "VARCHAR(255)".to_string(),
                ColumnType::Text => "TEXT".to_string(),
                ColumnType::Integer => "INT".to_string(),
                ColumnType::BigInteger => "BIGINT".to_string(),
                ColumnType::SmallInteger => "SMALLINT".to_string(),
                ColumnType::Float => "FLOAT".to_string(),
                ColumnType::Double => "DOUBLE".to_string(),
                ColumnType::Decimal => "DECIMAL(10,2)".to_string(),
                ColumnType::Boolean => "TINYINT(1)".to_string(),
                ColumnType::Date => "DATE".to_string(),
                ColumnType::DateTime => "DATETIME".to_string(),
                ColumnType::Timestamp => "TIMESTAMP".to_string(),
                ColumnType::Time => "TIME".to_string(),
                ColumnType::Uuid => "CHAR(36)".to_string(),
                ColumnType::Json => "JSON".to_string(),
                ColumnType::Binary => "BLOB".to_string(),
                ColumnType::Other(tag) => tag.to_uppercase(),
            },
            // SQLite has only five storage classes
            Driver::Sqlite => match column_type {
                ColumnType::Integer
                | ColumnType::BigInteger
                | ColumnType::SmallInteger
                | ColumnType::Boolean => "INTEGER".to_string(),
                ColumnType::Float | ColumnType::Double | ColumnType::Decimal => "REAL".to_string(),
                ColumnType::Binary => "BLOB".to_string(),
                _ => "TEXT".to_string(),
            },
        }
    }

    /// SQL literal for a snapshot default value
    pub fn default_sql(&self, value: &Value) -> String {
        match value {
            Value::Null => "NULL".to_string(),
            Value::Bool(flag) => match self.driver {
                Driver::Postgres => (if *flag { "TRUE" } else { "FALSE" }).to_string(),
                Driver::Mysql | Driver::Sqlite => (if *flag { "1" } else { "0" }).to_string(),
            },
            Value::Number(number) => number.to_string(),
            Value::String(text) => {
                if SQL_KEYWORD_DEFAULTS.contains(&text.to_uppercase().as_str()) {
                    text.to_uppercase()
                } else {
                    quote_sql_string(text)
                }
            }
            Value::Array(_) | Value::Object(_) => quote_sql_string(&value.to_string()),
        }
    }
}
