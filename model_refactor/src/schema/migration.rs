//! Migration builder
//!
//! Turns a change-set into a reversible migration: an ordered list of "up"
//! operations and the exact inverse list as "down".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{Driver, MigrationsConfig};
use crate::error::Result;
use crate::schema::change::{Change, ChangeSet};
use crate::schema::generator::SqlGenerator;
use crate::snapshot::types::{ColumnDef, Snapshot};
use crate::utils::fs::write_atomic;
use crate::utils::naming::{
    create_migration_name, generate_unique_name, sanitize_identifier, truncate_identifier,
};

/// A single schema operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum MigrationOperation {
    RenameTable {
        from: String,
        to: String,
    },
    AddColumn {
        table: String,
        column: ColumnDef,
    },
    DropColumn {
        table: String,
        column: ColumnDef,
    },
    RenameColumn {
        table: String,
        from: String,
        to: String,
    },
    AlterColumn {
        table: String,
        from: ColumnDef,
        to: ColumnDef,
    },
}

impl MigrationOperation {
    /// The operation undoing this one
    pub fn inverse(&self) -> MigrationOperation {
        match self {
            MigrationOperation::RenameTable { from, to } => MigrationOperation::RenameTable {
                from: to.clone(),
                to: from.clone(),
            },
            MigrationOperation::AddColumn { table, column } => MigrationOperation::DropColumn {
                table: table.clone(),
                column: column.clone(),
            },
            MigrationOperation::DropColumn { table, column } => MigrationOperation::AddColumn {
                table: table.clone(),
                column: column.clone(),
            },
            MigrationOperation::RenameColumn { table, from, to } => {
                MigrationOperation::RenameColumn {
                    table: table.clone(),
                    from: to.clone(),
                    to: from.clone(),
                }
            }
            MigrationOperation::AlterColumn { table, from, to } => MigrationOperation::AlterColumn {
                table: table.clone(),
                from: to.clone(),
                to: from.clone(),
            },
        }
    }

    /// Schema operation for a change, if the change touches the schema
    fn from_change(change: &Change) -> Option<MigrationOperation> {
        match change {
            Change::ClassRename { .. } => None,
            Change::TableRename { old, new } => Some(MigrationOperation::RenameTable {
                from: old.clone(),
                to: new.clone(),
            }),
            Change::ColumnRename { table, old, new } => Some(MigrationOperation::RenameColumn {
                table: table.clone(),
                from: old.clone(),
                to: new.clone(),
            }),
            Change::ColumnAdd { table, column } => Some(MigrationOperation::AddColumn {
                table: table.clone(),
                column: column.clone(),
            }),
            Change::ColumnDrop { table, column } => Some(MigrationOperation::DropColumn {
                table: table.clone(),
                column: column.clone(),
            }),
            Change::ColumnTypeChange {
                table,
                before,
                after,
                ..
            } => Some(MigrationOperation::AlterColumn {
                table: table.clone(),
                from: before.clone(),
                to: after.clone(),
            }),
        }
    }

    /// Apply this operation to a table shape
    pub fn apply_to(&self, snapshot: &Snapshot) -> Snapshot {
        match self {
            MigrationOperation::RenameTable { to, .. } => snapshot.with_table_name(to),
            MigrationOperation::AddColumn { column, .. } => {
                let mut columns = snapshot.columns().to_vec();
                columns.push(column.clone());
                snapshot.with_columns(columns)
            }
            MigrationOperation::DropColumn { column, .. } => snapshot.with_columns(
                snapshot
                    .columns()
                    .iter()
                    .filter(|col| col.name != column.name)
                    .cloned()
                    .collect(),
            ),
            MigrationOperation::RenameColumn { from, to, .. } => snapshot.with_columns(
                snapshot
                    .columns()
                    .iter()
                    .map(|col| if &col.name == from { col.renamed(to) } else { col.clone() })
                    .collect(),
            ),
            MigrationOperation::AlterColumn { from, to, .. } => snapshot.with_columns(
                snapshot
                    .columns()
                    .iter()
                    .map(|col| if col.name == from.name { to.clone() } else { col.clone() })
                    .collect(),
            ),
        }
    }
}

/// Which half of a migration to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Up,
    Down,
}

/// A generated, reversible migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Migration {
    pub name: String,
    pub up: Vec<MigrationOperation>,
    pub down: Vec<MigrationOperation>,
}

impl Migration {
    /// Run one direction against a table shape
    pub fn simulate(&self, snapshot: &Snapshot, direction: Direction) -> Snapshot {
        let operations = match direction {
            Direction::Up => &self.up,
            Direction::Down => &self.down,
        };

        operations
            .iter()
            .fold(snapshot.clone(), |current, op| op.apply_to(&current))
    }

    /// Render the migration as an SQL script with up and down sections
    pub fn render(&self, driver: Driver) -> String {
        let generator = SqlGenerator::new(driver);
        let mut script = format!("-- Migration: {}\n-- Driver: {}\n\n-- migrate:up\n", self.name, driver);

        for op in &self.up {
            script.push_str(&generator.operation_sql(op));
            script.push('\n');
        }

        script.push_str("\n-- migrate:down\n");
        for op in &self.down {
            script.push_str(&generator.operation_sql(op));
            script.push('\n');
        }

        script
    }

    /// Persist the rendered script into `directory`, returning the written path
    ///
    /// An existing file with the same name is never overwritten; a numeric
    /// suffix is added instead.
    pub fn write_to(&self, directory: &Path, driver: Driver) -> Result<PathBuf> {
        fs::create_dir_all(directory)?;

        let existing: Vec<String> = fs::read_dir(directory)?
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                entry
                    .path()
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().to_string())
            })
            .collect();

        let file_name = format!("{}.sql", generate_unique_name(&self.name, &existing));
        let path = directory.join(file_name);
        write_atomic(&path, &self.render(driver))?;

        tracing::info!(path = %path.display(), "Migration written");
        Ok(path)
    }
}

/// Builds migrations from change-sets
pub struct MigrationBuilder<'a> {
    config: &'a MigrationsConfig,
}

impl<'a> MigrationBuilder<'a> {
    pub fn new(config: &'a MigrationsConfig) -> Self {
        Self { config }
    }

    /// Build a migration named after the current time
    pub fn build(&self, changes: &ChangeSet) -> Option<Migration> {
        self.build_at(changes, Utc::now())
    }

    /// Build a migration, or nothing when no change touches the schema
    pub fn build_at(&self, changes: &ChangeSet, at: DateTime<Utc>) -> Option<Migration> {
        let up: Vec<MigrationOperation> = changes
            .iter()
            .filter_map(MigrationOperation::from_change)
            .collect();

        if up.is_empty() {
            tracing::debug!("No schema changes, skipping migration");
            return None;
        }

        let down = up.iter().rev().map(MigrationOperation::inverse).collect();
        let name = create_migration_name(&self.description(changes), at);

        tracing::info!(name = %name, operations = up.len(), "Built migration");
        Some(Migration { name, up, down })
    }

    /// Description part of the migration name, e.g. `refactor_students_table`
    fn description(&self, changes: &ChangeSet) -> String {
        let table = changes
            .iter()
            .find_map(|change| match change {
                Change::TableRename { new, .. } => Some(new.as_str()),
                Change::ColumnRename { table, .. }
                | Change::ColumnAdd { table, .. }
                | Change::ColumnDrop { table, .. }
                | Change::ColumnTypeChange { table, .. } => Some(table.as_str()),
                Change::ClassRename { .. } => None,
            })
            .unwrap_or("schema");

        let description = sanitize_identifier(&format!(
            "{}_{}_table",
            self.config.description_prefix, table
        ));

        // The timestamp prefix takes 15 characters
        let budget = self.config.max_name_length.saturating_sub(15);
        truncate_identifier(&description, budget)
    }
}
