//! Typed changes between two snapshots

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::snapshot::types::{ColumnDef, ColumnType, Snapshot};

/// One detected difference between two snapshots
///
/// Column changes always name the table as it is called after any
/// [`Change::TableRename`] of the same change-set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Change {
    ClassRename {
        old: String,
        new: String,
    },
    TableRename {
        old: String,
        new: String,
    },
    ColumnRename {
        table: String,
        old: String,
        new: String,
    },
    ColumnAdd {
        table: String,
        column: ColumnDef,
    },
    ColumnDrop {
        table: String,
        /// Definition from the old snapshot, needed to re-add the column on rollback
        column: ColumnDef,
    },
    ColumnTypeChange {
        table: String,
        column: String,
        old_type: ColumnType,
        new_type: ColumnType,
        before: ColumnDef,
        after: ColumnDef,
    },
}

impl Change {
    /// Whether this change has an effect on the database schema
    pub fn affects_schema(&self) -> bool {
        !matches!(self, Change::ClassRename { .. })
    }

    /// Discriminator used in logs and serialized change-sets
    pub fn kind(&self) -> &'static str {
        match self {
            Change::ClassRename { .. } => "classRename",
            Change::TableRename { .. } => "tableRename",
            Change::ColumnRename { .. } => "columnRename",
            Change::ColumnAdd { .. } => "columnAdd",
            Change::ColumnDrop { .. } => "columnDrop",
            Change::ColumnTypeChange { .. } => "columnTypeChange",
        }
    }

    /// Apply this change to a snapshot, producing a new snapshot
    pub fn apply_to(&self, snapshot: &Snapshot) -> Snapshot {
        match self {
            Change::ClassRename { new, .. } => snapshot.with_class_name(new),
            Change::TableRename { new, .. } => snapshot.with_table_name(new),
            Change::ColumnRename { old, new, .. } => snapshot.with_columns(
                snapshot
                    .columns()
                    .iter()
                    .map(|col| if &col.name == old { col.renamed(new) } else { col.clone() })
                    .collect(),
            ),
            Change::ColumnAdd { column, .. } => {
                let mut columns = snapshot.columns().to_vec();
                columns.push(column.clone());
                snapshot.with_columns(columns)
            }
            Change::ColumnDrop { column, .. } => snapshot.with_columns(
                snapshot
                    .columns()
                    .iter()
                    .filter(|col| col.name != column.name)
                    .cloned()
                    .collect(),
            ),
            Change::ColumnTypeChange { column, after, .. } => snapshot.with_columns(
                snapshot
                    .columns()
                    .iter()
                    .map(|col| if &col.name == column { after.clone() } else { col.clone() })
                    .collect(),
            ),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::ClassRename { old, new } => write!(f, "rename class {} -> {}", old, new),
            Change::TableRename { old, new } => write!(f, "rename table {} -> {}", old, new),
            Change::ColumnRename { table, old, new } => {
                write!(f, "rename column {}.{} -> {}", table, old, new)
            }
            Change::ColumnAdd { table, column } => {
                write!(f, "add column {}.{} ({})", table, column.name, column.column_type)
            }
            Change::ColumnDrop { table, column } => {
                write!(f, "drop column {}.{}", table, column.name)
            }
            Change::ColumnTypeChange {
                table,
                column,
                old_type,
                new_type,
                ..
            } => write!(f, "change column {}.{} ({} -> {})", table, column, old_type, new_type),
        }
    }
}

/// Ordered sequence of changes between two snapshots
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangeSet {
    changes: Vec<Change>,
}

impl ChangeSet {
    pub fn new(changes: Vec<Change>) -> Self {
        Self { changes }
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.changes.iter()
    }

    pub fn as_slice(&self) -> &[Change] {
        &self.changes
    }

    /// Whether any change touches tables or columns
    pub fn has_schema_changes(&self) -> bool {
        self.changes.iter().any(Change::affects_schema)
    }

    /// Replay every change onto a snapshot
    pub fn replay(&self, snapshot: &Snapshot) -> Snapshot {
        self.changes
            .iter()
            .fold(snapshot.clone(), |current, change| change.apply_to(&current))
    }

    /// Pretty-printed JSON, suitable for logs and console output
    pub fn to_pretty_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl IntoIterator for ChangeSet {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a> IntoIterator for &'a ChangeSet {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

/// Explicit column renames supplied by the caller (old name -> new name)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameHints {
    columns: IndexMap<String, String>,
}

impl RenameHints {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that column `old` of the old snapshot is column `new` of the new one
    pub fn column(mut self, old: &str, new: &str) -> Self {
        self.columns.insert(old.to_string(), new.to_string());
        self
    }

    /// Parse `old=new` pairs as given on the command line
    pub fn parse<S: AsRef<str>>(pairs: &[S]) -> Result<Self> {
        let mut hints = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (old, new) = pair
                .split_once('=')
                .map(|(old, new)| (old.trim(), new.trim()))
                .filter(|(old, new)| is_column_name(old) && is_column_name(new))
                .ok_or_else(|| {
                    Error::ValidationError(format!(
                        "Invalid column rename '{}', expected old=new",
                        pair
                    ))
                })?;
            hints = hints.column(old, new);
        }
        Ok(hints)
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &str)> {
        self.columns.iter().map(|(old, new)| (old.as_str(), new.as_str()))
    }
}

fn is_column_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
