//! Snapshot difference calculator
//!
//! This module compares two snapshots of the same model and calculates the
//! ordered change-set between them.
//!
//! Columns are matched by name. A column that disappears and another that
//! appears are reported as a drop and an add, even when their definitions
//! match: renames are only reported when the caller names them through
//! [`RenameHints`].

use std::collections::{HashMap, HashSet};

use crate::schema::change::{Change, ChangeSet, RenameHints};
use crate::snapshot::types::{ColumnDef, Snapshot};

/// Computes change-sets between snapshots
pub struct ChangeDetector;

impl ChangeDetector {
    /// Generate the change-set turning `old` into `new`
    pub fn detect(old: &Snapshot, new: &Snapshot) -> ChangeSet {
        Self::detect_with_hints(old, new, &RenameHints::default())
    }

    /// Generate the change-set, pairing the explicitly renamed columns
    ///
    /// Change order: class rename, table rename, column renames, column
    /// definition changes, column drops, column adds.
    pub fn detect_with_hints(old: &Snapshot, new: &Snapshot, hints: &RenameHints) -> ChangeSet {
        let mut changes = Vec::new();

        if old.class_name() != new.class_name() {
            changes.push(Change::ClassRename {
                old: old.class_name().to_string(),
                new: new.class_name().to_string(),
            });
        }

        if old.table_name() != new.table_name() {
            changes.push(Change::TableRename {
                old: old.table_name().to_string(),
                new: new.table_name().to_string(),
            });
        }

        // Column operations run after the table rename
        let table = new.table_name();

        let old_columns: HashMap<&str, &ColumnDef> = old
            .columns()
            .iter()
            .map(|col| (col.name.as_str(), col))
            .collect();
        let new_columns: HashMap<&str, &ColumnDef> = new
            .columns()
            .iter()
            .map(|col| (col.name.as_str(), col))
            .collect();

        let renames = Self::valid_renames(&old_columns, &new_columns, hints);
        let renamed_targets: HashSet<&str> = renames.values().copied().collect();

        let mut column_renames = Vec::new();
        let mut definition_changes = Vec::new();
        let mut drops = Vec::new();

        for old_col in old.columns() {
            let (name, new_col) = match renames.get(old_col.name.as_str()) {
                Some(&target) => {
                    column_renames.push(Change::ColumnRename {
                        table: table.to_string(),
                        old: old_col.name.clone(),
                        new: target.to_string(),
                    });
                    (target, new_columns.get(target).copied())
                }
                None => (old_col.name.as_str(), new_columns.get(old_col.name.as_str()).copied()),
            };

            match new_col {
                Some(new_col) => {
                    if old_col.definition_differs(new_col) {
                        definition_changes.push(Change::ColumnTypeChange {
                            table: table.to_string(),
                            column: name.to_string(),
                            old_type: old_col.column_type.clone(),
                            new_type: new_col.column_type.clone(),
                            before: old_col.renamed(name),
                            after: new_col.clone(),
                        });
                    }
                }
                None => drops.push(Change::ColumnDrop {
                    table: table.to_string(),
                    column: old_col.clone(),
                }),
            }
        }

        let adds = new
            .columns()
            .iter()
            .filter(|col| {
                !old_columns.contains_key(col.name.as_str())
                    && !renamed_targets.contains(col.name.as_str())
            })
            .map(|col| Change::ColumnAdd {
                table: table.to_string(),
                column: col.clone(),
            });

        changes.extend(column_renames);
        changes.extend(definition_changes);
        changes.extend(drops);
        changes.extend(adds);

        for change in &changes {
            tracing::debug!(kind = change.kind(), change = %change, "Detected change");
        }

        ChangeSet::new(changes)
    }

    /// Keep the hints whose source only exists in `old` and whose target only exists in `new`
    fn valid_renames<'a>(
        old_columns: &HashMap<&'a str, &'a ColumnDef>,
        new_columns: &HashMap<&'a str, &'a ColumnDef>,
        hints: &'a RenameHints,
    ) -> HashMap<&'a str, &'a str> {
        let mut renames = HashMap::new();
        let mut targets = HashSet::new();

        for (from, to) in hints.columns() {
            let valid = old_columns.contains_key(from)
                && !new_columns.contains_key(from)
                && new_columns.contains_key(to)
                && !old_columns.contains_key(to)
                && targets.insert(to);

            if valid {
                renames.insert(from, to);
            } else {
                tracing::warn!(
                    from = from,
                    to = to,
                    "Ignoring column rename: source must exist only in the old snapshot and target only in the new one"
                );
            }
        }

        renames
    }
}
