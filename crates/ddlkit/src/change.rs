//! The change vocabulary.
//!
//! A [`Change`] is one atomic structural edit. Changes name their table
//! (and column, key, index) instead of holding references into a model, and
//! [`Change::apply`] looks everything up again at apply time, so a change
//! stays valid however many changes were applied before it.

use ddlkit_model::{
    Column, ColumnType, Database, ForeignKey, Index, ModelError, Table, names_equal,
};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Change {
    /// Create a table. Its foreign keys are added by separate changes.
    AddTable { table: Table },
    RemoveTable { table: String },
    /// Replace a table by a rebuilt one with the `target` definition.
    RecreateTable {
        table: String,
        target: Table,
        /// The changes this recreation stands in for
        original_changes: Vec<Change>,
        /// Whether existing rows can be copied into the rebuilt table
        migrate_data: bool,
    },
    /// Insert a column after `previous_column`, or before `next_column`
    /// when there is no previous one; at the end when neither is found.
    AddColumn {
        table: String,
        column: Column,
        previous_column: Option<String>,
        /// The first existing column that follows the new one, if any
        next_column: Option<String>,
    },
    RemoveColumn { table: String, column: String },
    /// Reorder the table's columns; listed columns come first in list order.
    ReorderColumns { table: String, columns: Vec<String> },
    AlterColumnType {
        table: String,
        column: String,
        from: ColumnType,
        to: ColumnType,
    },
    AlterColumnAutoIncrement {
        table: String,
        column: String,
        auto_increment: bool,
    },
    AlterColumnDefault {
        table: String,
        column: String,
        from: Option<String>,
        to: Option<String>,
    },
    AlterColumnRequired {
        table: String,
        column: String,
        required: bool,
    },
    AddPrimaryKey { table: String, columns: Vec<String> },
    RemovePrimaryKey { table: String, columns: Vec<String> },
    ChangePrimaryKey {
        table: String,
        old_columns: Vec<String>,
        new_columns: Vec<String>,
    },
    AddIndex { table: String, index: Index },
    RemoveIndex { table: String, index: Index },
    AddForeignKey {
        table: String,
        foreign_key: ForeignKey,
    },
    RemoveForeignKey {
        table: String,
        foreign_key: ForeignKey,
    },
}

/// Where a change sits in a migration.
///
/// Migrations run phase by phase; within a phase, changes of different
/// tables are independent of each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Phase {
    DropForeignKeys,
    AddTables,
    DropIndices,
    DropPrimaryKeys,
    Columns,
    AddPrimaryKeys,
    /// Columns become nullable only once they are out of every key
    DropNotNull,
    AddIndices,
    RemoveTables,
    AddForeignKeys,
}

impl Change {
    /// Name of the table this change targets.
    pub fn table_name(&self) -> &str {
        match self {
            Change::AddTable { table } => &table.name,
            Change::RemoveTable { table }
            | Change::RecreateTable { table, .. }
            | Change::AddColumn { table, .. }
            | Change::RemoveColumn { table, .. }
            | Change::ReorderColumns { table, .. }
            | Change::AlterColumnType { table, .. }
            | Change::AlterColumnAutoIncrement { table, .. }
            | Change::AlterColumnDefault { table, .. }
            | Change::AlterColumnRequired { table, .. }
            | Change::AddPrimaryKey { table, .. }
            | Change::RemovePrimaryKey { table, .. }
            | Change::ChangePrimaryKey { table, .. }
            | Change::AddIndex { table, .. }
            | Change::RemoveIndex { table, .. }
            | Change::AddForeignKey { table, .. }
            | Change::RemoveForeignKey { table, .. } => table,
        }
    }

    pub fn phase(&self) -> Phase {
        match self {
            Change::RemoveForeignKey { .. } => Phase::DropForeignKeys,
            Change::AddTable { .. } => Phase::AddTables,
            Change::RemoveIndex { .. } => Phase::DropIndices,
            Change::RemovePrimaryKey { .. } => Phase::DropPrimaryKeys,
            Change::RecreateTable { .. }
            | Change::AddColumn { .. }
            | Change::RemoveColumn { .. }
            | Change::ReorderColumns { .. }
            | Change::AlterColumnType { .. }
            | Change::AlterColumnAutoIncrement { .. }
            | Change::AlterColumnDefault { .. }
            | Change::AlterColumnRequired { required: true, .. } => Phase::Columns,
            Change::AlterColumnRequired { required: false, .. } => Phase::DropNotNull,
            Change::AddPrimaryKey { .. } | Change::ChangePrimaryKey { .. } => {
                Phase::AddPrimaryKeys
            }
            Change::AddIndex { .. } => Phase::AddIndices,
            Change::RemoveTable { .. } => Phase::RemoveTables,
            Change::AddForeignKey { .. } => Phase::AddForeignKeys,
        }
    }

    /// Whether the change edits the inside of one existing table.
    ///
    /// Those are the changes a dialect may refuse, forcing a recreation.
    pub fn is_table_scoped(&self) -> bool {
        !matches!(
            self,
            Change::AddTable { .. }
                | Change::RemoveTable { .. }
                | Change::AddForeignKey { .. }
                | Change::RemoveForeignKey { .. }
        )
    }

    /// For [`Change::AddColumn`], whether the column has no existing
    /// successor, i.e. lands at the end of the table.
    pub fn at_end(&self) -> bool {
        matches!(
            self,
            Change::AddColumn {
                next_column: None,
                ..
            }
        )
    }

    /// Where an [`Change::AddColumn`] inserts into `table` in its current state.
    pub fn insert_position(&self, table: &Table, case_sensitive: bool) -> usize {
        let Change::AddColumn {
            previous_column,
            next_column,
            ..
        } = self
        else {
            return table.columns.len();
        };

        let after_previous = previous_column
            .as_deref()
            .and_then(|prev| table.column_position(prev, case_sensitive))
            .map(|i| i + 1);
        let before_next = next_column
            .as_deref()
            .and_then(|next| table.column_position(next, case_sensitive));

        after_previous
            .or(before_next)
            .unwrap_or(table.columns.len())
    }

    /// Apply this change to `db`.
    ///
    /// Tables and columns are looked up by name in `db` itself. On error
    /// the model is left as it was.
    pub fn apply(&self, db: &mut Database, case_sensitive: bool) -> Result<(), ModelError> {
        match self {
            Change::AddTable { table } => db.add_table(table.without_foreign_keys(), case_sensitive),
            Change::RemoveTable { table } => db.remove_table(table, case_sensitive).map(drop),
            Change::RecreateTable { table, target, .. } => {
                let position = db.table_position(table, case_sensitive).ok_or_else(|| {
                    ModelError::TableNotFound {
                        table: table.clone(),
                    }
                })?;
                let linked = db.foreign_keys_to_and_from(table, case_sensitive);
                if !linked.is_empty() {
                    return Err(ModelError::ForeignKeysPresent {
                        table: table.clone(),
                        foreign_keys: linked
                            .iter()
                            .map(|(owner, fk)| format!("{}{}", owner, fk))
                            .collect(),
                    });
                }
                db.tables[position] = target.without_foreign_keys();
                Ok(())
            }
            Change::RemoveColumn { table, column } => {
                if let Some((owner, fk)) = db
                    .referencing_foreign_keys(table, case_sensitive)
                    .into_iter()
                    .find(|(_, fk)| fk.uses_foreign_column(column, case_sensitive))
                {
                    return Err(ModelError::ColumnInUse {
                        table: table.clone(),
                        column: column.clone(),
                        used_by: format!("foreign key {}{}", owner, fk),
                    });
                }
                self.apply_to_table(db.table_mut(table, case_sensitive)?, case_sensitive)
            }
            Change::AddForeignKey { table, foreign_key } => {
                let owner = db.find_table(table, case_sensitive).ok_or_else(|| {
                    ModelError::TableNotFound {
                        table: table.clone(),
                    }
                })?;
                db.check_foreign_target(owner, foreign_key, case_sensitive)?;
                self.apply_to_table(db.table_mut(table, case_sensitive)?, case_sensitive)
            }
            _ => self.apply_to_table(db.table_mut(self.table_name(), case_sensitive)?, case_sensitive),
        }
    }

    /// Apply the table-local part of this change to `table`.
    ///
    /// Cross-table checks (foreign key targets, inbound references) are left
    /// to [`Change::apply`]. Adding or removing a whole table is a no-op here.
    pub(crate) fn apply_to_table(
        &self,
        table: &mut Table,
        case_sensitive: bool,
    ) -> Result<(), ModelError> {
        match self {
            Change::AddTable { .. } | Change::RemoveTable { .. } => Ok(()),
            Change::RecreateTable { target, .. } => {
                *table = target.without_foreign_keys();
                Ok(())
            }
            Change::AddColumn { column, .. } => {
                let position = self.insert_position(table, case_sensitive);
                table.insert_column(position, column.clone(), case_sensitive)
            }
            Change::RemoveColumn { column, .. } => {
                table.remove_column(column, case_sensitive).map(drop)
            }
            Change::ReorderColumns { columns, .. } => {
                reorder_columns(table, columns, case_sensitive)
            }
            Change::AlterColumnType { column, to, .. } => {
                column_mut(table, column, case_sensitive)?.set_column_type(to);
                Ok(())
            }
            Change::AlterColumnAutoIncrement {
                column,
                auto_increment,
                ..
            } => {
                column_mut(table, column, case_sensitive)?.auto_increment = *auto_increment;
                Ok(())
            }
            Change::AlterColumnDefault { column, to, .. } => {
                column_mut(table, column, case_sensitive)?.default_value = to.clone();
                Ok(())
            }
            Change::AlterColumnRequired {
                column, required, ..
            } => {
                column_mut(table, column, case_sensitive)?.required = *required;
                Ok(())
            }
            Change::AddPrimaryKey { columns, .. }
            | Change::ChangePrimaryKey {
                new_columns: columns,
                ..
            } => replace_primary_key(table, columns, case_sensitive),
            Change::RemovePrimaryKey { .. } => replace_primary_key(table, &[], case_sensitive),
            Change::AddIndex { index, .. } => table.add_index(index.clone(), case_sensitive),
            Change::RemoveIndex { index, .. } => {
                table.remove_index(&index.name, case_sensitive).map(drop)
            }
            Change::AddForeignKey { foreign_key, .. } => {
                table.add_foreign_key(foreign_key.clone(), case_sensitive)
            }
            Change::RemoveForeignKey { foreign_key, .. } => table
                .remove_foreign_key(foreign_key, case_sensitive)
                .map(drop),
        }
    }
}

/// Make `columns` the key. Columns leaving the key stay NOT NULL, as they
/// do in the database when the key constraint is dropped.
fn replace_primary_key(
    table: &mut Table,
    columns: &[String],
    case_sensitive: bool,
) -> Result<(), ModelError> {
    let leaving: Vec<String> = table
        .columns
        .iter()
        .filter(|c| {
            c.primary_key
                && !columns
                    .iter()
                    .any(|name| names_equal(name, &c.name, case_sensitive))
        })
        .map(|c| c.name.clone())
        .collect();
    table.set_primary_key(columns, case_sensitive)?;
    for name in &leaving {
        if let Some(column) = table.find_column_mut(name, case_sensitive) {
            column.required = true;
        }
    }
    Ok(())
}

fn column_mut<'a>(
    table: &'a mut Table,
    column: &str,
    case_sensitive: bool,
) -> Result<&'a mut Column, ModelError> {
    let table_name = table.name.clone();
    table
        .find_column_mut(column, case_sensitive)
        .ok_or_else(|| ModelError::ColumnNotFound {
            table: table_name,
            column: column.to_string(),
        })
}

fn reorder_columns(
    table: &mut Table,
    order: &[String],
    case_sensitive: bool,
) -> Result<(), ModelError> {
    // Validate up front so a failed reorder leaves the table untouched
    for (i, name) in order.iter().enumerate() {
        let listed_twice = order[..i]
            .iter()
            .any(|other| names_equal(other, name, case_sensitive));
        if listed_twice || table.find_column(name, case_sensitive).is_none() {
            return Err(ModelError::ColumnNotFound {
                table: table.name.clone(),
                column: name.clone(),
            });
        }
    }

    let mut remaining = std::mem::take(&mut table.columns);
    let mut reordered = Vec::with_capacity(remaining.len());
    for name in order {
        if let Some(position) = remaining
            .iter()
            .position(|c| names_equal(&c.name, name, case_sensitive))
        {
            reordered.push(remaining.remove(position));
        }
    }
    reordered.extend(remaining);
    table.columns = reordered;
    Ok(())
}

fn describe_column(column: &Column) -> String {
    let mut s = format!("{} {}", column.name, column.column_type());
    if column.is_required() {
        s.push_str(" NOT NULL");
    }
    if column.auto_increment {
        s.push_str(" AUTO INCREMENT");
    }
    if let Some(default) = &column.default_value {
        s.push_str(&format!(" DEFAULT {}", default));
    }
    s
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Change::AddTable { table } => write!(f, "+ table {}", table.name),
            Change::RemoveTable { table } => write!(f, "- table {}", table),
            Change::RecreateTable {
                table,
                original_changes,
                migrate_data,
                ..
            } => {
                let data = if *migrate_data { "" } else { ", data dropped" };
                write!(
                    f,
                    "~ recreate {} ({} changes{})",
                    table,
                    original_changes.len(),
                    data
                )
            }
            Change::AddColumn {
                table,
                column,
                previous_column,
                next_column,
            } => {
                write!(f, "+ {}.{}", table, describe_column(column))?;
                match (next_column, previous_column) {
                    (None, _) => Ok(()),
                    (Some(_), Some(prev)) => write!(f, " after {}", prev),
                    (Some(next), None) => write!(f, " before {}", next),
                }
            }
            Change::RemoveColumn { table, column } => write!(f, "- {}.{}", table, column),
            Change::ReorderColumns { table, columns } => {
                write!(f, "~ {} column order: {}", table, columns.join(", "))
            }
            Change::AlterColumnType {
                table,
                column,
                from,
                to,
            } => write!(f, "~ {}.{}: {} -> {}", table, column, from, to),
            Change::AlterColumnAutoIncrement {
                table,
                column,
                auto_increment,
            } => {
                let state = if *auto_increment { "on" } else { "off" };
                write!(f, "~ {}.{} auto increment: {}", table, column, state)
            }
            Change::AlterColumnDefault {
                table,
                column,
                from,
                to,
            } => {
                let from = from.as_deref().unwrap_or("(none)");
                let to = to.as_deref().unwrap_or("(none)");
                write!(f, "~ {}.{} default: {} -> {}", table, column, from, to)
            }
            Change::AlterColumnRequired {
                table,
                column,
                required,
            } => {
                let (from, to) = if *required {
                    ("nullable", "not null")
                } else {
                    ("not null", "nullable")
                };
                write!(f, "~ {}.{}: {} -> {}", table, column, from, to)
            }
            Change::AddPrimaryKey { table, columns } => {
                write!(f, "+ {} PRIMARY KEY ({})", table, columns.join(", "))
            }
            Change::RemovePrimaryKey { table, columns } => {
                write!(f, "- {} PRIMARY KEY ({})", table, columns.join(", "))
            }
            Change::ChangePrimaryKey {
                table,
                old_columns,
                new_columns,
            } => write!(
                f,
                "~ {} PRIMARY KEY ({}) -> ({})",
                table,
                old_columns.join(", "),
                new_columns.join(", ")
            ),
            Change::AddIndex { table, index } => write!(f, "+ {} {}", table, index),
            Change::RemoveIndex { table, index } => write!(f, "- {} {}", table, index),
            Change::AddForeignKey { table, foreign_key } => {
                write!(f, "+ {} FOREIGN KEY {}", table, foreign_key)
            }
            Change::RemoveForeignKey { table, foreign_key } => {
                write!(f, "- {} FOREIGN KEY {}", table, foreign_key)
            }
        }
    }
}
