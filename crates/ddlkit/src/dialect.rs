//! Dialect capabilities.
//!
//! A dialect answers one question for the planner: can this change be
//! applied to this table in place, or does the table have to be rebuilt?
//! The answer comes from a [`Capabilities`] record. [`Capabilities::default`]
//! is the conservative baseline, every [`Dialect`] overrides it field by
//! field, and configuration can override the dialect's record the same way.

use crate::{Change, Error, Result};
use ddlkit_config::CapabilityOverrides;
use ddlkit_model::{Database, Index, Table};
use ddlkit_sql::QuoteStyle;
use std::fmt;
use std::str::FromStr;

/// Decides whether a change can be applied to a table without rebuilding it.
///
/// `table` is the table as it will be when the change runs, with every
/// previously approved change of the same table already applied.
/// Implementations must be pure.
pub trait CapabilityPredicate {
    fn is_supported(&self, table: &Table, change: &Change) -> bool;
}

impl<F> CapabilityPredicate for F
where
    F: Fn(&Table, &Change) -> bool,
{
    fn is_supported(&self, table: &Table, change: &Change) -> bool {
        self(table, change)
    }
}

/// Where a dialect can add columns to an existing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnAddition {
    Never,
    AtEnd,
    Anywhere,
}

impl FromStr for ColumnAddition {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "never" => Ok(ColumnAddition::Never),
            "at_end" => Ok(ColumnAddition::AtEnd),
            "anywhere" => Ok(ColumnAddition::Anywhere),
            other => Err(Error::InvalidConfig(format!(
                "add_column must be never, at_end or anywhere, got '{}'",
                other
            ))),
        }
    }
}

/// Which table-local changes a dialect applies in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub add_column: ColumnAddition,
    /// NOT NULL columns without a default break existing rows
    pub add_required_column_without_default: bool,
    pub remove_column: bool,
    pub reorder_columns: bool,
    pub alter_column_type: bool,
    pub alter_column_default: bool,
    pub alter_column_required: bool,
    pub alter_column_auto_increment: bool,
    pub add_primary_key: bool,
    pub remove_primary_key: bool,
    /// Replace a primary key in one step rather than as a removal plus an addition
    pub change_primary_key: bool,
    pub add_index: bool,
    pub remove_index: bool,
    pub recreate_table: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            add_column: ColumnAddition::AtEnd,
            add_required_column_without_default: false,
            remove_column: false,
            reorder_columns: false,
            alter_column_type: false,
            alter_column_default: false,
            alter_column_required: false,
            alter_column_auto_increment: false,
            add_primary_key: true,
            remove_primary_key: true,
            change_primary_key: false,
            add_index: true,
            remove_index: true,
            recreate_table: true,
        }
    }
}

impl Capabilities {
    /// Apply configured overrides; unset fields keep their value.
    pub fn with_overrides(mut self, overrides: &CapabilityOverrides) -> Result<Self> {
        if let Some(add_column) = &overrides.add_column {
            self.add_column = add_column.parse()?;
        }

        let flags = [
            (
                &mut self.add_required_column_without_default,
                overrides.add_required_column_without_default,
            ),
            (&mut self.remove_column, overrides.remove_column),
            (&mut self.reorder_columns, overrides.reorder_columns),
            (&mut self.alter_column_type, overrides.alter_column_type),
            (&mut self.alter_column_default, overrides.alter_column_default),
            (&mut self.alter_column_required, overrides.alter_column_required),
            (
                &mut self.alter_column_auto_increment,
                overrides.alter_column_auto_increment,
            ),
            (&mut self.add_primary_key, overrides.add_primary_key),
            (&mut self.remove_primary_key, overrides.remove_primary_key),
            (&mut self.change_primary_key, overrides.change_primary_key),
            (&mut self.add_index, overrides.add_index),
            (&mut self.remove_index, overrides.remove_index),
            (&mut self.recreate_table, overrides.recreate_table),
        ];
        for (field, value) in flags {
            if let Some(value) = value {
                *field = value;
            }
        }

        Ok(self)
    }
}

impl CapabilityPredicate for Capabilities {
    fn is_supported(&self, table: &Table, change: &Change) -> bool {
        match change {
            // Not table-local: always expressible
            Change::AddTable { .. }
            | Change::RemoveTable { .. }
            | Change::AddForeignKey { .. }
            | Change::RemoveForeignKey { .. } => true,
            Change::RecreateTable { .. } => self.recreate_table,
            Change::AddColumn { column, .. } => {
                let placed = match self.add_column {
                    ColumnAddition::Never => false,
                    // Names in changes are spelled as in the model they apply to
                    ColumnAddition::AtEnd => {
                        change.insert_position(table, true) == table.columns.len()
                    }
                    ColumnAddition::Anywhere => true,
                };
                placed && (column.can_be_omitted() || self.add_required_column_without_default)
            }
            Change::RemoveColumn { .. } => self.remove_column,
            Change::ReorderColumns { .. } => self.reorder_columns,
            Change::AlterColumnType { .. } => self.alter_column_type,
            Change::AlterColumnAutoIncrement { .. } => self.alter_column_auto_increment,
            Change::AlterColumnDefault { .. } => self.alter_column_default,
            Change::AlterColumnRequired { .. } => self.alter_column_required,
            Change::AddPrimaryKey { .. } => self.add_primary_key,
            Change::RemovePrimaryKey { .. } => self.remove_primary_key,
            Change::ChangePrimaryKey { .. } => self.change_primary_key,
            Change::AddIndex { .. } => self.add_index,
            Change::RemoveIndex { .. } => self.remove_index,
        }
    }
}

/// A supported SQL dialect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Dialect {
    /// ANSI SQL, conservative capabilities
    #[default]
    Generic,
    PostgreSql,
    MySql,
    Sqlite,
}

impl Dialect {
    pub fn capabilities(self) -> Capabilities {
        let base = Capabilities::default();
        match self {
            Dialect::Generic => base,
            Dialect::PostgreSql => Capabilities {
                remove_column: true,
                alter_column_type: true,
                alter_column_default: true,
                alter_column_required: true,
                alter_column_auto_increment: true,
                change_primary_key: true,
                ..base
            },
            Dialect::MySql => Capabilities {
                add_column: ColumnAddition::Anywhere,
                remove_column: true,
                alter_column_type: true,
                alter_column_default: true,
                alter_column_required: true,
                alter_column_auto_increment: true,
                change_primary_key: true,
                ..base
            },
            // ALTER TABLE in SQLite can add and drop columns, nothing else
            Dialect::Sqlite => Capabilities {
                remove_column: true,
                add_primary_key: false,
                remove_primary_key: false,
                ..base
            },
        }
    }

    pub fn quote_style(self) -> QuoteStyle {
        match self {
            Dialect::MySql => QuoteStyle::Backtick,
            Dialect::Generic | Dialect::PostgreSql | Dialect::Sqlite => QuoteStyle::Double,
        }
    }

    /// Whether `index` was created by the database itself to back a
    /// primary or foreign key of `table`.
    pub fn is_internal_index(self, table: &Table, index: &Index) -> bool {
        match self {
            Dialect::Generic => false,
            Dialect::PostgreSql => index
                .name
                .eq_ignore_ascii_case(&ddlkit_sql::primary_key_name(&table.name)),
            Dialect::MySql => {
                index.name.eq_ignore_ascii_case("PRIMARY")
                    || table.foreign_keys.iter().any(|fk| {
                        index
                            .name
                            .eq_ignore_ascii_case(&fk.effective_name(&table.name))
                            && index.columns.len() == fk.references.len()
                            && index
                                .column_names()
                                .iter()
                                .zip(fk.local_columns())
                                .all(|(a, b)| a.eq_ignore_ascii_case(b))
                    })
            }
            Dialect::Sqlite => index
                .name
                .to_ascii_lowercase()
                .starts_with("sqlite_autoindex_"),
        }
    }

    /// A copy of `db` without the indexes this dialect maintains itself.
    pub fn strip_internal_indexes(self, db: &Database) -> Database {
        let mut stripped = db.clone();
        for table in &mut stripped.tables {
            let internal: Vec<bool> = table
                .indices
                .iter()
                .map(|index| self.is_internal_index(table, index))
                .collect();
            let mut flags = internal.into_iter();
            table
                .indices
                .retain(|_| !flags.next().unwrap_or(false));
        }
        stripped
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "generic" | "ansi" => Ok(Dialect::Generic),
            "postgresql" | "postgres" => Ok(Dialect::PostgreSql),
            "mysql" => Ok(Dialect::MySql),
            "sqlite" => Ok(Dialect::Sqlite),
            _ => Err(Error::UnknownDialect(s.to_string())),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Dialect::Generic => "generic",
            Dialect::PostgreSql => "postgresql",
            Dialect::MySql => "mysql",
            Dialect::Sqlite => "sqlite",
        };
        write!(f, "{}", name)
    }
}
