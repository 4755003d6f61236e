//! Model comparison: derive the changes that turn one model into another.
//!
//! The comparator walks the two models and emits changes in an order that
//! is safe to execute:
//!
//! ```text
//! - foreign keys that do not survive
//! + tables, referenced tables first
//! per surviving table:
//!   - indices
//!   - primary key (when removed, or when one of its columns goes away)
//!   - columns
//!   ~ column order
//!   ~ column definitions
//!   + columns
//!   + / ~ primary key
//!   ~ columns becoming nullable
//!   + indices
//! - tables, referencing tables first
//! + foreign keys
//! ```
//!
//! Every change is applied to a working copy of the current model as soon
//! as it is emitted. A change that does not apply is a bug in the ordering
//! and surfaces as a [`ModelError`] instead of an unusable change list.

use crate::order::{creation_order, removal_order};
use crate::{Change, Dialect, Result};
use ddlkit_model::{Column, Database, Index, ModelError, Table, names_equal, same_default};
use tracing::{debug, debug_span, trace};

/// Compares a current model against a desired one.
#[derive(Debug, Clone, Default)]
pub struct ModelComparator {
    case_sensitive: bool,
    dialect: Option<Dialect>,
}

impl ModelComparator {
    pub fn new(case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            dialect: None,
        }
    }

    /// A comparator that ignores the indexes `dialect` maintains on its own.
    pub fn for_dialect(dialect: Dialect, case_sensitive: bool) -> Self {
        Self {
            case_sensitive,
            dialect: Some(dialect),
        }
    }

    /// Produce the ordered changes that transform `current` into `desired`.
    pub fn compare(&self, current: &Database, desired: &Database) -> Result<Vec<Change>> {
        let span = debug_span!(
            "compare",
            current = %current.name,
            desired = %desired.name,
            case_sensitive = self.case_sensitive
        );
        let _guard = span.enter();

        let (current, desired) = match self.dialect {
            Some(dialect) => (
                dialect.strip_internal_indexes(current),
                dialect.strip_internal_indexes(desired),
            ),
            None => (current.clone(), desired.clone()),
        };

        let cs = self.case_sensitive;
        let mut out = Emitter {
            work: current.clone(),
            changes: Vec::new(),
            case_sensitive: cs,
        };

        // Foreign keys go first so no table or column is pinned by one
        for table in &current.tables {
            let surviving = desired
                .find_table(&table.name, cs)
                .map(|t| t.foreign_keys.as_slice())
                .unwrap_or_default();
            let matches = match_pairs(&table.foreign_keys, surviving, |a, b| {
                a.is_equivalent_to(b, cs)
            });
            for (fk, matched) in table.foreign_keys.iter().zip(matches) {
                if matched.is_none() {
                    out.emit(Change::RemoveForeignKey {
                        table: table.name.clone(),
                        foreign_key: fk.clone(),
                    })?;
                }
            }
        }

        let added: Vec<&Table> = desired
            .tables
            .iter()
            .filter(|t| current.find_table(&t.name, cs).is_none())
            .collect();
        for table in creation_order(&added, cs) {
            out.emit(Change::AddTable {
                table: table.clone(),
            })?;
        }

        for table in &current.tables {
            if let Some(target) = desired.find_table(&table.name, cs) {
                self.compare_table(&mut out, &table.name, target)?;
            }
        }

        let removed: Vec<&Table> = current
            .tables
            .iter()
            .filter(|t| desired.find_table(&t.name, cs).is_none())
            .collect();
        for table in removal_order(&removed, cs) {
            out.emit(Change::RemoveTable {
                table: table.name.clone(),
            })?;
        }

        for target in &desired.tables {
            let (table_name, existing) = match out.work.find_table(&target.name, cs) {
                Some(t) => (t.name.clone(), t.foreign_keys.clone()),
                None => continue,
            };
            let matches = match_pairs(&target.foreign_keys, &existing, |a, b| {
                a.is_equivalent_to(b, cs)
            });
            for (fk, matched) in target.foreign_keys.iter().zip(matches) {
                if matched.is_none() {
                    out.emit(Change::AddForeignKey {
                        table: table_name.clone(),
                        foreign_key: fk.clone(),
                    })?;
                }
            }
        }

        debug!(changes = out.changes.len(), "compared models");
        Ok(out.changes)
    }

    fn compare_table(&self, out: &mut Emitter, name: &str, target: &Table) -> Result<()> {
        let cs = self.case_sensitive;
        let current = out.table(name)?.clone();
        let table_name = current.name.clone();

        let (removed_indices, added_indices) = diff_indices(&current, target, cs);
        for index in removed_indices {
            out.emit(Change::RemoveIndex {
                table: table_name.clone(),
                index,
            })?;
        }

        let current_pk = current.primary_key_names();
        let desired_pk = target.primary_key_names();
        let mut late_pk = None;
        if !same_names(&current_pk, &desired_pk, cs) {
            let keeps_columns = current_pk
                .iter()
                .all(|c| target.find_column(c, cs).is_some());

            if desired_pk.is_empty() || (!current_pk.is_empty() && !keeps_columns) {
                out.emit(Change::RemovePrimaryKey {
                    table: table_name.clone(),
                    columns: current_pk.clone(),
                })?;
            }

            late_pk = if desired_pk.is_empty() {
                None
            } else if current_pk.is_empty() || !keeps_columns {
                Some(Change::AddPrimaryKey {
                    table: table_name.clone(),
                    columns: desired_pk,
                })
            } else {
                Some(Change::ChangePrimaryKey {
                    table: table_name.clone(),
                    old_columns: current_pk,
                    new_columns: desired_pk,
                })
            };
        }

        for column in &current.columns {
            if target.find_column(&column.name, cs).is_none() {
                out.emit(Change::RemoveColumn {
                    table: table_name.clone(),
                    column: column.name.clone(),
                })?;
            }
        }

        let working = out.table(name)?;
        let existing_order: Vec<String> = working.columns.iter().map(|c| c.name.clone()).collect();
        let desired_order: Vec<String> = target
            .columns
            .iter()
            .filter_map(|c| working.find_column(&c.name, cs).map(|w| w.name.clone()))
            .collect();
        if existing_order != desired_order {
            out.emit(Change::ReorderColumns {
                table: table_name.clone(),
                columns: desired_order,
            })?;
        }

        for desired_column in &target.columns {
            let Some(column) = out.table(name)?.find_column(&desired_column.name, cs).cloned()
            else {
                continue;
            };
            for change in diff_column(&table_name, &column, desired_column) {
                out.emit(change)?;
            }
        }

        for (i, desired_column) in target.columns.iter().enumerate() {
            let working = out.table(name)?;
            if working.find_column(&desired_column.name, cs).is_some() {
                continue;
            }
            let previous_column = i
                .checked_sub(1)
                .and_then(|p| working.find_column(&target.columns[p].name, cs))
                .map(|c| c.name.clone());
            let next_column = target.columns[i + 1..]
                .iter()
                .find_map(|c| working.find_column(&c.name, cs))
                .map(|c| c.name.clone());

            out.emit(Change::AddColumn {
                table: table_name.clone(),
                // Joins the key later, but must arrive NOT NULL to get there
                column: Column {
                    primary_key: false,
                    required: desired_column.is_required(),
                    ..desired_column.clone()
                },
                previous_column,
                next_column,
            })?;
        }

        if let Some(change) = late_pk {
            out.emit(change)?;
        }

        for desired_column in &target.columns {
            let Some(column) = out.table(name)?.find_column(&desired_column.name, cs) else {
                continue;
            };
            if column.is_required() && !desired_column.is_required() {
                let column = column.name.clone();
                out.emit(Change::AlterColumnRequired {
                    table: table_name.clone(),
                    column,
                    required: false,
                })?;
            }
        }

        for index in added_indices {
            out.emit(Change::AddIndex {
                table: table_name.clone(),
                index,
            })?;
        }

        Ok(())
    }
}

/// Compare two models case-(in)sensitively; see [`ModelComparator::compare`].
pub fn compare(current: &Database, desired: &Database, case_sensitive: bool) -> Result<Vec<Change>> {
    ModelComparator::new(case_sensitive).compare(current, desired)
}

/// Working state of one comparison.
struct Emitter {
    work: Database,
    changes: Vec<Change>,
    case_sensitive: bool,
}

impl Emitter {
    fn emit(&mut self, change: Change) -> Result<(), ModelError> {
        change.apply(&mut self.work, self.case_sensitive)?;
        trace!(%change, "emit");
        self.changes.push(change);
        Ok(())
    }

    fn table(&self, name: &str) -> Result<&Table, ModelError> {
        self.work
            .find_table(name, self.case_sensitive)
            .ok_or_else(|| ModelError::TableNotFound {
                table: name.to_string(),
            })
    }
}

/// Pair each element of `current` with a distinct equal element of `desired`.
///
/// Returns, for every element of `current`, the index of its partner.
fn match_pairs<T>(current: &[T], desired: &[T], eq: impl Fn(&T, &T) -> bool) -> Vec<Option<usize>> {
    let mut taken = vec![false; desired.len()];
    current
        .iter()
        .map(|c| {
            let j = (0..desired.len()).find(|&j| !taken[j] && eq(c, &desired[j]))?;
            taken[j] = true;
            Some(j)
        })
        .collect()
}

/// Indexes to remove from and add to `current` to match `desired`.
///
/// Indexes pair up by definition, not by name. A kept index whose name is
/// needed by an added one is removed and added again under its new name.
fn diff_indices(current: &Table, desired: &Table, cs: bool) -> (Vec<Index>, Vec<Index>) {
    let mut matches = match_pairs(&current.indices, &desired.indices, |a, b| {
        a.is_equivalent_to(b, cs)
    });

    loop {
        let is_matched = |j: usize| matches.contains(&Some(j));
        let clash = desired
            .indices
            .iter()
            .enumerate()
            .filter(|(j, _)| !is_matched(*j))
            .find_map(|(_, added)| {
                current.indices.iter().zip(&matches).position(|(kept, m)| {
                    m.is_some() && names_equal(&kept.name, &added.name, cs)
                })
            });
        match clash {
            Some(i) => matches[i] = None,
            None => break,
        }
    }

    let removed = current
        .indices
        .iter()
        .zip(&matches)
        .filter(|(_, m)| m.is_none())
        .map(|(index, _)| index.clone())
        .collect();
    let added = desired
        .indices
        .iter()
        .enumerate()
        .filter(|(j, _)| !matches.contains(&Some(*j)))
        .map(|(_, index)| index.clone())
        .collect();
    (removed, added)
}

/// Definition changes for a column present in both models.
fn diff_column(table: &str, current: &Column, desired: &Column) -> Vec<Change> {
    let mut changes = Vec::new();

    let (from, to) = (current.column_type(), desired.column_type());
    if from.differs_from(&to) {
        changes.push(Change::AlterColumnType {
            table: table.to_string(),
            column: current.name.clone(),
            from,
            to,
        });
    }

    if current.auto_increment != desired.auto_increment {
        changes.push(Change::AlterColumnAutoIncrement {
            table: table.to_string(),
            column: current.name.clone(),
            auto_increment: desired.auto_increment,
        });
    }

    if !same_default(
        desired.sql_type,
        current.default_value.as_deref(),
        desired.default_value.as_deref(),
    ) {
        changes.push(Change::AlterColumnDefault {
            table: table.to_string(),
            column: current.name.clone(),
            from: current.default_value.clone(),
            to: desired.default_value.clone(),
        });
    }

    // Key and auto-increment columns are NOT NULL whatever their flag says;
    // only touch the flag when the column would otherwise end up nullable.
    // A key column gets NOT NULL when it leaves the key, and relaxing to
    // nullable waits until after the key changes.
    let untouched = Column {
        required: current.required,
        ..desired.clone()
    };
    if !untouched.is_required() && desired.is_required() && !current.primary_key {
        changes.push(Change::AlterColumnRequired {
            table: table.to_string(),
            column: current.name.clone(),
            required: true,
        });
    }

    changes
}

fn same_names(a: &[String], b: &[String], cs: bool) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| names_equal(x, y, cs))
}
