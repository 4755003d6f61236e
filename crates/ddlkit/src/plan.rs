//! Change application planning.
//!
//! The planner takes a comparator's change list and decides, table by
//! table, whether the dialect can apply a table's changes in place. When it
//! cannot, the table's whole group of changes is replaced by a single
//! [`Change::RecreateTable`], bracketed by the removal and re-addition of
//! every foreign key that links to the table.
//!
//! The final list runs in passes, each over all tables:
//!
//! 1. foreign key removals (requested, then the ones recreation needs)
//! 2. table additions
//! 3. index and primary key removals
//! 4. column changes and recreations
//! 5. primary key additions and replacements
//! 6. columns becoming nullable
//! 7. index additions
//! 8. table removals
//! 9. foreign key additions (re-added, then requested)

use crate::{CapabilityPredicate, Change, Error, Phase, Result};
use ddlkit_model::{Database, ModelError, Table, names_equal};
use indexmap::IndexMap;
use tracing::{debug, debug_span, trace, warn};

/// Rewrite `changes` into an executable migration for a dialect described
/// by `predicate`.
///
/// `changes` must transform `current` into `desired`, in an order that
/// applies cleanly, as [`compare`](crate::compare()) produces them. The
/// returned list is checked by replaying it against a copy of `current`.
pub fn plan(
    current: &Database,
    desired: &Database,
    changes: &[Change],
    predicate: &dyn CapabilityPredicate,
    case_sensitive: bool,
) -> Result<Vec<Change>> {
    let span = debug_span!("plan", changes = changes.len(), case_sensitive);
    let _guard = span.enter();
    let cs = case_sensitive;

    let mut foreign_key_removals = Vec::new();
    let mut table_additions = Vec::new();
    let mut groups: IndexMap<String, Vec<Change>> = IndexMap::new();
    let mut table_removals = Vec::new();
    let mut foreign_key_additions = Vec::new();
    for change in changes {
        match change.phase() {
            Phase::DropForeignKeys => foreign_key_removals.push(change.clone()),
            Phase::AddTables => table_additions.push(change.clone()),
            Phase::RemoveTables => table_removals.push(change.clone()),
            Phase::AddForeignKeys => foreign_key_additions.push(change.clone()),
            Phase::DropIndices
            | Phase::DropPrimaryKeys
            | Phase::Columns
            | Phase::AddPrimaryKeys
            | Phase::DropNotNull
            | Phase::AddIndices => groups
                .entry(group_key(change.table_name(), cs))
                .or_default()
                .push(change.clone()),
        }
    }

    let mut work = current.clone();
    for change in foreign_key_removals.iter().chain(&table_additions) {
        change.apply(&mut work, cs)?;
    }

    let mut dropped = Vec::new();
    let mut readded = Vec::new();
    let mut table_changes = Vec::new();
    for group in groups.into_values() {
        let name = group[0].table_name();
        let table = work
            .find_table(name, cs)
            .cloned()
            .ok_or_else(|| ModelError::TableNotFound {
                table: name.to_string(),
            })?;

        let prepared = split_primary_key_changes(&table, &group, predicate);
        let rejected = rejected_changes(&table, &prepared, predicate, cs);
        if rejected.is_empty() {
            debug!(table = %table.name, changes = prepared.len(), "applying in place");
            for change in prepared {
                change.apply(&mut work, cs)?;
                table_changes.push(change);
            }
            continue;
        }

        debug!(table = %table.name, ?rejected, "recreating table");
        let recreate = recreation(&table, &work, desired, &group, cs)?;
        if !predicate.is_supported(&table, &recreate) {
            return Err(Error::Unrepresentable {
                table: table.name,
                changes: group.iter().map(|c| c.to_string()).collect(),
            });
        }

        for (owner, foreign_key) in work.remove_foreign_keys_to_and_from(&[table.name.as_str()], cs) {
            trace!(table = %owner, %foreign_key, "dropping foreign key around recreation");
            readded.push(Change::AddForeignKey {
                table: owner.clone(),
                foreign_key: foreign_key.clone(),
            });
            dropped.push(Change::RemoveForeignKey {
                table: owner,
                foreign_key,
            });
        }
        recreate.apply(&mut work, cs)?;
        table_changes.push(recreate);
    }

    // Passes across tables; the sort is stable so each table keeps its order
    table_changes.sort_by_key(Change::phase);

    readded.retain(|change| {
        !foreign_key_additions
            .iter()
            .any(|requested| same_foreign_key(change, requested, cs))
    });

    let planned: Vec<Change> = foreign_key_removals
        .into_iter()
        .chain(dropped)
        .chain(table_additions)
        .chain(table_changes)
        .chain(table_removals)
        .chain(readded)
        .chain(foreign_key_additions)
        .collect();

    let mut replay = current.clone();
    for change in &planned {
        change.apply(&mut replay, cs)?;
    }

    debug!(changes = planned.len(), "planned migration");
    Ok(planned)
}

fn group_key(table: &str, case_sensitive: bool) -> String {
    if case_sensitive {
        table.to_string()
    } else {
        table.to_ascii_lowercase()
    }
}

/// Split primary key replacements the predicate rejects into a removal
/// plus an addition, then order the group by phase.
fn split_primary_key_changes(
    table: &Table,
    group: &[Change],
    predicate: &dyn CapabilityPredicate,
) -> Vec<Change> {
    let mut prepared = Vec::with_capacity(group.len());
    for change in group {
        match change {
            Change::ChangePrimaryKey {
                table: name,
                old_columns,
                new_columns,
            } if !predicate.is_supported(table, change) => {
                prepared.push(Change::RemovePrimaryKey {
                    table: name.clone(),
                    columns: old_columns.clone(),
                });
                prepared.push(Change::AddPrimaryKey {
                    table: name.clone(),
                    columns: new_columns.clone(),
                });
            }
            _ => prepared.push(change.clone()),
        }
    }
    prepared.sort_by_key(Change::phase);
    prepared
}

/// Walk the group against a scratch copy of `table`, applying every change
/// the predicate approves. Returns the ones that were refused or that no
/// longer apply.
fn rejected_changes(
    table: &Table,
    changes: &[Change],
    predicate: &dyn CapabilityPredicate,
    case_sensitive: bool,
) -> Vec<String> {
    let mut state = table.clone();
    let mut rejected = Vec::new();
    for change in changes {
        let mut next = state.clone();
        if predicate.is_supported(&state, change)
            && change.apply_to_table(&mut next, case_sensitive).is_ok()
        {
            state = next;
        } else {
            rejected.push(change.to_string());
        }
    }
    rejected
}

/// A recreation of `table` standing in for `changes`.
///
/// The target's foreign keys are resolved against `work`, the model the
/// recreation applies to.
fn recreation(
    table: &Table,
    work: &Database,
    desired: &Database,
    changes: &[Change],
    case_sensitive: bool,
) -> Result<Change> {
    let target = match desired.find_table(&table.name, case_sensitive) {
        // Keep the live spelling so later changes still find the table
        Some(target) => Table {
            name: table.name.clone(),
            ..target.clone()
        }
        .clone_into(work, case_sensitive),
        None => {
            let mut target = table.clone();
            for change in changes {
                change.apply_to_table(&mut target, case_sensitive)?;
            }
            target
        }
    };

    let migrate_data = !changes.iter().any(|change| {
        matches!(change, Change::AddColumn { column, .. } if !column.can_be_omitted())
    });
    if !migrate_data {
        warn!(
            table = %table.name,
            "recreated table gains a NOT NULL column without default, existing rows will not be copied"
        );
    }

    Ok(Change::RecreateTable {
        table: table.name.clone(),
        target,
        original_changes: changes.to_vec(),
        migrate_data,
    })
}

fn same_foreign_key(a: &Change, b: &Change, case_sensitive: bool) -> bool {
    match (a, b) {
        (
            Change::AddForeignKey {
                table: t1,
                foreign_key: fk1,
            },
            Change::AddForeignKey {
                table: t2,
                foreign_key: fk2,
            },
        ) => names_equal(t1, t2, case_sensitive) && fk1.is_equivalent_to(fk2, case_sensitive),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Capabilities, Dialect, compare};
    use ddlkit_model::{Column, ForeignKey, Index, SqlType};

    fn user_table() -> Table {
        Table::new("user")
            .with_column(Column::new("id", SqlType::Integer).primary_key())
            .with_column(Column::new("email", SqlType::VarChar).with_size(100))
    }

    fn post_table() -> Table {
        Table::new("post")
            .with_column(Column::new("id", SqlType::Integer).primary_key())
            .with_column(Column::new("author_id", SqlType::Integer))
            .with_foreign_key(ForeignKey::new("user").reference("author_id", "id"))
    }

    fn blog() -> Database {
        Database::new("blog")
            .with_table(user_table())
            .with_table(post_table())
    }

    fn plan_with(
        current: &Database,
        desired: &Database,
        predicate: &dyn CapabilityPredicate,
    ) -> Result<Vec<Change>> {
        let changes = compare(current, desired, false)?;
        plan(current, desired, &changes, predicate, false)
    }

    fn summary(changes: &[Change]) -> Vec<String> {
        changes.iter().map(|c| c.to_string()).collect()
    }

    #[test]
    fn test_supported_changes_pass_through() {
        let current = blog();
        let mut desired = blog();
        desired.tables[0]
            .indices
            .push(Index::unique("uq_user_email", ["email"]));
        desired.tables[0].columns.push(Column::new("name", SqlType::VarChar).with_size(50));

        let changes = compare(&current, &desired, false).unwrap();
        let planned = plan(&current, &desired, &changes, &Capabilities::default(), false).unwrap();
        assert_eq!(planned, changes);
    }

    #[test]
    fn test_unsupported_change_recreates_table_and_links() {
        let current = blog();
        let mut desired = blog();
        desired.tables[0].columns[1].required = true;

        let planned = plan_with(&current, &desired, &Dialect::Sqlite.capabilities()).unwrap();
        assert_eq!(
            summary(&planned),
            vec![
                "- post FOREIGN KEY (author_id) -> user(id)",
                "~ recreate user (1 changes)",
                "+ post FOREIGN KEY (author_id) -> user(id)",
            ]
        );

        let Change::RecreateTable { target, .. } = &planned[1] else {
            panic!("expected a recreation, got {}", planned[1]);
        };
        assert!(target.is_equivalent_to(&desired.tables[0], false));
    }

    #[test]
    fn test_partial_support_still_recreates_whole_table() {
        let current = blog();
        let mut desired = blog();
        desired.tables[0].columns[1].required = true;
        desired.tables[0]
            .indices
            .push(Index::non_unique("idx_user_email", ["email"]));

        let planned = plan_with(&current, &desired, &Capabilities::default()).unwrap();
        let recreate = planned
            .iter()
            .find(|c| matches!(c, Change::RecreateTable { .. }))
            .unwrap();
        let Change::RecreateTable {
            original_changes, ..
        } = recreate
        else {
            unreachable!()
        };
        assert_eq!(original_changes.len(), 2);
        assert!(!planned.iter().any(|c| matches!(c, Change::AddIndex { .. })));
    }

    #[test]
    fn test_primary_key_change_is_split_when_unsupported() {
        let current = blog();
        let mut desired = blog();
        desired.tables[0]
            .set_primary_key(&["id".to_string(), "email".to_string()], false)
            .unwrap();

        let planned = plan_with(&current, &desired, &Capabilities::default()).unwrap();
        assert_eq!(
            summary(&planned),
            vec![
                "- user PRIMARY KEY (id)",
                "+ user PRIMARY KEY (id, email)",
            ]
        );

        let planned = plan_with(&current, &desired, &Dialect::PostgreSql.capabilities()).unwrap();
        assert_eq!(summary(&planned), vec!["~ user PRIMARY KEY (id) -> (id, email)"]);
    }

    #[test]
    fn test_key_removals_run_before_key_additions_across_tables() {
        let current = blog();
        let mut desired = blog();
        desired.tables[0]
            .set_primary_key(&["email".to_string()], false)
            .unwrap();
        desired.tables[1].clear_primary_key();

        let planned = plan_with(&current, &desired, &Capabilities::default()).unwrap();
        let phases: Vec<Phase> = planned.iter().map(Change::phase).collect();
        let mut sorted = phases.clone();
        sorted.sort();
        assert_eq!(phases, sorted);
    }

    #[test]
    fn test_required_column_without_default_disables_data_copy() {
        let current = blog();
        let mut desired = blog();
        desired.tables[0]
            .columns
            .insert(1, Column::new("handle", SqlType::VarChar).with_size(20).required());

        let planned = plan_with(&current, &desired, &Capabilities::default()).unwrap();
        assert!(planned.iter().any(|c| matches!(
            c,
            Change::RecreateTable {
                migrate_data: false,
                ..
            }
        )));
    }

    fn with_code_in_key() -> Database {
        let mut desired = blog();
        desired.tables[0].columns.push(Column::new("code", SqlType::Integer));
        desired.tables[0]
            .set_primary_key(&["id".to_string(), "code".to_string()], false)
            .unwrap();
        desired
    }

    #[test]
    fn test_new_key_column_disables_data_copy() {
        let current = blog();
        let desired = with_code_in_key();

        let planned = plan_with(&current, &desired, &Capabilities::default()).unwrap();
        assert_eq!(
            summary(&planned),
            vec![
                "- post FOREIGN KEY (author_id) -> user(id)",
                "~ recreate user (2 changes, data dropped)",
                "+ post FOREIGN KEY (author_id) -> user(id)",
            ]
        );
        assert!(matches!(
            &planned[1],
            Change::RecreateTable {
                migrate_data: false,
                ..
            }
        ));

        // Column placement is fine, the missing key support forces recreation
        let no_keys = Capabilities {
            add_required_column_without_default: true,
            add_primary_key: false,
            ..Default::default()
        };
        let planned = plan_with(&current, &desired, &no_keys).unwrap();
        assert!(planned.iter().any(|c| matches!(
            c,
            Change::RecreateTable {
                migrate_data: false,
                ..
            }
        )));
    }

    #[test]
    fn test_new_auto_increment_key_column_is_added_in_place() {
        let current = blog();
        let mut desired = with_code_in_key();
        desired.tables[0].columns[2].auto_increment = true;

        let planned = plan_with(&current, &desired, &Dialect::PostgreSql.capabilities()).unwrap();
        assert_eq!(
            summary(&planned),
            vec![
                "+ user.code INTEGER NOT NULL AUTO INCREMENT",
                "~ user PRIMARY KEY (id) -> (id, code)",
            ]
        );
    }

    #[test]
    fn test_recreation_target_uses_live_table_spelling() {
        let current = blog();
        let mut desired = blog();
        desired.tables[0].name = "USER".to_string();
        desired.tables[1].foreign_keys[0].foreign_table = "USER".to_string();
        desired.tables[1].columns[1].required = true;

        let planned = plan_with(&current, &desired, &Capabilities::default()).unwrap();
        let Some(Change::RecreateTable { target, .. }) = planned
            .iter()
            .find(|c| matches!(c, Change::RecreateTable { .. }))
        else {
            panic!("expected a recreation in {:?}", summary(&planned));
        };
        assert_eq!(target.name, "post");
        assert_eq!(target.foreign_keys[0].foreign_table, "user");
    }

    #[test]
    fn test_rejecting_recreation_is_an_error() {
        let current = blog();
        let mut desired = blog();
        desired.tables[0].columns[1].required = true;

        let reject_all = |_: &Table, _: &Change| false;
        let err = plan_with(&current, &desired, &reject_all).unwrap_err();
        assert!(matches!(err, Error::Unrepresentable { ref table, .. } if table == "user"));
        assert_eq!(
            err.to_string(),
            "changes to table 'user' cannot be applied, not even by recreating it: ~ user.email: nullable -> not null"
        );
    }
}
