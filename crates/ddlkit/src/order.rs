//! Foreign key dependency ordering between tables.

use ddlkit_model::{Table, names_equal};
use tracing::debug;

/// Order `tables` so that each one comes after the tables it references.
///
/// References to tables outside the slice and self-references are ignored.
/// When only tables caught in a reference cycle remain, the first declared
/// one is placed anyway and ordering resumes from there.
pub(crate) fn creation_order<'a>(tables: &[&'a Table], case_sensitive: bool) -> Vec<&'a Table> {
    let in_set = |name: &str| {
        tables
            .iter()
            .any(|t| names_equal(&t.name, name, case_sensitive))
    };

    let mut placed: Vec<&'a Table> = Vec::with_capacity(tables.len());
    let mut pending: Vec<&'a Table> = tables.to_vec();

    while !pending.is_empty() {
        let before = pending.len();

        pending.retain(|table| {
            let ready = table.foreign_keys.iter().all(|fk| {
                fk.references_table(&table.name, case_sensitive)
                    || !in_set(&fk.foreign_table)
                    || placed
                        .iter()
                        .any(|p| names_equal(&p.name, &fk.foreign_table, case_sensitive))
            });
            if ready {
                placed.push(*table);
            }
            !ready
        });

        if pending.len() == before {
            // Break the cycle at the first declared table
            let cycle: Vec<&str> = pending.iter().map(|t| t.name.as_str()).collect();
            debug!(tables = ?cycle, "foreign key cycle, keeping declaration order");
            placed.push(pending.remove(0));
        }
    }

    placed
}

/// Order `tables` so that each one comes before the tables it references.
pub(crate) fn removal_order<'a>(tables: &[&'a Table], case_sensitive: bool) -> Vec<&'a Table> {
    let mut order = creation_order(tables, case_sensitive);
    order.reverse();
    order
}
