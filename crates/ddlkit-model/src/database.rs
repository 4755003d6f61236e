use crate::{ForeignKey, ModelError, Table, names_equal};
use facet::Facet;

/// A named, ordered collection of tables.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct Database {
    pub name: String,
    pub tables: Vec<Table>,
}

impl Database {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tables: Vec::new(),
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn find_table(&self, name: &str, case_sensitive: bool) -> Option<&Table> {
        self.tables
            .iter()
            .find(|t| names_equal(&t.name, name, case_sensitive))
    }

    pub fn find_table_mut(&mut self, name: &str, case_sensitive: bool) -> Option<&mut Table> {
        self.tables
            .iter_mut()
            .find(|t| names_equal(&t.name, name, case_sensitive))
    }

    pub fn table_position(&self, name: &str, case_sensitive: bool) -> Option<usize> {
        self.tables
            .iter()
            .position(|t| names_equal(&t.name, name, case_sensitive))
    }

    /// Like [`Database::find_table_mut`], but absence is an error.
    pub fn table_mut(&mut self, name: &str, case_sensitive: bool) -> Result<&mut Table, ModelError> {
        self.find_table_mut(name, case_sensitive)
            .ok_or_else(|| ModelError::TableNotFound {
                table: name.to_string(),
            })
    }

    pub fn add_table(&mut self, table: Table, case_sensitive: bool) -> Result<(), ModelError> {
        if self.find_table(&table.name, case_sensitive).is_some() {
            return Err(ModelError::DuplicateTable { table: table.name });
        }
        self.tables.push(table);
        Ok(())
    }

    pub fn remove_table(&mut self, name: &str, case_sensitive: bool) -> Result<Table, ModelError> {
        let mut removed = self.remove_tables(&[name], case_sensitive)?;
        removed.pop().ok_or_else(|| ModelError::TableNotFound {
            table: name.to_string(),
        })
    }

    /// Remove a set of tables at once.
    ///
    /// Foreign keys between tables of the set are fine. Any foreign key
    /// crossing the boundary of the set, in either direction, is an error;
    /// every such key is reported, and the model is left untouched.
    pub fn remove_tables(
        &mut self,
        names: &[&str],
        case_sensitive: bool,
    ) -> Result<Vec<Table>, ModelError> {
        for name in names {
            if self.find_table(name, case_sensitive).is_none() {
                return Err(ModelError::TableNotFound {
                    table: name.to_string(),
                });
            }
        }

        let in_set = |table: &str| names.iter().any(|n| names_equal(n, table, case_sensitive));

        for name in names {
            let crossing: Vec<String> = self
                .foreign_keys_to_and_from(name, case_sensitive)
                .into_iter()
                .filter(|(owner, fk)| !(in_set(owner) && in_set(&fk.foreign_table)))
                .map(|(owner, fk)| format!("{}{}", owner, fk))
                .collect();
            if !crossing.is_empty() {
                return Err(ModelError::ForeignKeysPresent {
                    table: name.to_string(),
                    foreign_keys: crossing,
                });
            }
        }

        let (removed, kept) = std::mem::take(&mut self.tables)
            .into_iter()
            .partition(|t| in_set(&t.name));
        self.tables = kept;
        Ok(removed)
    }

    /// Foreign keys of other tables pointing at `table`, with their owners.
    pub fn referencing_foreign_keys(
        &self,
        table: &str,
        case_sensitive: bool,
    ) -> Vec<(String, ForeignKey)> {
        self.tables
            .iter()
            .filter(|t| !names_equal(&t.name, table, case_sensitive))
            .flat_map(|t| {
                t.foreign_keys
                    .iter()
                    .filter(|fk| fk.references_table(table, case_sensitive))
                    .map(|fk| (t.name.clone(), fk.clone()))
            })
            .collect()
    }

    /// Every foreign key owned by `table` plus every foreign key pointing at
    /// it, each paired with the name of its owning table.
    pub fn foreign_keys_to_and_from(
        &self,
        table: &str,
        case_sensitive: bool,
    ) -> Vec<(String, ForeignKey)> {
        let mut found: Vec<(String, ForeignKey)> = self
            .find_table(table, case_sensitive)
            .map(|t| {
                t.foreign_keys
                    .iter()
                    .map(|fk| (t.name.clone(), fk.clone()))
                    .collect()
            })
            .unwrap_or_default();
        found.extend(self.referencing_foreign_keys(table, case_sensitive));
        found
    }

    /// Drop every foreign key from or to any of `tables`.
    ///
    /// All keys are collected before any is removed. Returns the removed
    /// keys with their owning table names, in model order.
    pub fn remove_foreign_keys_to_and_from(
        &mut self,
        tables: &[&str],
        case_sensitive: bool,
    ) -> Vec<(String, ForeignKey)> {
        let touches = |name: &str| tables.iter().any(|t| names_equal(t, name, case_sensitive));

        let mut removed = Vec::new();
        for table in &mut self.tables {
            let owner_touched = touches(&table.name);
            let (dropped, kept): (Vec<ForeignKey>, Vec<ForeignKey>) =
                std::mem::take(&mut table.foreign_keys)
                    .into_iter()
                    .partition(|fk| owner_touched || touches(&fk.foreign_table));
            table.foreign_keys = kept;
            removed.extend(dropped.into_iter().map(|fk| (table.name.clone(), fk)));
        }
        removed
    }

    /// Check every table, table name uniqueness, and that each foreign key
    /// targets an existing table and existing columns with a matching
    /// reference count.
    pub fn validate(&self, case_sensitive: bool) -> Result<(), ModelError> {
        for (i, table) in self.tables.iter().enumerate() {
            if self.tables[..i]
                .iter()
                .any(|t| names_equal(&t.name, &table.name, case_sensitive))
            {
                return Err(ModelError::DuplicateTable {
                    table: table.name.clone(),
                });
            }
            table.validate(case_sensitive)?;

            for fk in &table.foreign_keys {
                self.check_foreign_target(table, fk, case_sensitive)?;
            }
        }
        Ok(())
    }

    /// The foreign side of `fk`, owned by `owner`, must exist in this model.
    pub fn check_foreign_target(
        &self,
        owner: &Table,
        fk: &ForeignKey,
        case_sensitive: bool,
    ) -> Result<(), ModelError> {
        let invalid = |reason: String| ModelError::InvalidForeignKey {
            table: owner.name.clone(),
            foreign_key: fk.to_string(),
            reason,
        };
        let target = if fk.references_table(&owner.name, case_sensitive) {
            owner
        } else {
            self.find_table(&fk.foreign_table, case_sensitive)
                .ok_or_else(|| invalid(format!("table '{}' does not exist", fk.foreign_table)))?
        };
        if let Some(missing) = fk
            .references
            .iter()
            .find(|r| target.find_column(&r.foreign, case_sensitive).is_none())
        {
            return Err(invalid(format!(
                "foreign column '{}.{}' does not exist",
                target.name, missing.foreign
            )));
        }
        Ok(())
    }

    /// Same set of tables, each structurally equivalent to its namesake.
    ///
    /// Table order is not compared: added tables land at the end of a model.
    pub fn is_equivalent_to(&self, other: &Database, case_sensitive: bool) -> bool {
        self.tables.len() == other.tables.len()
            && self.tables.iter().all(|a| {
                other
                    .find_table(&a.name, case_sensitive)
                    .is_some_and(|b| a.is_equivalent_to(b, case_sensitive))
            })
    }
}
