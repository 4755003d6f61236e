use crate::{Column, Database, ForeignKey, Index, ModelError, names_equal, same_default};
use facet::Facet;

/// A table: ordered columns plus its indexes and outgoing foreign keys.
///
/// The primary key is not stored separately; it is the sub-sequence of
/// columns flagged `primary_key`, in declaration order.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct Table {
    pub name: String,
    pub description: Option<String>,
    pub columns: Vec<Column>,
    pub indices: Vec<Index>,
    pub foreign_keys: Vec<ForeignKey>,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            columns: Vec::new(),
            indices: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn with_column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    pub fn with_index(mut self, index: Index) -> Self {
        self.indices.push(index);
        self
    }

    pub fn with_foreign_key(mut self, foreign_key: ForeignKey) -> Self {
        self.foreign_keys.push(foreign_key);
        self
    }

    // Lookups

    pub fn find_column(&self, name: &str, case_sensitive: bool) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| names_equal(&c.name, name, case_sensitive))
    }

    pub fn find_column_mut(&mut self, name: &str, case_sensitive: bool) -> Option<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| names_equal(&c.name, name, case_sensitive))
    }

    pub fn column_position(&self, name: &str, case_sensitive: bool) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| names_equal(&c.name, name, case_sensitive))
    }

    pub fn primary_key_names(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| c.name.clone())
            .collect()
    }

    pub fn has_primary_key(&self) -> bool {
        self.columns.iter().any(|c| c.primary_key)
    }

    pub fn find_index(&self, name: &str, case_sensitive: bool) -> Option<&Index> {
        self.indices
            .iter()
            .find(|i| names_equal(&i.name, name, case_sensitive))
    }

    pub fn find_equivalent_index(&self, index: &Index, case_sensitive: bool) -> Option<&Index> {
        self.indices
            .iter()
            .find(|i| i.is_equivalent_to(index, case_sensitive))
    }

    pub fn find_equivalent_foreign_key(
        &self,
        foreign_key: &ForeignKey,
        case_sensitive: bool,
    ) -> Option<&ForeignKey> {
        self.foreign_keys
            .iter()
            .find(|fk| fk.is_equivalent_to(foreign_key, case_sensitive))
    }

    // Mutations

    pub fn add_column(&mut self, column: Column, case_sensitive: bool) -> Result<(), ModelError> {
        self.insert_column(self.columns.len(), column, case_sensitive)
    }

    /// Insert a column at `position`, clamped to the end of the table.
    pub fn insert_column(
        &mut self,
        position: usize,
        column: Column,
        case_sensitive: bool,
    ) -> Result<(), ModelError> {
        if self.find_column(&column.name, case_sensitive).is_some() {
            return Err(ModelError::DuplicateColumn {
                table: self.name.clone(),
                column: column.name,
            });
        }
        let position = position.min(self.columns.len());
        self.columns.insert(position, column);
        Ok(())
    }

    /// Remove a column that no key, index or foreign key of this table uses.
    pub fn remove_column(&mut self, name: &str, case_sensitive: bool) -> Result<Column, ModelError> {
        let position =
            self.column_position(name, case_sensitive)
                .ok_or_else(|| ModelError::ColumnNotFound {
                    table: self.name.clone(),
                    column: name.to_string(),
                })?;
        let column = &self.columns[position];

        let used_by = if column.primary_key {
            Some("the primary key".to_string())
        } else if let Some(index) = self
            .indices
            .iter()
            .find(|i| i.has_column(name, case_sensitive))
        {
            Some(format!("index '{}'", index.name))
        } else {
            self.foreign_keys
                .iter()
                .find(|fk| {
                    fk.uses_local_column(name, case_sensitive)
                        || (fk.references_table(&self.name, case_sensitive)
                            && fk.uses_foreign_column(name, case_sensitive))
                })
                .map(|fk| format!("foreign key {}", fk))
        };

        if let Some(used_by) = used_by {
            return Err(ModelError::ColumnInUse {
                table: self.name.clone(),
                column: column.name.clone(),
                used_by,
            });
        }

        Ok(self.columns.remove(position))
    }

    pub fn add_index(&mut self, index: Index, case_sensitive: bool) -> Result<(), ModelError> {
        self.check_index(&index, case_sensitive)?;
        if self.find_index(&index.name, case_sensitive).is_some() {
            return Err(self.invalid_index(&index, "an index with this name already exists"));
        }
        self.indices.push(index);
        Ok(())
    }

    pub fn remove_index(&mut self, name: &str, case_sensitive: bool) -> Result<Index, ModelError> {
        let position = self
            .indices
            .iter()
            .position(|i| names_equal(&i.name, name, case_sensitive))
            .ok_or_else(|| ModelError::IndexNotFound {
                table: self.name.clone(),
                index: name.to_string(),
            })?;
        Ok(self.indices.remove(position))
    }

    /// Add an outgoing foreign key. Only the local side is checked here; the
    /// target table lives in the enclosing [`Database`].
    pub fn add_foreign_key(
        &mut self,
        foreign_key: ForeignKey,
        case_sensitive: bool,
    ) -> Result<(), ModelError> {
        self.check_foreign_key(&foreign_key, case_sensitive)?;
        self.foreign_keys.push(foreign_key);
        Ok(())
    }

    /// Remove the first foreign key equivalent to `foreign_key`.
    pub fn remove_foreign_key(
        &mut self,
        foreign_key: &ForeignKey,
        case_sensitive: bool,
    ) -> Result<ForeignKey, ModelError> {
        let position = self
            .foreign_keys
            .iter()
            .position(|fk| fk.is_equivalent_to(foreign_key, case_sensitive))
            .ok_or_else(|| ModelError::ForeignKeyNotFound {
                table: self.name.clone(),
                foreign_key: foreign_key.to_string(),
            })?;
        Ok(self.foreign_keys.remove(position))
    }

    /// Make exactly `columns` the primary key.
    ///
    /// Fails without touching the table if any column is missing.
    pub fn set_primary_key(
        &mut self,
        columns: &[String],
        case_sensitive: bool,
    ) -> Result<(), ModelError> {
        if let Some(missing) = columns
            .iter()
            .find(|name| self.find_column(name, case_sensitive).is_none())
        {
            return Err(ModelError::ColumnNotFound {
                table: self.name.clone(),
                column: missing.clone(),
            });
        }
        for column in &mut self.columns {
            column.primary_key = columns
                .iter()
                .any(|name| names_equal(&column.name, name, case_sensitive));
        }
        Ok(())
    }

    pub fn clear_primary_key(&mut self) {
        for column in &mut self.columns {
            column.primary_key = false;
        }
    }

    /// Check the table's own structure: unique column and index names,
    /// index and foreign key column references.
    pub fn validate(&self, case_sensitive: bool) -> Result<(), ModelError> {
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i]
                .iter()
                .any(|c| names_equal(&c.name, &column.name, case_sensitive))
            {
                return Err(ModelError::DuplicateColumn {
                    table: self.name.clone(),
                    column: column.name.clone(),
                });
            }
        }

        for (i, index) in self.indices.iter().enumerate() {
            self.check_index(index, case_sensitive)?;
            if self.indices[..i]
                .iter()
                .any(|other| names_equal(&other.name, &index.name, case_sensitive))
            {
                return Err(self.invalid_index(index, "duplicate index name"));
            }
        }

        for fk in &self.foreign_keys {
            self.check_foreign_key(fk, case_sensitive)?;
        }

        Ok(())
    }

    fn check_index(&self, index: &Index, case_sensitive: bool) -> Result<(), ModelError> {
        if index.columns.is_empty() {
            return Err(self.invalid_index(index, "an index needs at least one column"));
        }
        if let Some(missing) = index
            .columns
            .iter()
            .find(|c| self.find_column(&c.name, case_sensitive).is_none())
        {
            return Err(self.invalid_index(
                index,
                &format!("column '{}' does not exist", missing.name),
            ));
        }
        Ok(())
    }

    fn invalid_index(&self, index: &Index, reason: &str) -> ModelError {
        ModelError::InvalidIndex {
            table: self.name.clone(),
            index: index.name.clone(),
            reason: reason.to_string(),
        }
    }

    fn check_foreign_key(
        &self,
        foreign_key: &ForeignKey,
        case_sensitive: bool,
    ) -> Result<(), ModelError> {
        let invalid = |reason: String| ModelError::InvalidForeignKey {
            table: self.name.clone(),
            foreign_key: foreign_key.to_string(),
            reason,
        };
        if foreign_key.references.is_empty() {
            return Err(invalid("a foreign key needs at least one reference".to_string()));
        }
        if let Some(missing) = foreign_key
            .references
            .iter()
            .find(|r| self.find_column(&r.local, case_sensitive).is_none())
        {
            return Err(invalid(format!(
                "local column '{}' does not exist",
                missing.local
            )));
        }
        Ok(())
    }

    /// A copy of this table without its foreign keys.
    pub fn without_foreign_keys(&self) -> Table {
        Table {
            foreign_keys: Vec::new(),
            ..self.clone()
        }
    }

    /// A copy of this table for attaching to `model`.
    ///
    /// Foreign keys are re-resolved against `model`: their target name takes
    /// the spelling of the table found there, and keys whose target is
    /// missing are dropped. Self-references always resolve.
    pub fn clone_into(&self, model: &Database, case_sensitive: bool) -> Table {
        let foreign_keys = self
            .foreign_keys
            .iter()
            .filter_map(|fk| {
                if fk.references_table(&self.name, case_sensitive) {
                    return Some(ForeignKey {
                        foreign_table: self.name.clone(),
                        ..fk.clone()
                    });
                }
                let target = model.find_table(&fk.foreign_table, case_sensitive)?;
                Some(ForeignKey {
                    foreign_table: target.name.clone(),
                    ..fk.clone()
                })
            })
            .collect();

        Table {
            foreign_keys,
            ..self.clone()
        }
    }

    /// Structural equality: same columns in the same order with the same
    /// effective definition, and the same indexes and foreign keys up to
    /// naming.
    pub fn is_equivalent_to(&self, other: &Table, case_sensitive: bool) -> bool {
        if !names_equal(&self.name, &other.name, case_sensitive)
            || self.columns.len() != other.columns.len()
            || self.indices.len() != other.indices.len()
            || self.foreign_keys.len() != other.foreign_keys.len()
        {
            return false;
        }

        let columns_match = self.columns.iter().zip(&other.columns).all(|(a, b)| {
            names_equal(&a.name, &b.name, case_sensitive)
                && !a.column_type().differs_from(&b.column_type())
                && a.is_required() == b.is_required()
                && a.primary_key == b.primary_key
                && a.auto_increment == b.auto_increment
                && same_default(
                    a.sql_type,
                    a.default_value.as_deref(),
                    b.default_value.as_deref(),
                )
        });

        columns_match
            && self
                .indices
                .iter()
                .all(|i| other.find_equivalent_index(i, case_sensitive).is_some())
            && self
                .foreign_keys
                .iter()
                .all(|fk| other.find_equivalent_foreign_key(fk, case_sensitive).is_some())
    }
}
