//! One-stop entry point: a dialect, its capabilities and a naming mode.

use crate::{Capabilities, Change, DdlRenderer, Dialect, ModelComparator, Result, plan};
use ddlkit_config::Config;
use ddlkit_model::Database;
use std::path::{Path, PathBuf};

/// A target database platform.
#[derive(Debug, Clone)]
pub struct Platform {
    pub dialect: Dialect,
    pub capabilities: Capabilities,
    pub case_sensitive: bool,
}

impl Platform {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            capabilities: dialect.capabilities(),
            case_sensitive: false,
        }
    }

    /// Build a platform from configuration; missing settings take the
    /// generic dialect's defaults.
    pub fn from_config(config: &Config) -> Result<Self> {
        let dialect: Dialect = match &config.dialect {
            Some(name) => name.parse()?,
            None => Dialect::default(),
        };
        Ok(Self {
            dialect,
            capabilities: dialect
                .capabilities()
                .with_overrides(&config.capabilities)?,
            case_sensitive: config.case_sensitive.unwrap_or(false),
        })
    }

    /// Load `.config/ddlkit.styx` from `start` or a parent directory.
    pub fn discover(start: &Path) -> Result<(Self, PathBuf)> {
        let (config, path) = ddlkit_config::load_from(start)?;
        Ok((Self::from_config(&config)?, path))
    }

    /// The raw changes from `current` to `desired`, before planning.
    pub fn compare(&self, current: &Database, desired: &Database) -> Result<Vec<Change>> {
        ModelComparator::for_dialect(self.dialect, self.case_sensitive).compare(current, desired)
    }

    /// Compare and plan: the changes this platform can execute.
    pub fn migration(&self, current: &Database, desired: &Database) -> Result<Migration> {
        let current = self.dialect.strip_internal_indexes(current);
        let desired = self.dialect.strip_internal_indexes(desired);
        let changes = self.compare(&current, &desired)?;
        let changes = plan(
            &current,
            &desired,
            &changes,
            &self.capabilities,
            self.case_sensitive,
        )?;
        Ok(Migration { current, changes })
    }

    pub fn renderer(&self) -> DdlRenderer {
        DdlRenderer::new(self.dialect).case_sensitive(self.case_sensitive)
    }

    /// SQL statements for a migration.
    pub fn render(&self, migration: &Migration) -> Result<Vec<String>> {
        self.renderer().render(&migration.current, &migration.changes)
    }
}

/// A planned migration.
#[derive(Debug, Clone)]
pub struct Migration {
    /// The model the changes apply to, without dialect-internal indexes
    pub current: Database,
    pub changes: Vec<Change>,
}

impl Migration {
    /// Returns true if there are no differences.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Names of the tables the migration rebuilds.
    pub fn recreated_tables(&self) -> Vec<&str> {
        self.changes
            .iter()
            .filter(|c| matches!(c, Change::RecreateTable { .. }))
            .map(Change::table_name)
            .collect()
    }
}

impl std::fmt::Display for Migration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            writeln!(f, "No changes detected.")?;
        } else {
            writeln!(f, "Changes detected:\n")?;
            for change in &self.changes {
                writeln!(f, "  {}", change)?;
                if let Change::RecreateTable {
                    original_changes, ..
                } = change
                {
                    for original in original_changes {
                        writeln!(f, "    {}", original)?;
                    }
                }
            }
        }
        Ok(())
    }
}
