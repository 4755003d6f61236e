//! Schema diffing and dialect-aware migration planning.
//!
//! This crate provides:
//! - A change vocabulary over the [`ddlkit_model`] schema model
//! - A comparator that derives an ordered change list from two models
//! - A planner that rewrites that list for what a dialect can do in place,
//!   falling back to rebuilding whole tables
//! - A DDL renderer for PostgreSQL, MySQL, SQLite and generic SQL
//!
//! # Example
//!
//! ```
//! use ddlkit::{Column, Database, Dialect, Platform, SqlType, Table};
//!
//! let current = Database::new("app").with_table(
//!     Table::new("user").with_column(Column::new("id", SqlType::Integer).primary_key()),
//! );
//! let mut desired = current.clone();
//! desired.tables[0]
//!     .columns
//!     .push(Column::new("email", SqlType::VarChar).with_size(255));
//!
//! let platform = Platform::new(Dialect::PostgreSql);
//! let migration = platform.migration(&current, &desired)?;
//! assert_eq!(
//!     platform.render(&migration)?,
//!     vec![r#"ALTER TABLE "user" ADD COLUMN "email" VARCHAR(255);"#]
//! );
//! # Ok::<(), ddlkit::Error>(())
//! ```
//!
//! # Case sensitivity
//!
//! Every operation takes a `case_sensitive` flag. When it is off, table,
//! column, index and key names match ASCII case-insensitively, and changes
//! spell names the way the model they apply to does.

mod change;
mod compare;
mod dialect;
mod error;
mod order;
mod plan;
mod platform;
mod render;

pub use change::{Change, Phase};
pub use compare::{ModelComparator, compare};
pub use dialect::{Capabilities, CapabilityPredicate, ColumnAddition, Dialect};
pub use error::{Error, Result};
pub use plan::plan;
pub use platform::{Migration, Platform};
pub use render::DdlRenderer;

pub use ddlkit_config::Config;
pub use ddlkit_model::{
    Column, ColumnType, ConversionError, Database, ForeignKey, Index, IndexColumn, ModelError,
    Reference, SqlType, Table, TypedValue,
};
