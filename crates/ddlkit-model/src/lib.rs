//! Platform-neutral relational schema model.
//!
//! A [`Database`] is an ordered list of [`Table`]s; tables own their
//! [`Column`]s, [`Index`]es and [`ForeignKey`]s. Foreign keys point at other
//! tables *by name*, never by reference, so cyclic relationships are plain
//! data and removing or replacing a table is a vector operation.
//!
//! Lookups take a `case_sensitive` flag and return `None` when nothing
//! matches; mutations return a [`ModelError`] when they would break
//! referential consistency.

use facet::Facet;
use std::fmt;

mod database;
mod error;
mod table;
mod value;

pub use database::Database;
pub use error::ModelError;
pub use table::Table;
pub use value::{ConversionError, TypedValue, parse_value, same_default};

/// Compare two identifiers under the given case-sensitivity mode.
pub fn names_equal(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a.eq_ignore_ascii_case(b)
    }
}

/// Semantic SQL type codes, mirroring the standard JDBC type set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Facet)]
#[repr(u8)]
pub enum SqlType {
    Array,
    BigInt,
    Binary,
    Bit,
    Blob,
    Boolean,
    Char,
    Clob,
    Date,
    Decimal,
    Double,
    Float,
    Integer,
    LongVarBinary,
    LongVarChar,
    Numeric,
    Other,
    Real,
    SmallInt,
    Time,
    Timestamp,
    TinyInt,
    VarBinary,
    VarChar,
}

impl SqlType {
    /// Whether a size (length or precision) is part of the type definition.
    pub fn has_size(&self) -> bool {
        matches!(
            self,
            SqlType::Char
                | SqlType::VarChar
                | SqlType::Binary
                | SqlType::VarBinary
                | SqlType::Decimal
                | SqlType::Numeric
        )
    }

    /// Whether a scale is part of the type definition.
    pub fn has_scale(&self) -> bool {
        matches!(self, SqlType::Decimal | SqlType::Numeric)
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            SqlType::TinyInt | SqlType::SmallInt | SqlType::Integer | SqlType::BigInt
        )
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SqlType::Array => "ARRAY",
            SqlType::BigInt => "BIGINT",
            SqlType::Binary => "BINARY",
            SqlType::Bit => "BIT",
            SqlType::Blob => "BLOB",
            SqlType::Boolean => "BOOLEAN",
            SqlType::Char => "CHAR",
            SqlType::Clob => "CLOB",
            SqlType::Date => "DATE",
            SqlType::Decimal => "DECIMAL",
            SqlType::Double => "DOUBLE",
            SqlType::Float => "FLOAT",
            SqlType::Integer => "INTEGER",
            SqlType::LongVarBinary => "LONGVARBINARY",
            SqlType::LongVarChar => "LONGVARCHAR",
            SqlType::Numeric => "NUMERIC",
            SqlType::Other => "OTHER",
            SqlType::Real => "REAL",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Time => "TIME",
            SqlType::Timestamp => "TIMESTAMP",
            SqlType::TinyInt => "TINYINT",
            SqlType::VarBinary => "VARBINARY",
            SqlType::VarChar => "VARCHAR",
        };
        write!(f, "{}", name)
    }
}

impl std::str::FromStr for SqlType {
    type Err = String;

    /// Parse a JDBC type name, case-insensitively, with a few common aliases.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let ty = match s.trim().to_ascii_uppercase().as_str() {
            "ARRAY" => SqlType::Array,
            "BIGINT" => SqlType::BigInt,
            "BINARY" => SqlType::Binary,
            "BIT" => SqlType::Bit,
            "BLOB" => SqlType::Blob,
            "BOOLEAN" | "BOOL" => SqlType::Boolean,
            "CHAR" | "CHARACTER" => SqlType::Char,
            "CLOB" => SqlType::Clob,
            "DATE" => SqlType::Date,
            "DECIMAL" => SqlType::Decimal,
            "DOUBLE" | "DOUBLE PRECISION" => SqlType::Double,
            "FLOAT" => SqlType::Float,
            "INTEGER" | "INT" => SqlType::Integer,
            "LONGVARBINARY" => SqlType::LongVarBinary,
            "LONGVARCHAR" => SqlType::LongVarChar,
            "NUMERIC" => SqlType::Numeric,
            "OTHER" => SqlType::Other,
            "REAL" => SqlType::Real,
            "SMALLINT" => SqlType::SmallInt,
            "TIME" => SqlType::Time,
            "TIMESTAMP" => SqlType::Timestamp,
            "TINYINT" => SqlType::TinyInt,
            "VARBINARY" => SqlType::VarBinary,
            "VARCHAR" => SqlType::VarChar,
            other => return Err(format!("unknown SQL type '{}'", other)),
        };
        Ok(ty)
    }
}

/// The type-defining part of a column: type code, native name, size, scale.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct ColumnType {
    pub sql_type: SqlType,
    /// Platform-native type name, when the model was read from a live database
    pub native_type: Option<String>,
    pub size: Option<u32>,
    pub scale: Option<u32>,
}

impl ColumnType {
    /// Whether switching from `self` to `other` changes the column's storage.
    ///
    /// Size only counts for sized types and scale only for decimal types, so
    /// an `INTEGER` reported with a display width still equals a bare `INTEGER`.
    /// The native type name is informational and never compared.
    pub fn differs_from(&self, other: &ColumnType) -> bool {
        if self.sql_type != other.sql_type {
            return true;
        }
        if self.sql_type.has_size() && self.size != other.size {
            return true;
        }
        self.sql_type.has_scale() && self.scale.unwrap_or(0) != other.scale.unwrap_or(0)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.sql_type)?;
        match (self.size, self.scale) {
            (Some(size), Some(scale)) if self.sql_type.has_scale() => {
                write!(f, "({},{})", size, scale)
            }
            (Some(size), _) if self.sql_type.has_size() => write!(f, "({})", size),
            _ => Ok(()),
        }
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Facet)]
pub struct Column {
    pub name: String,
    pub sql_type: SqlType,
    /// Platform-native type name (e.g. `int4`), if known
    pub native_type: Option<String>,
    /// Length or precision
    pub size: Option<u32>,
    pub scale: Option<u32>,
    /// NOT NULL
    pub required: bool,
    pub primary_key: bool,
    pub auto_increment: bool,
    /// Default value in its textual form; see [`Column::typed_default`]
    pub default_value: Option<String>,
    pub description: Option<String>,
}

impl Column {
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            native_type: None,
            size: None,
            scale: None,
            required: false,
            primary_key: false,
            auto_increment: false,
            default_value: None,
            description: None,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = Some(scale);
        self
    }

    pub fn with_native_type(mut self, native_type: impl Into<String>) -> Self {
        self.native_type = Some(native_type.into());
        self
    }

    pub fn with_default(mut self, default_value: impl Into<String>) -> Self {
        self.default_value = Some(default_value.into());
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Effective nullability: key and auto-increment columns are never nullable.
    pub fn is_required(&self) -> bool {
        self.required || self.primary_key || self.auto_increment
    }

    pub fn column_type(&self) -> ColumnType {
        ColumnType {
            sql_type: self.sql_type,
            native_type: self.native_type.clone(),
            size: self.size,
            scale: self.scale,
        }
    }

    pub fn set_column_type(&mut self, ty: &ColumnType) {
        self.sql_type = ty.sql_type;
        self.native_type = ty.native_type.clone();
        self.size = ty.size;
        self.scale = ty.scale;
    }

    /// Parse the textual default into a value of the column's type.
    ///
    /// Parsing happens on every call; the text stays the source of truth.
    pub fn typed_default(&self) -> Result<Option<TypedValue>, ConversionError> {
        self.default_value
            .as_deref()
            .map(|text| parse_value(self.sql_type, text))
            .transpose()
    }

    /// Whether a row can be inserted without naming this column.
    pub fn can_be_omitted(&self) -> bool {
        !self.is_required() || self.default_value.is_some() || self.auto_increment
    }
}

/// A column reference inside an index.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct IndexColumn {
    pub name: String,
    /// Prefix length for prefix indexes
    pub size: Option<u32>,
}

impl IndexColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size: None,
        }
    }

    pub fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }
}

/// A table index, unique or not.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Index {
    pub name: String,
    pub unique: bool,
    pub columns: Vec<IndexColumn>,
}

impl Index {
    pub fn new<S: Into<String>>(
        name: impl Into<String>,
        unique: bool,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name: name.into(),
            unique,
            columns: columns.into_iter().map(IndexColumn::new).collect(),
        }
    }

    pub fn unique<S: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(name, true, columns)
    }

    pub fn non_unique<S: Into<String>>(
        name: impl Into<String>,
        columns: impl IntoIterator<Item = S>,
    ) -> Self {
        Self::new(name, false, columns)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, column: &str, case_sensitive: bool) -> bool {
        self.columns
            .iter()
            .any(|c| names_equal(&c.name, column, case_sensitive))
    }

    /// Same uniqueness and same ordered column list; the name is ignored
    /// because generated index names rarely survive a round trip.
    pub fn is_equivalent_to(&self, other: &Index, case_sensitive: bool) -> bool {
        self.unique == other.unique
            && self.columns.len() == other.columns.len()
            && self
                .columns
                .iter()
                .zip(&other.columns)
                .all(|(a, b)| names_equal(&a.name, &b.name, case_sensitive) && a.size == b.size)
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let unique = if self.unique { "UNIQUE " } else { "" };
        write!(
            f,
            "{}INDEX {} ({})",
            unique,
            self.name,
            self.column_names().join(", ")
        )
    }
}

/// One (local column, foreign column) pair of a foreign key.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct Reference {
    pub local: String,
    pub foreign: String,
}

/// A foreign key from the owning table to `foreign_table`.
#[derive(Debug, Clone, PartialEq, Eq, Facet)]
pub struct ForeignKey {
    /// Constraint name; synthesized by [`ForeignKey::effective_name`] when absent
    pub name: Option<String>,
    pub foreign_table: String,
    pub references: Vec<Reference>,
}

impl ForeignKey {
    pub fn new(foreign_table: impl Into<String>) -> Self {
        Self {
            name: None,
            foreign_table: foreign_table.into(),
            references: Vec::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn reference(mut self, local: impl Into<String>, foreign: impl Into<String>) -> Self {
        self.references.push(Reference {
            local: local.into(),
            foreign: foreign.into(),
        });
        self
    }

    pub fn local_columns(&self) -> Vec<&str> {
        self.references.iter().map(|r| r.local.as_str()).collect()
    }

    pub fn foreign_columns(&self) -> Vec<&str> {
        self.references.iter().map(|r| r.foreign.as_str()).collect()
    }

    pub fn references_table(&self, table: &str, case_sensitive: bool) -> bool {
        names_equal(&self.foreign_table, table, case_sensitive)
    }

    pub fn uses_local_column(&self, column: &str, case_sensitive: bool) -> bool {
        self.references
            .iter()
            .any(|r| names_equal(&r.local, column, case_sensitive))
    }

    pub fn uses_foreign_column(&self, column: &str, case_sensitive: bool) -> bool {
        self.references
            .iter()
            .any(|r| names_equal(&r.foreign, column, case_sensitive))
    }

    /// Same target table and same ordered reference pairs; the name is ignored.
    pub fn is_equivalent_to(&self, other: &ForeignKey, case_sensitive: bool) -> bool {
        self.references_table(&other.foreign_table, case_sensitive)
            && self.references.len() == other.references.len()
            && self.references.iter().zip(&other.references).all(|(a, b)| {
                names_equal(&a.local, &b.local, case_sensitive)
                    && names_equal(&a.foreign, &b.foreign, case_sensitive)
            })
    }

    /// The constraint name, or a deterministic one derived from the owning
    /// table and local columns.
    pub fn effective_name(&self, table: &str) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => ddlkit_sql::foreign_key_name(table, &self.local_columns()),
        }
    }
}

impl fmt::Display for ForeignKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}) -> {}({})",
            self.local_columns().join(", "),
            self.foreign_table,
            self.foreign_columns().join(", ")
        )
    }
}
