//! DDL rendering.
//!
//! Turns a planned change list into SQL statements for one [`Dialect`].
//! Rendering replays the changes against a copy of the current model so
//! each statement can see the full definition of the columns and tables it
//! touches. A change the dialect has no in-place syntax for is an
//! [`Error::UnsupportedChange`]; plan with the dialect's capabilities first
//! and those turn into table recreations instead.

use crate::{Change, Dialect, Error, Result};
use ddlkit_model::{Column, Database, ForeignKey, Index, ModelError, SqlType, Table, TypedValue};
use ddlkit_sql::{Lit, quote_ident};

/// Renders changes as SQL for one dialect.
#[derive(Debug, Clone, Copy)]
pub struct DdlRenderer {
    dialect: Dialect,
    case_sensitive: bool,
}

impl DdlRenderer {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            case_sensitive: false,
        }
    }

    pub fn case_sensitive(mut self, case_sensitive: bool) -> Self {
        self.case_sensitive = case_sensitive;
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Render `changes`, which must apply to `current` in order.
    ///
    /// Each statement ends with `;`. A change may render to several
    /// statements or, for foreign keys SQLite keeps inline, to none.
    pub fn render(&self, current: &Database, changes: &[Change]) -> Result<Vec<String>> {
        let mut before = current.clone();
        let mut statements = Vec::new();
        for (i, change) in changes.iter().enumerate() {
            let mut after = before.clone();
            change.apply(&mut after, self.case_sensitive)?;
            statements.extend(self.render_change(&before, &after, changes, i)?);
            before = after;
        }
        Ok(statements)
    }

    /// Render `changes` as one script, a statement per line.
    pub fn render_script(&self, current: &Database, changes: &[Change]) -> Result<String> {
        Ok(self.render(current, changes)?.join("\n"))
    }

    fn render_change(
        &self,
        before: &Database,
        after: &Database,
        changes: &[Change],
        i: usize,
    ) -> Result<Vec<String>> {
        let change = &changes[i];
        let d = self.dialect;
        let t = self.q(change.table_name());

        let sql = match change {
            Change::AddTable { table } => {
                let inline: &[ForeignKey] = if d == Dialect::Sqlite {
                    table.foreign_keys.as_slice()
                } else {
                    &[]
                };
                let mut sql = vec![self.create_table(&table.name, table, inline)?];
                sql.extend(table.indices.iter().map(|i| self.create_index(&table.name, i)));
                sql
            }
            Change::RemoveTable { table } => vec![format!("DROP TABLE {};", self.q(table))],
            Change::RecreateTable {
                table,
                target,
                migrate_data,
                ..
            } => {
                let old = self.table(before, table)?;
                self.recreate_table(old, target, *migrate_data, changes, i)?
            }
            Change::AddColumn { column, .. } => {
                let old = self.table(before, change.table_name())?;
                let position = change.insert_position(old, self.case_sensitive);
                let placement = if position == old.columns.len() {
                    String::new()
                } else if d == Dialect::MySql {
                    match position.checked_sub(1) {
                        Some(prev) => format!(" AFTER {}", self.q(&old.columns[prev].name)),
                        None => " FIRST".to_string(),
                    }
                } else {
                    return Err(self.unsupported(change));
                };
                vec![format!(
                    "ALTER TABLE {} ADD COLUMN {}{};",
                    t,
                    self.column_definition(column, false)?,
                    placement
                )]
            }
            Change::RemoveColumn { column, .. } => {
                vec![format!("ALTER TABLE {} DROP COLUMN {};", t, self.q(column))]
            }
            Change::ReorderColumns { .. } => return Err(self.unsupported(change)),
            Change::AlterColumnType { column, .. } => match d {
                Dialect::PostgreSql => {
                    let ty = self.column_type(self.column(after, change, column)?);
                    vec![format!(
                        "ALTER TABLE {} ALTER COLUMN {} TYPE {} USING {}::{};",
                        t,
                        self.q(column),
                        ty,
                        self.q(column),
                        ty
                    )]
                }
                Dialect::MySql => vec![self.modify_column(after, change, column)?],
                Dialect::Generic => vec![format!(
                    "ALTER TABLE {} ALTER COLUMN {} SET DATA TYPE {};",
                    t,
                    self.q(column),
                    self.column_type(self.column(after, change, column)?)
                )],
                Dialect::Sqlite => return Err(self.unsupported(change)),
            },
            Change::AlterColumnAutoIncrement {
                column,
                auto_increment,
                ..
            } => match d {
                Dialect::PostgreSql if *auto_increment => vec![format!(
                    "ALTER TABLE {} ALTER COLUMN {} ADD GENERATED BY DEFAULT AS IDENTITY;",
                    t,
                    self.q(column)
                )],
                Dialect::PostgreSql => vec![format!(
                    "ALTER TABLE {} ALTER COLUMN {} DROP IDENTITY;",
                    t,
                    self.q(column)
                )],
                Dialect::MySql => vec![self.modify_column(after, change, column)?],
                Dialect::Generic | Dialect::Sqlite => return Err(self.unsupported(change)),
            },
            Change::AlterColumnDefault { column, .. } => {
                if d == Dialect::Sqlite {
                    return Err(self.unsupported(change));
                }
                match self.default_literal(self.column(after, change, column)?)? {
                    Some(default) => vec![format!(
                        "ALTER TABLE {} ALTER COLUMN {} SET DEFAULT {};",
                        t,
                        self.q(column),
                        default
                    )],
                    None => vec![format!(
                        "ALTER TABLE {} ALTER COLUMN {} DROP DEFAULT;",
                        t,
                        self.q(column)
                    )],
                }
            }
            Change::AlterColumnRequired {
                column, required, ..
            } => match d {
                Dialect::PostgreSql | Dialect::Generic => {
                    let action = if *required { "SET" } else { "DROP" };
                    vec![format!(
                        "ALTER TABLE {} ALTER COLUMN {} {} NOT NULL;",
                        t,
                        self.q(column),
                        action
                    )]
                }
                Dialect::MySql => vec![self.modify_column(after, change, column)?],
                Dialect::Sqlite => return Err(self.unsupported(change)),
            },
            Change::AddPrimaryKey { columns, .. } => {
                if d == Dialect::Sqlite {
                    return Err(self.unsupported(change));
                }
                vec![format!(
                    "ALTER TABLE {} ADD PRIMARY KEY ({});",
                    t,
                    self.q_list(columns)
                )]
            }
            Change::RemovePrimaryKey { table, .. } => match d {
                Dialect::Sqlite => return Err(self.unsupported(change)),
                _ => vec![format!("ALTER TABLE {} {};", t, self.drop_primary_key(table))],
            },
            Change::ChangePrimaryKey {
                table, new_columns, ..
            } => match d {
                Dialect::Sqlite => return Err(self.unsupported(change)),
                Dialect::MySql => vec![format!(
                    "ALTER TABLE {} DROP PRIMARY KEY, ADD PRIMARY KEY ({});",
                    t,
                    self.q_list(new_columns)
                )],
                Dialect::PostgreSql | Dialect::Generic => vec![
                    format!("ALTER TABLE {} {};", t, self.drop_primary_key(table)),
                    format!(
                        "ALTER TABLE {} ADD PRIMARY KEY ({});",
                        t,
                        self.q_list(new_columns)
                    ),
                ],
            },
            Change::AddIndex { table, index } => vec![self.create_index(table, index)],
            Change::RemoveIndex { table, index } => vec![self.drop_index(table, index)],
            Change::AddForeignKey { table, foreign_key } => {
                if d == Dialect::Sqlite {
                    if self.sqlite_keeps_foreign_key(change, changes, i) {
                        return Ok(Vec::new());
                    }
                    return Err(self.unsupported(change));
                }
                vec![format!(
                    "ALTER TABLE {} ADD {};",
                    t,
                    self.foreign_key_constraint(table, foreign_key)
                )]
            }
            Change::RemoveForeignKey { table, foreign_key } => {
                let name = self.q(&foreign_key.effective_name(table));
                match d {
                    Dialect::Sqlite if self.sqlite_keeps_foreign_key(change, changes, i) => {
                        return Ok(Vec::new());
                    }
                    Dialect::Sqlite => return Err(self.unsupported(change)),
                    Dialect::MySql => {
                        vec![format!("ALTER TABLE {} DROP FOREIGN KEY {};", t, name)]
                    }
                    Dialect::PostgreSql | Dialect::Generic => {
                        vec![format!("ALTER TABLE {} DROP CONSTRAINT {};", t, name)]
                    }
                }
            }
        };
        Ok(sql)
    }

    /// Statements replacing `old` by `target`.
    fn recreate_table(
        &self,
        old: &Table,
        target: &Table,
        migrate_data: bool,
        changes: &[Change],
        i: usize,
    ) -> Result<Vec<String>> {
        let cs = self.case_sensitive;
        let (insert_columns, select_columns): (Vec<&str>, Vec<&str>) = target
            .columns
            .iter()
            .filter_map(|c| {
                old.find_column(&c.name, cs)
                    .map(|o| (c.name.as_str(), o.name.as_str()))
            })
            .unzip();
        let copy = |into: &str, from: &str| {
            format!(
                "INSERT INTO {} ({}) SELECT {} FROM {};",
                self.q(into),
                self.q_list(&insert_columns),
                self.q_list(&select_columns),
                self.q(from)
            )
        };

        let mut sql = Vec::new();
        if self.dialect == Dialect::Sqlite {
            // Foreign keys live in the table definition, so the rebuilt table
            // carries every key the migration gives it from here on
            let foreign_keys: Vec<ForeignKey> = changes[i + 1..]
                .iter()
                .filter_map(|c| match c {
                    Change::AddForeignKey { table, foreign_key }
                        if ddlkit_model::names_equal(table, &old.name, cs) =>
                    {
                        Some(foreign_key.clone())
                    }
                    _ => None,
                })
                .collect();
            let staging = ddlkit_sql::staging_table_name(&old.name);

            // References from other tables must survive the drop. The
            // pragma only takes effect outside a transaction.
            sql.push("PRAGMA foreign_keys = OFF;".to_string());
            sql.push(self.create_table(&staging, target, &foreign_keys)?);
            if migrate_data && !insert_columns.is_empty() {
                sql.push(copy(&staging, &old.name));
            }
            sql.push(format!("DROP TABLE {};", self.q(&old.name)));
            sql.push(format!(
                "ALTER TABLE {} RENAME TO {};",
                self.q(&staging),
                self.q(&old.name)
            ));
        } else {
            let parked = ddlkit_sql::rebuild_table_name(&old.name);

            // Index names are schema-wide outside MySQL
            if self.dialect != Dialect::MySql {
                sql.extend(old.indices.iter().map(|i| self.drop_index(&old.name, i)));
            }
            sql.push(format!(
                "ALTER TABLE {} RENAME TO {};",
                self.q(&old.name),
                self.q(&parked)
            ));
            // The key constraint keeps its name across the rename
            if self.dialect == Dialect::PostgreSql && old.has_primary_key() {
                sql.push(format!(
                    "ALTER TABLE {} {};",
                    self.q(&parked),
                    self.drop_primary_key(&old.name)
                ));
            }
            sql.push(self.create_table(&old.name, target, &[])?);
            if migrate_data && !insert_columns.is_empty() {
                sql.push(copy(&old.name, &parked));
            }
            sql.push(format!("DROP TABLE {};", self.q(&parked)));
        }

        sql.extend(target.indices.iter().map(|i| self.create_index(&old.name, i)));
        if self.dialect == Dialect::Sqlite {
            sql.push("PRAGMA foreign_key_check;".to_string());
            sql.push("PRAGMA foreign_keys = ON;".to_string());
        }
        Ok(sql)
    }

    /// Whether SQLite can skip a foreign key change because the key is part
    /// of a table definition written elsewhere in `changes`.
    fn sqlite_keeps_foreign_key(&self, change: &Change, changes: &[Change], i: usize) -> bool {
        let cs = self.case_sensitive;
        let same_table = |c: &Change| ddlkit_model::names_equal(c.table_name(), change.table_name(), cs);
        let paired = |c: &Change| match (change, c) {
            (
                Change::AddForeignKey { foreign_key: a, .. },
                Change::RemoveForeignKey { foreign_key: b, .. },
            )
            | (
                Change::RemoveForeignKey { foreign_key: a, .. },
                Change::AddForeignKey { foreign_key: b, .. },
            ) => same_table(c) && a.is_equivalent_to(b, cs),
            _ => false,
        };

        match change {
            Change::AddForeignKey { .. } => changes[..i].iter().any(|c| {
                paired(c)
                    || (same_table(c)
                        && matches!(c, Change::AddTable { .. } | Change::RecreateTable { .. }))
            }),
            Change::RemoveForeignKey { .. } => changes[i + 1..].iter().any(|c| {
                paired(c)
                    || (same_table(c)
                        && matches!(c, Change::RemoveTable { .. } | Change::RecreateTable { .. }))
            }),
            _ => false,
        }
    }

    /// `CREATE TABLE` for `table` under `name`, in the usual layout.
    fn create_table(&self, name: &str, table: &Table, foreign_keys: &[ForeignKey]) -> Result<String> {
        let pk_columns = table.primary_key_names();
        let inline_pk = pk_columns.len() == 1;

        let mut parts = table
            .columns
            .iter()
            .map(|col| {
                self.column_definition(col, col.primary_key && inline_pk)
                    .map(|def| format!("    {}", def))
            })
            .collect::<Result<Vec<String>>>()?;

        if pk_columns.len() > 1 {
            parts.push(format!("    PRIMARY KEY ({})", self.q_list(&pk_columns)));
        }
        for fk in foreign_keys {
            parts.push(format!("    {}", self.foreign_key_constraint(name, fk)));
        }

        Ok(format!(
            "CREATE TABLE {} (\n{}\n);",
            self.q(name),
            parts.join(",\n")
        ))
    }

    /// Column definition as used in `CREATE TABLE` and `ADD COLUMN`.
    fn column_definition(&self, column: &Column, inline_pk: bool) -> Result<String> {
        let name = self.q(&column.name);

        if self.dialect == Dialect::Sqlite && column.auto_increment {
            if !inline_pk {
                return Err(Error::UnsupportedChange {
                    dialect: self.dialect.to_string(),
                    change: format!("auto increment on non-key column {}", column.name),
                });
            }
            return Ok(format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", name));
        }

        let mut def = format!("{} {}", name, self.column_type(column));
        if column.auto_increment {
            match self.dialect {
                Dialect::MySql => def.push_str(" AUTO_INCREMENT"),
                _ => def.push_str(" GENERATED BY DEFAULT AS IDENTITY"),
            }
        }
        if inline_pk {
            def.push_str(" PRIMARY KEY");
        } else if column.is_required() {
            def.push_str(" NOT NULL");
        }
        if !column.auto_increment {
            if let Some(default) = self.default_literal(column)? {
                def.push_str(&format!(" DEFAULT {}", default));
            }
        }
        Ok(def)
    }

    /// MySQL restates the whole column to change any part of it.
    fn modify_column(&self, after: &Database, change: &Change, column: &str) -> Result<String> {
        // Key columns come out NOT NULL, and MODIFY leaves the key itself alone
        let def = self.column_definition(self.column(after, change, column)?, false)?;
        Ok(format!(
            "ALTER TABLE {} MODIFY COLUMN {};",
            self.q(change.table_name()),
            def
        ))
    }

    fn column_type(&self, column: &Column) -> String {
        let size = column.size;
        let scale = column.scale.unwrap_or(0);
        let native = || column.native_type.clone();

        match self.dialect {
            Dialect::Generic => native().unwrap_or_else(|| column.column_type().to_string()),
            Dialect::PostgreSql => match column.sql_type {
                SqlType::TinyInt | SqlType::SmallInt => "SMALLINT".to_string(),
                SqlType::Integer => "INTEGER".to_string(),
                SqlType::BigInt => "BIGINT".to_string(),
                SqlType::Boolean | SqlType::Bit => "BOOLEAN".to_string(),
                SqlType::Char => sized("CHAR", size),
                SqlType::VarChar => match size {
                    Some(n) => format!("VARCHAR({})", n),
                    None => "TEXT".to_string(),
                },
                SqlType::LongVarChar | SqlType::Clob => "TEXT".to_string(),
                SqlType::Binary | SqlType::VarBinary | SqlType::LongVarBinary | SqlType::Blob => {
                    "BYTEA".to_string()
                }
                SqlType::Decimal | SqlType::Numeric => decimal("NUMERIC", size, scale),
                SqlType::Real => "REAL".to_string(),
                SqlType::Float | SqlType::Double => "DOUBLE PRECISION".to_string(),
                SqlType::Date => "DATE".to_string(),
                SqlType::Time => "TIME".to_string(),
                SqlType::Timestamp => "TIMESTAMP".to_string(),
                SqlType::Array | SqlType::Other => native().unwrap_or_else(|| "TEXT".to_string()),
            },
            Dialect::MySql => match column.sql_type {
                SqlType::TinyInt => "TINYINT".to_string(),
                SqlType::SmallInt => "SMALLINT".to_string(),
                SqlType::Integer => "INT".to_string(),
                SqlType::BigInt => "BIGINT".to_string(),
                SqlType::Boolean | SqlType::Bit => "TINYINT(1)".to_string(),
                SqlType::Char => sized("CHAR", size),
                SqlType::VarChar => format!("VARCHAR({})", size.unwrap_or(255)),
                SqlType::LongVarChar | SqlType::Clob => "LONGTEXT".to_string(),
                SqlType::Binary => sized("BINARY", size),
                SqlType::VarBinary => format!("VARBINARY({})", size.unwrap_or(255)),
                SqlType::LongVarBinary | SqlType::Blob => "LONGBLOB".to_string(),
                SqlType::Decimal | SqlType::Numeric => decimal("DECIMAL", size, scale),
                SqlType::Real | SqlType::Float => "FLOAT".to_string(),
                SqlType::Double => "DOUBLE".to_string(),
                SqlType::Date => "DATE".to_string(),
                SqlType::Time => "TIME".to_string(),
                SqlType::Timestamp => "DATETIME".to_string(),
                SqlType::Array | SqlType::Other => native().unwrap_or_else(|| "TEXT".to_string()),
            },
            // Storage classes
            Dialect::Sqlite => match column.sql_type {
                SqlType::TinyInt
                | SqlType::SmallInt
                | SqlType::Integer
                | SqlType::BigInt
                | SqlType::Boolean
                | SqlType::Bit => "INTEGER",
                SqlType::Binary | SqlType::VarBinary | SqlType::LongVarBinary | SqlType::Blob => {
                    "BLOB"
                }
                SqlType::Decimal | SqlType::Numeric => "NUMERIC",
                SqlType::Real | SqlType::Float | SqlType::Double => "REAL",
                SqlType::Char
                | SqlType::VarChar
                | SqlType::LongVarChar
                | SqlType::Clob
                | SqlType::Date
                | SqlType::Time
                | SqlType::Timestamp
                | SqlType::Array
                | SqlType::Other => "TEXT",
            }
            .to_string(),
        }
    }

    /// The column's default as a SQL literal of its type.
    fn default_literal(&self, column: &Column) -> Result<Option<String>> {
        let Some(value) = column.typed_default()? else {
            return Ok(None);
        };
        let numeric_bools = matches!(self.dialect, Dialect::MySql | Dialect::Sqlite);

        let literal = match value {
            TypedValue::Boolean(b) if numeric_bools => (if b { "1" } else { "0" }).to_string(),
            TypedValue::Boolean(b) => (if b { "TRUE" } else { "FALSE" }).to_string(),
            TypedValue::Integer(n) => n.to_string(),
            TypedValue::Decimal(n) => n.to_string(),
            TypedValue::Float(n) => n.to_string(),
            TypedValue::Text(s) => Lit(s).to_string(),
            TypedValue::Binary(bytes) => {
                let hex: String = bytes.iter().map(|b| format!("{:02X}", b)).collect();
                match self.dialect {
                    Dialect::PostgreSql => format!("'\\x{}'", hex),
                    _ => format!("X'{}'", hex),
                }
            }
            TypedValue::Date(date) => Lit(date.to_string()).to_string(),
            TypedValue::Time(time) => Lit(time.to_string()).to_string(),
            TypedValue::Timestamp(ts) => Lit(ts.strftime("%Y-%m-%d %H:%M:%S").to_string()).to_string(),
        };
        Ok(Some(literal))
    }

    fn create_index(&self, table: &str, index: &Index) -> String {
        let unique = if index.unique { "UNIQUE " } else { "" };
        let columns: Vec<String> = index
            .columns
            .iter()
            .map(|c| match c.size {
                Some(len) if self.dialect == Dialect::MySql => format!("{}({})", self.q(&c.name), len),
                _ => self.q(&c.name),
            })
            .collect();
        format!(
            "CREATE {}INDEX {} ON {} ({});",
            unique,
            self.q(&index.name),
            self.q(table),
            columns.join(", ")
        )
    }

    fn drop_index(&self, table: &str, index: &Index) -> String {
        match self.dialect {
            Dialect::MySql => format!("DROP INDEX {} ON {};", self.q(&index.name), self.q(table)),
            _ => format!("DROP INDEX {};", self.q(&index.name)),
        }
    }

    fn drop_primary_key(&self, table: &str) -> String {
        match self.dialect {
            Dialect::MySql => "DROP PRIMARY KEY".to_string(),
            _ => format!(
                "DROP CONSTRAINT {}",
                self.q(&ddlkit_sql::primary_key_name(table))
            ),
        }
    }

    fn foreign_key_constraint(&self, table: &str, fk: &ForeignKey) -> String {
        format!(
            "CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            self.q(&fk.effective_name(table)),
            self.q_list(&fk.local_columns()),
            self.q(&fk.foreign_table),
            self.q_list(&fk.foreign_columns())
        )
    }

    fn table<'a>(&self, db: &'a Database, name: &str) -> Result<&'a Table> {
        db.find_table(name, self.case_sensitive)
            .ok_or_else(|| {
                ModelError::TableNotFound {
                    table: name.to_string(),
                }
                .into()
            })
    }

    fn column<'a>(&self, db: &'a Database, change: &Change, name: &str) -> Result<&'a Column> {
        let table = self.table(db, change.table_name())?;
        table
            .find_column(name, self.case_sensitive)
            .ok_or_else(|| {
                ModelError::ColumnNotFound {
                    table: table.name.clone(),
                    column: name.to_string(),
                }
                .into()
            })
    }

    fn unsupported(&self, change: &Change) -> Error {
        Error::UnsupportedChange {
            dialect: self.dialect.to_string(),
            change: change.to_string(),
        }
    }

    fn q(&self, name: &str) -> String {
        quote_ident(name, self.dialect.quote_style())
    }

    fn q_list(&self, names: &[impl AsRef<str>]) -> String {
        names
            .iter()
            .map(|n| self.q(n.as_ref()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn sized(name: &str, size: Option<u32>) -> String {
    match size {
        Some(n) => format!("{}({})", name, n),
        None => name.to_string(),
    }
}

fn decimal(name: &str, size: Option<u32>, scale: u32) -> String {
    match size {
        Some(precision) => format!("{}({},{})", name, precision, scale),
        None => name.to_string(),
    }
}
