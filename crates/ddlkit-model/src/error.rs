use thiserror::Error;

/// A mutation would leave the model referentially inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("table '{table}' does not exist")]
    TableNotFound { table: String },

    #[error("table '{table}' already exists")]
    DuplicateTable { table: String },

    #[error("column '{table}.{column}' does not exist")]
    ColumnNotFound { table: String, column: String },

    #[error("column '{table}.{column}' already exists")]
    DuplicateColumn { table: String, column: String },

    #[error("index '{index}' does not exist on table '{table}'")]
    IndexNotFound { table: String, index: String },

    #[error("foreign key {foreign_key} does not exist on table '{table}'")]
    ForeignKeyNotFound { table: String, foreign_key: String },

    #[error(
        "table '{table}' is still linked by foreign keys: {}",
        .foreign_keys.join("; ")
    )]
    ForeignKeysPresent {
        table: String,
        foreign_keys: Vec<String>,
    },

    #[error("column '{table}.{column}' is still used by {used_by}")]
    ColumnInUse {
        table: String,
        column: String,
        used_by: String,
    },

    #[error("invalid index '{index}' on table '{table}': {reason}")]
    InvalidIndex {
        table: String,
        index: String,
        reason: String,
    },

    #[error("invalid foreign key {foreign_key} on table '{table}': {reason}")]
    InvalidForeignKey {
        table: String,
        foreign_key: String,
        reason: String,
    },
}
