use ddlkit_config::ConfigError;
use ddlkit_model::{ConversionError, ModelError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("model integrity error: {0}")]
    Model(#[from] ModelError),

    #[error("conversion error: {0}")]
    Conversion(#[from] ConversionError),

    /// The capability predicate rejected even recreating the table.
    #[error(
        "changes to table '{table}' cannot be applied, not even by recreating it: {}",
        .changes.join("; ")
    )]
    Unrepresentable { table: String, changes: Vec<String> },

    #[error("{dialect} cannot express `{change}`")]
    UnsupportedChange { dialect: String, change: String },

    #[error("unknown dialect '{0}'")]
    UnknownDialect(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
