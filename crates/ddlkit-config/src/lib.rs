//! Configuration for ddlkit.
//!
//! Looks for `.config/ddlkit.styx` in the current directory or any parent
//! directory. A typical file:
//!
//! ```text
//! dialect mysql
//! case_sensitive false
//! capabilities {
//!     add_column anywhere
//!     alter_column_type true
//! }
//! ```

use facet::Facet;
use std::path::{Path, PathBuf};

/// Configuration loaded from `.config/ddlkit.styx`.
#[derive(Debug, Clone, Default, Facet)]
pub struct Config {
    /// Target dialect: `generic`, `postgresql`, `mysql` or `sqlite`.
    pub dialect: Option<String>,

    /// Whether table and column names match case-sensitively.
    pub case_sensitive: Option<bool>,

    /// Overrides applied on top of the dialect's capabilities.
    #[facet(default)]
    pub capabilities: CapabilityOverrides,
}

/// Per-capability overrides; unset fields keep the dialect's value.
#[derive(Debug, Clone, Default, Facet)]
pub struct CapabilityOverrides {
    /// `never`, `at_end` or `anywhere`.
    pub add_column: Option<String>,
    pub add_required_column_without_default: Option<bool>,
    pub remove_column: Option<bool>,
    pub reorder_columns: Option<bool>,
    pub alter_column_type: Option<bool>,
    pub alter_column_default: Option<bool>,
    pub alter_column_required: Option<bool>,
    pub alter_column_auto_increment: Option<bool>,
    pub add_primary_key: Option<bool>,
    pub remove_primary_key: Option<bool>,
    pub change_primary_key: Option<bool>,
    pub add_index: Option<bool>,
    pub remove_index: Option<bool>,
    pub recreate_table: Option<bool>,
}

/// Location of the configuration file relative to a project directory.
pub const CONFIG_FILE: &str = ".config/ddlkit.styx";

impl Config {
    /// Parse a configuration document.
    pub fn from_styx(content: &str) -> Result<Self, ConfigError> {
        facet_styx::from_str(content).map_err(|e| ConfigError::Parse {
            path: None,
            message: e.to_string(),
        })
    }
}

/// Load the configuration for the current directory.
pub fn load() -> Result<(Config, PathBuf), ConfigError> {
    let cwd = std::env::current_dir().map_err(|source| ConfigError::Io {
        path: PathBuf::from("."),
        source,
    })?;
    load_from(&cwd)
}

/// Load the configuration that applies to `start`, returning it with the
/// path it came from.
pub fn load_from(start: &Path) -> Result<(Config, PathBuf), ConfigError> {
    let path = find_config_file(start)?;
    let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
        path: path.clone(),
        source,
    })?;

    let config = facet_styx::from_str(&content).map_err(|e| ConfigError::Parse {
        path: Some(path.clone()),
        message: e.to_string(),
    })?;
    Ok((config, path))
}

/// The nearest `.config/ddlkit.styx` in `start` or one of its ancestors.
pub fn find_config_file(start: &Path) -> Result<PathBuf, ConfigError> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE))
        .find(|candidate| candidate.is_file())
        .ok_or_else(|| ConfigError::NotFound {
            start: start.to_path_buf(),
        })
}

/// Errors from finding, reading or parsing the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("no .config/ddlkit.styx in {} or any parent directory", .start.display())]
    NotFound { start: PathBuf },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// `path` is unset when the document did not come from a file
    #[error("failed to parse {}: {message}", origin(.path))]
    Parse {
        path: Option<PathBuf>,
        message: String,
    },
}

fn origin(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "configuration".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_config_file_searches_parents() {
        let root = std::env::temp_dir().join(format!("ddlkit-config-{}", std::process::id()));
        let nested = root.join("a/b/c");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::create_dir_all(root.join(".config")).unwrap();
        std::fs::write(root.join(CONFIG_FILE), "dialect sqlite\n").unwrap();

        let found = find_config_file(&nested).unwrap();
        assert_eq!(found, root.join(CONFIG_FILE));

        std::fs::remove_dir_all(&root).unwrap();
    }

    #[test]
    fn test_parse_config() {
        let source = "dialect mysql\ncapabilities {add_column anywhere, alter_column_type true}\n";
        let config = Config::from_styx(source).unwrap();

        assert_eq!(config.dialect.as_deref(), Some("mysql"));
        assert_eq!(config.case_sensitive, None);
        assert_eq!(config.capabilities.add_column.as_deref(), Some("anywhere"));
        assert_eq!(config.capabilities.alter_column_type, Some(true));
        assert_eq!(config.capabilities.remove_column, None);
    }

    #[test]
    fn test_missing_file_names_the_start_directory() {
        let err = find_config_file(Path::new("/nonexistent/ddlkit")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound { .. }));
        assert_eq!(
            err.to_string(),
            "no .config/ddlkit.styx in /nonexistent/ddlkit or any parent directory"
        );
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let root = std::env::temp_dir().join(format!("ddlkit-config-bad-{}", std::process::id()));
        std::fs::create_dir_all(root.join(".config")).unwrap();
        std::fs::write(root.join(CONFIG_FILE), "dialect {\n").unwrap();

        let err = load_from(&root).unwrap_err();
        let ConfigError::Parse { path, .. } = &err else {
            panic!("expected a parse error, got {err}");
        };
        assert_eq!(path.as_deref(), Some(root.join(CONFIG_FILE).as_path()));
        assert!(err.to_string().starts_with("failed to parse "));

        std::fs::remove_dir_all(&root).unwrap();
    }
}
