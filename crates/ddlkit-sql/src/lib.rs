//! Identifier quoting and deterministic object naming.
//!
//! Everything in here is dialect-agnostic string plumbing shared by the
//! schema model (synthesized foreign key names) and the DDL
//! renderer (quoting, temporary table names).

/// How a dialect delimits identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteStyle {
    /// `"name"` (ANSI, PostgreSQL, SQLite)
    #[default]
    Double,
    /// `` `name` `` (MySQL)
    Backtick,
}

impl QuoteStyle {
    fn delimiters(self) -> (char, char) {
        match self {
            QuoteStyle::Double => ('"', '"'),
            QuoteStyle::Backtick => ('`', '`'),
        }
    }
}

/// A SQL string literal wrapper.
///
/// Display writes the value escaped and quoted with single quotes.
///
/// # Example
/// ```
/// use ddlkit_sql::Lit;
/// assert_eq!(format!("{}", Lit("foo")), "'foo'");
/// assert_eq!(format!("{}", Lit("it's")), "'it''s'");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> std::fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'")?;
        for c in self.0.as_ref().chars() {
            if c == '\'' {
                write!(f, "''")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "'")
    }
}

/// A delimited identifier wrapper.
///
/// Display writes the value quoted with the given style, doubling any
/// embedded closing delimiter.
///
/// # Example
/// ```
/// use ddlkit_sql::{Ident, QuoteStyle};
/// assert_eq!(format!("{}", Ident("user", QuoteStyle::Double)), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h", QuoteStyle::Double)), "\"bla\"\"h\"");
/// assert_eq!(format!("{}", Ident("order", QuoteStyle::Backtick)), "`order`");
/// ```
pub struct Ident<T: AsRef<str>>(pub T, pub QuoteStyle);

impl<T: AsRef<str>> std::fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (open, close) = self.1.delimiters();
        write!(f, "{}", open)?;
        for c in self.0.as_ref().chars() {
            if c == close {
                write!(f, "{}{}", close, close)?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "{}", close)
    }
}

/// Quote an identifier with the given style.
///
/// Always quotes, so reserved words like `user`, `order` or `table` are safe.
pub fn quote_ident(name: &str, style: QuoteStyle) -> String {
    format!("{}", Ident(name, style))
}

/// Longest identifier every supported dialect accepts.
///
/// PostgreSQL truncates at 63 bytes and MySQL at 64, so names are kept at 63.
pub const MAX_IDENT_LEN: usize = 63;

/// Generate a foreign key constraint name for a table and its local columns.
///
/// # Examples
///
/// ```
/// assert_eq!(ddlkit_sql::foreign_key_name("post", &["author_id"]), "fk_post_author_id");
/// ```
pub fn foreign_key_name(table: &str, columns: &[impl AsRef<str>]) -> String {
    bounded_name("fk", table, columns)
}

/// The primary key constraint name PostgreSQL assigns by default.
///
/// ```
/// assert_eq!(ddlkit_sql::primary_key_name("user"), "user_pkey");
/// ```
pub fn primary_key_name(table: &str) -> String {
    truncate_with_hash(&format!("{}_pkey", table))
}

/// Name under which a table is parked while it is being rebuilt.
///
/// ```
/// assert_eq!(ddlkit_sql::rebuild_table_name("user"), "user__old");
/// ```
pub fn rebuild_table_name(table: &str) -> String {
    truncate_with_hash(&format!("{}__old", table))
}

/// Name under which a replacement table is built before it is swapped in.
///
/// ```
/// assert_eq!(ddlkit_sql::staging_table_name("user"), "user__new");
/// ```
pub fn staging_table_name(table: &str) -> String {
    truncate_with_hash(&format!("{}__new", table))
}

fn bounded_name(prefix: &str, table: &str, columns: &[impl AsRef<str>]) -> String {
    let cols: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    truncate_with_hash(&format!("{}_{}_{}", prefix, table, cols.join("_")))
}

/// Keep names within [`MAX_IDENT_LEN`].
///
/// Over-long names are cut and suffixed with a stable hash of the full name,
/// so two long names sharing a prefix still get distinct identifiers.
pub fn truncate_with_hash(name: &str) -> String {
    if name.len() <= MAX_IDENT_LEN {
        return name.to_string();
    }

    let hex = blake3::hash(name.as_bytes()).to_hex().to_string();
    let suffix = &hex[..12];

    // "_" + suffix
    let mut len = MAX_IDENT_LEN - suffix.len() - 1;
    while len > 0 && !name.is_char_boundary(len) {
        len -= 1;
    }
    format!("{}_{}", &name[..len], suffix)
}
