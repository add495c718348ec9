//! Allow-list validation for SQL identifier fragments.
//!
//! Schema, table, column and attach-alias names come from the job catalog
//! and from configuration, both of which are operator-edited and therefore
//! untrusted. Every identifier that ends up inside a SQL string passes
//! through [`SqlIdent`] first; values (cutoffs, limits, rowids) are always
//! bound parameters and never touch this module.

use std::fmt;

use thiserror::Error;

/// Upper bound on identifier length. Generous for real-world table names
/// while keeping log lines and error messages readable.
pub const MAX_IDENT_LEN: usize = 64;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier '{0}' exceeds {MAX_IDENT_LEN} characters")]
    TooLong(String),

    #[error("identifier '{0}' contains a character outside [A-Za-z0-9_]")]
    InvalidCharacter(String),

    #[error("identifier '{0}' must start with a letter or underscore")]
    InvalidStart(String),
}

/// A validated SQL identifier: ASCII letter or underscore first, ASCII
/// alphanumerics or underscores after, at most [`MAX_IDENT_LEN`] characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SqlIdent(String);

impl SqlIdent {
    pub fn new(raw: &str) -> Result<Self, IdentError> {
        let mut chars = raw.chars();
        let first = chars.next().ok_or(IdentError::Empty)?;
        if raw.len() > MAX_IDENT_LEN {
            return Err(IdentError::TooLong(raw.to_string()));
        }
        if !(first.is_ascii_alphabetic() || first == '_') {
            if first.is_ascii_alphanumeric() {
                return Err(IdentError::InvalidStart(raw.to_string()));
            }
            return Err(IdentError::InvalidCharacter(raw.to_string()));
        }
        if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(IdentError::InvalidCharacter(raw.to_string()));
        }
        Ok(SqlIdent(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The identifier wrapped in double quotes for inclusion in a statement.
    pub fn quoted(&self) -> String {
        format!("\"{}\"", self.0)
    }
}

impl fmt::Display for SqlIdent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A schema-qualified table reference, e.g. `"main"."orders"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub schema: SqlIdent,
    pub table: SqlIdent,
}

impl TableRef {
    pub fn new(schema: &str, table: &str) -> Result<Self, IdentError> {
        Ok(TableRef {
            schema: SqlIdent::new(schema)?,
            table: SqlIdent::new(table)?,
        })
    }

    /// Quoted `"schema"."table"` fragment for statement assembly.
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.schema.quoted(), self.table.quoted())
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema.as_str(), self.table.as_str())
    }
}
