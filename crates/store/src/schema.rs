//! Declarative table schema payloads
//!
//! Migration steps declare the tables they create as data rather than as
//! raw SQL strings: column types, exact byte-length checks for key
//! material, and cascading foreign keys on the device identifier. The
//! payload renders to dialect-appropriate SQL when the step executes, so
//! the upgrade runner itself never carries any DDL.

use crate::dialect::Dialect;

/// Column types used by the store's schema payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Text,
    VarChar(u16),
    /// Binary column; `exact_len` adds a byte-length CHECK constraint,
    /// enforced at write time for keys, signatures, and hashes
    Blob { exact_len: Option<u32> },
    /// 64-bit integer; `max` adds a `>= 0 AND < max` range CHECK
    BigInt { max: Option<i64> },
    /// 32-bit integer; `max` adds a `>= 0 AND < max` range CHECK
    Integer { max: Option<i64> },
    Boolean,
}

impl ColumnType {
    fn sql_type(&self, dialect: Dialect) -> String {
        match self {
            ColumnType::Text => "TEXT".to_string(),
            ColumnType::VarChar(len) => format!("VARCHAR({})", len),
            ColumnType::Blob { .. } => match dialect {
                Dialect::Sqlite => "BLOB".to_string(),
                Dialect::Postgres => "BYTEA".to_string(),
            },
            ColumnType::BigInt { .. } => "BIGINT".to_string(),
            ColumnType::Integer { .. } => "INTEGER".to_string(),
            ColumnType::Boolean => "BOOLEAN".to_string(),
        }
    }

    fn check_clause(&self, column: &str) -> Option<String> {
        match self {
            ColumnType::Blob {
                exact_len: Some(len),
            } => Some(format!("CHECK ( length({}) = {} )", column, len)),
            ColumnType::BigInt { max: Some(max) } | ColumnType::Integer { max: Some(max) } => {
                Some(format!("CHECK ( {} >= 0 AND {} < {} )", column, column, max))
            }
            _ => None,
        }
    }
}

/// A single column declaration
#[derive(Debug, Clone, Copy)]
pub struct ColumnDef {
    pub name: &'static str,
    pub ty: ColumnType,
    pub not_null: bool,
    pub default: Option<&'static str>,
}

impl ColumnDef {
    /// Render the column clause for a CREATE TABLE or ADD COLUMN statement.
    pub fn sql(&self, dialect: Dialect) -> String {
        let name = quote_ident(self.name);
        let mut parts = vec![format!("{} {}", name, self.ty.sql_type(dialect))];
        if self.not_null {
            parts.push("NOT NULL".to_string());
        }
        if let Some(default) = self.default {
            parts.push(format!("DEFAULT {}", default));
        }
        if let Some(check) = self.ty.check_clause(&name) {
            parts.push(check);
        }
        parts.join(" ")
    }
}

/// A foreign key to a parent row, always cascading
///
/// Child rows reference their parent by device identifier; removing the
/// parent removes all dependent key, session, and state rows through the
/// engine's referential-integrity mechanism, not application code.
#[derive(Debug, Clone, Copy)]
pub struct ForeignKeyDef {
    pub columns: &'static [&'static str],
    pub parent_table: &'static str,
    pub parent_columns: &'static [&'static str],
}

/// A full table declaration consumed by a migration step
#[derive(Debug, Clone, Copy)]
pub struct TableDef {
    pub name: &'static str,
    pub columns: &'static [ColumnDef],
    pub primary_key: &'static [&'static str],
    pub foreign_key: Option<ForeignKeyDef>,
}

impl TableDef {
    /// Build the CREATE TABLE SQL for the given dialect.
    pub fn create_sql(&self, dialect: Dialect) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(|c| c.sql(dialect)).collect();

        if !self.primary_key.is_empty() {
            parts.push(format!("PRIMARY KEY ({})", quote_list(self.primary_key)));
        }
        if let Some(fk) = &self.foreign_key {
            parts.push(format!(
                "FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE CASCADE ON UPDATE CASCADE",
                quote_list(fk.columns),
                fk.parent_table,
                quote_list(fk.parent_columns)
            ));
        }

        format!(
            "CREATE TABLE {} (\n    {}\n)",
            self.name,
            parts.join(",\n    ")
        )
    }
}

// Identifiers that collide with SQL keywords in at least one supported
// dialect.
const RESERVED: &[&str] = &["key"];

/// Quote an identifier if it needs quoting.
pub fn quote_ident(name: &str) -> String {
    if RESERVED.contains(&name) {
        format!("\"{}\"", name)
    } else {
        name.to_string()
    }
}

fn quote_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| quote_ident(n))
        .collect::<Vec<_>>()
        .join(", ")
}
