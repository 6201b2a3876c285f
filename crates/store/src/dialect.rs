//! SQL dialect tags
//!
//! The dialect is read-only configuration supplied when the store is
//! built. Dialect-aware migration steps consult it to select between SQL
//! templates; adding a dialect is a compile-checked exhaustive match, not
//! a string comparison.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// The SQL variant spoken by the underlying database engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// Embedded file-based engine
    Sqlite,
    /// Postgres family
    Postgres,
}

impl Dialect {
    pub fn as_str(&self) -> &'static str {
        match self {
            Dialect::Sqlite => "sqlite",
            Dialect::Postgres => "postgres",
        }
    }

    /// Sniff the dialect from a connection URL scheme.
    pub fn from_database_url(url: &str) -> StoreResult<Self> {
        let scheme = url.split(':').next().unwrap_or("");
        match scheme {
            "sqlite" => Ok(Dialect::Sqlite),
            "postgres" | "postgresql" => Ok(Dialect::Postgres),
            _ => Err(StoreError::UnknownDialect(url.to_string())),
        }
    }

    /// Positional bind-parameter marker for this dialect.
    pub fn bind_marker(&self, position: usize) -> String {
        match self {
            Dialect::Sqlite => "?".to_string(),
            Dialect::Postgres => format!("${}", position),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Dialect {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sqlite" => Ok(Dialect::Sqlite),
            // "pgx" is accepted for compatibility with configs written for
            // the legacy driver name
            "postgres" | "postgresql" | "pgx" => Ok(Dialect::Postgres),
            other => Err(StoreError::UnknownDialect(other.to_string())),
        }
    }
}
