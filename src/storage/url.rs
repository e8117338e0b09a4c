//! Connection strings
//!
//! Format: `sqlite::memory:`, `sqlite://:memory:` or `sqlite:///:memory:` for
//! a throwaway in-memory database, `sqlite:///path/to/file.db` for a file.

use crate::{Error, Result};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://:memory:";

/// Where the store lives
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum DatabaseUrl {
    /// Process-local, gone when the connection closes
    #[default]
    Memory,
    File(PathBuf),
}

impl DatabaseUrl {
    pub fn parse(s: &str) -> Result<Self> {
        s.parse()
    }

    pub fn is_memory(&self) -> bool {
        matches!(self, DatabaseUrl::Memory)
    }
}

impl FromStr for DatabaseUrl {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let rest = s
            .trim()
            .strip_prefix("sqlite:")
            .ok_or_else(|| Error::InvalidUrl(format!("unsupported scheme in '{}'", s)))?;

        // sqlite:///x -> "x", sqlite://x -> "x", sqlite::memory: -> ":memory:"
        let target = rest
            .strip_prefix("///")
            .or_else(|| rest.strip_prefix("//"))
            .unwrap_or(rest);

        match target {
            "" => Err(Error::InvalidUrl(format!("missing database in '{}'", s))),
            ":memory:" => Ok(DatabaseUrl::Memory),
            path => Ok(DatabaseUrl::File(PathBuf::from(path))),
        }
    }
}

impl fmt::Display for DatabaseUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseUrl::Memory => write!(f, "{}", DEFAULT_DATABASE_URL),
            DatabaseUrl::File(path) => write!(f, "sqlite:///{}", path.display()),
        }
    }
}
