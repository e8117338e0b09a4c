//! # Visitors - many-to-one persistence over SQLite
//!
//! A small mapping layer showing many `Person` records pointing at one
//! `Website` record.
//!
//! Visitors provides:
//! - An explicit `Schema` value describing both tables
//! - A `Store` wrapping a process-local SQLite connection
//! - A `Session` unit-of-work that stages inserts and assigns ids on flush
//! - A typed `Query` builder for equality filters

pub mod model;
pub mod storage;
pub mod query;
pub mod session;
pub mod demo;
pub mod config;

// Re-exports for convenient access
pub use model::{Entity, Key, NewPerson, NewWebsite, Person, PersonColumn, Website, WebsiteColumn, WebsiteRef};
pub use query::{Literal, Query};
pub use session::Session;
pub use storage::{DatabaseUrl, Schema, Store};

/// Result type alias for Visitors operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for Visitors operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid database url: {0}")]
    InvalidUrl(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Constraint violated: {0}")]
    Constraint(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Table not declared in schema: {0}")]
    UnknownTable(String),

    #[error("Circular table references: {0}")]
    SchemaCycle(String),

    #[error("Key {0} does not belong to this session")]
    UnknownKey(usize),

    #[error("Session is unusable after a failed flush; close it and start a new one")]
    SessionPoisoned,

    #[error("Record not found: {0}")]
    NotFound(String),
}

impl Error {
    /// Lift SQLite constraint failures into `Error::Constraint`, pass the rest through.
    pub(crate) fn from_sqlite(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, msg)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Error::Constraint(msg.unwrap_or_else(|| code.to_string()))
            }
            other => Error::Storage(other),
        }
    }
}
