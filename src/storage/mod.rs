//! Storage Layer - SQLite-backed persistence
//!
//! System of record is SQLite with tables:
//! - websites(id, url)
//! - person(id, name, website_id -> websites.id)

pub mod schema;
pub mod sqlite;
pub mod url;

pub use schema::{ColumnDef, ForeignKey, Schema, SqlType, TableDef};
pub use sqlite::Store;
pub use url::{DatabaseUrl, DEFAULT_DATABASE_URL};

/// Log a statement on the `visitors::sql` target when echo is on
pub(crate) fn echo_sql(enabled: bool, sql: &str) {
    if enabled {
        tracing::debug!(target: "visitors::sql", "{}", sql);
    }
}
