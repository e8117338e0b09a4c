//! SQLite storage implementation

use std::path::Path;
use rusqlite::Connection;
use crate::Result;
use crate::session::Session;
use super::schema::Schema;
use super::url::DatabaseUrl;
use super::echo_sql;

/// SQLite-backed store for websites and the people visiting them
pub struct Store {
    conn: Connection,
    url: DatabaseUrl,
    echo: bool,
}

impl Store {
    /// Open a database file (creates if doesn't exist)
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::configure(conn, DatabaseUrl::File(path.to_path_buf()))
    }

    /// Open an in-memory database, discarded when the store is dropped
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn, DatabaseUrl::Memory)
    }

    /// Open the database a connection string points at
    pub fn connect(url: &str) -> Result<Self> {
        Self::from_url(&DatabaseUrl::parse(url)?)
    }

    pub fn from_url(url: &DatabaseUrl) -> Result<Self> {
        match url {
            DatabaseUrl::Memory => Self::open_in_memory(),
            DatabaseUrl::File(path) => Self::open(path),
        }
    }

    fn configure(conn: Connection, url: DatabaseUrl) -> Result<Self> {
        // Off by default in SQLite; must be set outside any transaction
        conn.execute_batch("PRAGMA foreign_keys = ON")?;
        tracing::debug!("Opened store at {}", url);
        Ok(Self { conn, url, echo: false })
    }

    /// Log every statement at debug level on the `visitors::sql` target
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    pub fn url(&self) -> &DatabaseUrl {
        &self.url
    }

    /// Create every table in the schema that does not exist yet
    pub fn create_all(&self, schema: &Schema) -> Result<()> {
        for stmt in schema.all_schema_statements()? {
            echo_sql(self.echo, &stmt);
            self.conn.execute(&stmt, [])?;
        }
        tracing::info!("Schema ready ({} tables)", schema.tables().len());
        Ok(())
    }

    /// Names of the tables present in the database
    pub fn table_names(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
        )?;

        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        Ok(names)
    }

    /// Start a unit-of-work. Nothing it stages is visible outside the
    /// session until `Session::commit`.
    pub fn session<'a>(&'a mut self, schema: &'a Schema) -> Result<Session<'a>> {
        let echo = self.echo;
        let tx = self.conn.transaction()?;
        echo_sql(echo, "BEGIN");
        Ok(Session::new(tx, schema, echo))
    }
}
