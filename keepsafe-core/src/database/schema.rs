//! Database schema and connection management.

use crate::database::store::SqliteStore;
use crate::{DatabaseError, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::{debug, info};

/// Main database connection and schema manager
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open a database at the specified path
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path).map_err(DatabaseError::Sqlite)?;
        Ok(Self { conn })
    }

    /// Create a new in-memory database for testing
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Sqlite)?;
        Ok(Self { conn })
    }

    /// Create missing tables and indexes and upgrade older layouts in place.
    pub fn initialize_schema(&self) -> Result<()> {
        self.create_user_table()?;
        self.create_category_table()?;
        self.create_entry_table()?;
        if self.upgrade_schema()? {
            info!("Upgraded entry table with category membership column");
        }
        self.create_indexes()?;
        Ok(())
    }

    fn create_user_table(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS user (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner INTEGER NOT NULL DEFAULT 0,
                name TEXT NOT NULL,
                key TEXT NOT NULL,
                checksum TEXT NOT NULL
            )",
                [],
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    fn create_category_table(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS category (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner INTEGER NOT NULL,
                name TEXT NOT NULL
            )",
                [],
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    fn create_entry_table(&self) -> Result<()> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS entry (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                owner INTEGER NOT NULL,
                url TEXT NOT NULL DEFAULT '',
                title TEXT NOT NULL DEFAULT '',
                \"desc\" TEXT NOT NULL DEFAULT '',
                uname TEXT NOT NULL,
                password TEXT NOT NULL,
                special TEXT NOT NULL,
                categories TEXT NOT NULL DEFAULT ''
            )",
                [],
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(())
    }

    fn create_indexes(&self) -> Result<()> {
        let indexes = [
            "CREATE UNIQUE INDEX IF NOT EXISTS user_name_idx ON user(name)",
            "CREATE INDEX IF NOT EXISTS category_owner_idx ON category(owner)",
            "CREATE INDEX IF NOT EXISTS entry_owner_idx ON entry(owner)",
        ];
        for sql in &indexes {
            self.conn.execute(sql, []).map_err(DatabaseError::Sqlite)?;
        }
        Ok(())
    }

    /// Bring an entry table created before categories existed up to date.
    ///
    /// Adds the `categories` column and clears it for existing rows. Returns
    /// whether anything changed.
    pub fn upgrade_schema(&self) -> Result<bool> {
        if self.has_column("entry", "categories")? {
            return Ok(false);
        }
        debug!("entry table has no categories column");
        self.conn
            .execute_batch(
                "ALTER TABLE entry ADD COLUMN categories TEXT;
                 UPDATE entry SET categories = '';",
            )
            .map_err(DatabaseError::Sqlite)?;
        Ok(true)
    }

    fn has_column(&self, table: &str, column: &str) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare(&format!("PRAGMA table_info({})", table))
            .map_err(DatabaseError::Sqlite)?;
        let names = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .map_err(DatabaseError::Sqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(DatabaseError::Sqlite)?;
        Ok(names.iter().any(|name| name == column))
    }

    /// A store that runs each statement on its own.
    pub fn store(&self) -> SqliteStore<'_> {
        SqliteStore::new(&self.conn, false)
    }

    /// Run `work` as one unit: commit when it returns `Ok`, roll back
    /// otherwise.
    pub fn transact<T, F>(&mut self, work: F) -> Result<T>
    where
        F: FnOnce(&SqliteStore<'_>) -> Result<T>,
    {
        let tx = self.conn.transaction().map_err(DatabaseError::Sqlite)?;
        let value = {
            let store = SqliteStore::new(&tx, true);
            work(&store)?
        };
        tx.commit().map_err(DatabaseError::Sqlite)?;
        Ok(value)
    }
}
