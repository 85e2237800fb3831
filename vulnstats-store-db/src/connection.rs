// SPDX-FileCopyrightText: 2026 Jörg Thalheim
// SPDX-License-Identifier: MIT

//! Database connection management.

use std::path::Path;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::{ROLLUP_SCHEMA_SQL, SCHEMA_VERSION, SOURCE_SCHEMA_SQL};

/// How long a writer waits for a competing transaction before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(10);

/// Database open mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read-only access (dashboards, reporting)
    ReadOnly,
    /// Read-write access to an existing database
    ReadWrite,
    /// Create new database if it doesn't exist
    Create,
}

/// SQLite connection holding namespaces, raw statistics and rollups.
///
/// A connection is used from one thread at a time; concurrent workers each
/// open their own connection to the same file.
pub struct StatsDb {
    pub(crate) conn: Connection,
}

impl StatsDb {
    /// Open or create a database at a custom path.
    ///
    /// `Create` also creates any missing tables.
    pub fn open<P: AsRef<Path>>(path: P, mode: OpenMode) -> Result<Self> {
        let path = path.as_ref();
        let flags = match mode {
            OpenMode::ReadOnly => {
                if !path.exists() {
                    return Err(Error::DatabaseNotFound(path.to_owned()));
                }
                OpenFlags::SQLITE_OPEN_READ_ONLY
            }
            OpenMode::ReadWrite => {
                if !path.exists() {
                    return Err(Error::DatabaseNotFound(path.to_owned()));
                }
                OpenFlags::SQLITE_OPEN_READ_WRITE
            }
            OpenMode::Create => OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        };

        let conn = Connection::open_with_flags(path, flags).map_err(|e| Error::DatabaseOpen {
            path: path.to_owned(),
            source: e,
        })?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let db = Self { conn };

        if mode != OpenMode::ReadOnly {
            db.configure_pragmas()?;
        }
        if mode == OpenMode::Create {
            db.create_schema()?;
        } else {
            db.check_schema_version()?;
        }

        debug!("Opened database at {} ({:?})", path.display(), mode);
        Ok(db)
    }

    /// Create an in-memory database (for testing).
    ///
    /// The database is initialized with the full schema.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.configure_pragmas()?;
        db.create_schema()?;
        debug!("Created in-memory database");
        Ok(db)
    }

    fn configure_pragmas(&self) -> Result<()> {
        self.conn.execute_batch(
            r#"
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            "#,
        )?;
        Ok(())
    }

    /// Create the database schema (source + rollup tables).
    pub fn create_schema(&self) -> Result<()> {
        self.conn.execute_batch(SOURCE_SCHEMA_SQL)?;
        self.conn.execute_batch(ROLLUP_SCHEMA_SQL)?;
        self.conn
            .execute_batch(&format!("PRAGMA user_version = {SCHEMA_VERSION};"))?;
        debug!("Created database schema");
        Ok(())
    }

    fn check_schema_version(&self) -> Result<()> {
        let found: i32 = self
            .conn
            .query_row("PRAGMA user_version", [], |row| row.get(0))?;
        if found != SCHEMA_VERSION {
            return Err(Error::SchemaVersionMismatch {
                expected: SCHEMA_VERSION,
                found,
            });
        }
        Ok(())
    }

    /// Get raw connection (for advanced usage).
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Check if the database has the rollup table.
    pub fn has_schema(&self) -> Result<bool> {
        let count: i32 = self.conn.query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='vulnerability_namespace_statistics'",
            [],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
