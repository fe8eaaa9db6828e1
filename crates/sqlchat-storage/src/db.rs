//! Database connection management.
//!
//! File-backed databases open a fresh connection for every operation and
//! drop it when the closure returns, so no request holds a lock past its own
//! statement. In-memory databases (tests) keep one connection behind a Mutex,
//! since a private in-memory database disappears with its connection.

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use tracing::{debug, info};

use sqlchat_core::error::SqlchatError;

use crate::migrations;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

enum Target {
    File(PathBuf),
    Memory(Mutex<Connection>),
}

/// Handle to the SQLite file holding the dataset and the conversation log.
pub struct Database {
    target: Target,
    busy_timeout: Duration,
}

impl Database {
    /// Open (or create) a database at the given path.
    ///
    /// Switches the file to WAL mode and runs all pending migrations.
    pub fn new(path: &Path) -> Result<Self, SqlchatError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let db = Self {
            target: Target::File(path.to_path_buf()),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        };

        db.with_conn(|conn| {
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
                .map_err(|e| SqlchatError::Storage(format!("Failed to set pragmas: {}", e)))?;
            migrations::run_migrations(conn)
        })?;

        info!("Database opened at {}", path.display());
        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self, SqlchatError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| SqlchatError::Storage(format!("Failed to open in-memory db: {}", e)))?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")
            .map_err(|e| SqlchatError::Storage(format!("Failed to set pragmas: {}", e)))?;
        migrations::run_migrations(&conn)?;

        Ok(Self {
            target: Target::Memory(Mutex::new(conn)),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        })
    }

    /// Override how long a connection waits on a locked database.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Path of the backing file, `None` for in-memory databases.
    pub fn path(&self) -> Option<&Path> {
        match &self.target {
            Target::File(path) => Some(path),
            Target::Memory(_) => None,
        }
    }

    /// Execute a closure with a read-write connection.
    ///
    /// For file-backed databases the connection lives exactly as long as the
    /// closure.
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, SqlchatError>
    where
        F: FnOnce(&Connection) -> Result<T, SqlchatError>,
    {
        match &self.target {
            Target::File(path) => {
                let conn = self.open_file(path, OpenFlags::default())?;
                conn.execute_batch("PRAGMA foreign_keys = ON;")
                    .map_err(|e| SqlchatError::Storage(format!("Failed to set pragmas: {}", e)))?;
                f(&conn)
            }
            Target::Memory(conn) => {
                let conn = conn
                    .lock()
                    .map_err(|e| SqlchatError::Storage(format!("Database lock poisoned: {}", e)))?;
                f(&conn)
            }
        }
    }

    /// Execute a closure with a connection that refuses writes.
    ///
    /// File-backed databases are opened with read-only flags; the shared
    /// in-memory connection is switched to `query_only` for the duration of
    /// the closure.
    pub fn with_read_only_conn<F, T>(&self, f: F) -> Result<T, SqlchatError>
    where
        F: FnOnce(&Connection) -> Result<T, SqlchatError>,
    {
        match &self.target {
            Target::File(path) => {
                let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
                    | OpenFlags::SQLITE_OPEN_URI
                    | OpenFlags::SQLITE_OPEN_NO_MUTEX;
                let conn = self.open_file(path, flags)?;
                f(&conn)
            }
            Target::Memory(conn) => {
                let conn = conn
                    .lock()
                    .map_err(|e| SqlchatError::Storage(format!("Database lock poisoned: {}", e)))?;
                set_query_only(&conn, true)?;
                let result = f(&conn);
                set_query_only(&conn, false)?;
                result
            }
        }
    }

    fn open_file(&self, path: &Path, flags: OpenFlags) -> Result<Connection, SqlchatError> {
        let conn = Connection::open_with_flags(path, flags)
            .map_err(|e| SqlchatError::Storage(format!("Failed to open database: {}", e)))?;
        conn.busy_timeout(self.busy_timeout)
            .map_err(|e| SqlchatError::Storage(format!("Failed to set busy timeout: {}", e)))?;
        debug!(path = %path.display(), "Connection opened");
        Ok(conn)
    }
}

fn set_query_only(conn: &Connection, on: bool) -> Result<(), SqlchatError> {
    conn.pragma_update(None, "query_only", on)
        .map_err(|e| SqlchatError::Storage(format!("Failed to toggle query_only: {}", e)))
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("path", &self.path())
            .field("busy_timeout", &self.busy_timeout)
            .finish()
    }
}
