//! Connection managers: how a pool creates, resets and closes its handles.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::Connection;

/// How long a `SQLite` handle waits on a locked database before failing.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend hooks used by [`Pool`](super::Pool) to manage its handles.
///
/// All three hooks run on the caller's thread with no pool lock held.
pub trait Manager: Send + Sync + 'static {
    /// The handle type handed out by the pool.
    type Connection: Send + 'static;
    /// Backend error type.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Construct a fresh handle.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend refuses the connection.
    fn connect(&self) -> Result<Self::Connection, Self::Error>;

    /// Bring a handle back to a clean state before it is reused.
    ///
    /// # Errors
    ///
    /// Returns an error if the handle can no longer be trusted; it is then discarded.
    fn reset(&self, conn: &mut Self::Connection) -> Result<(), Self::Error>;

    /// Close a handle that is leaving the pool for good.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend failed to close cleanly.
    fn close(&self, conn: Self::Connection) -> Result<(), Self::Error>;
}

/// Manager for file-backed `SQLite` connections.
#[derive(Debug, Clone)]
pub struct SqliteManager {
    path: PathBuf,
}

impl SqliteManager {
    /// Create a manager for the database at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the database path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Manager for SqliteManager {
    type Connection = Connection;
    type Error = rusqlite::Error;

    fn connect(&self) -> Result<Connection, rusqlite::Error> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;
             PRAGMA cache_size = -64000;",
        )?;
        Ok(conn)
    }

    fn reset(&self, conn: &mut Connection) -> Result<(), rusqlite::Error> {
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")?;
        }
        Ok(())
    }

    fn close(&self, conn: Connection) -> Result<(), rusqlite::Error> {
        conn.close().map_err(|(_, err)| err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_applies_pragmas() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = SqliteManager::new(temp_dir.path().join("pool.db"));

        let conn = manager.connect().unwrap();
        let foreign_keys: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(foreign_keys, 1);

        let cache_size: i64 = conn
            .query_row("PRAGMA cache_size", [], |row| row.get(0))
            .unwrap();
        assert_eq!(cache_size, -64000);
    }

    #[test]
    fn test_reset_rolls_back_open_transaction() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = SqliteManager::new(temp_dir.path().join("pool.db"));

        let mut conn = manager.connect().unwrap();
        conn.execute_batch("CREATE TABLE t (v INTEGER); BEGIN; INSERT INTO t VALUES (1);")
            .unwrap();
        assert!(!conn.is_autocommit());

        manager.reset(&mut conn).unwrap();
        assert!(conn.is_autocommit());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_reset_is_noop_in_autocommit() {
        let temp_dir = tempfile::tempdir().unwrap();
        let manager = SqliteManager::new(temp_dir.path().join("pool.db"));

        let mut conn = manager.connect().unwrap();
        manager.reset(&mut conn).unwrap();
        manager.close(conn).unwrap();
    }

    #[test]
    fn test_connect_fails_for_missing_directory() {
        let manager = SqliteManager::new("/nonexistent/dir/pool.db");
        assert!(manager.connect().is_err());
        assert_eq!(manager.path(), Path::new("/nonexistent/dir/pool.db"));
    }
}
