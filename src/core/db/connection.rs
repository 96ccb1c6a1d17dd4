/// Connection Management Module
///
/// This module provides scoped connection acquisition for record operations.
/// A `ConnectionProvider` opens a fresh connection per operation; a `Session`
/// owns that connection for exactly one operation and releases it on drop,
/// on every exit path.

use crate::core::{RecadminError, Result};
use rusqlite::{Connection, OpenFlags};
use std::cell::Cell;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Lifecycle of a single operation's session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Connection opened, nothing validated yet
    Acquired,
    /// Target table and columns checked against the live schema
    Validated,
    /// Request refused before any statement ran
    Rejected,
    /// Statement executed (and committed, for writes)
    Executed,
    /// Write transaction abandoned after a failed statement
    RolledBack,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Acquired
    }
}

/// Source of database connections.
///
/// Implementations decide how a connection is configured; record operations
/// only ask for a new one at the start of each call.
pub trait ConnectionProvider {
    /// Opens a new connection for one operation.
    fn acquire(&self) -> Result<Connection>;

    /// Called with the SQL text of every statement a session executes.
    fn observe(&self, _sql: &str) {}

    /// Called once when a session releases its connection.
    fn released(&self, _final_state: SessionState) {}
}

impl<T: ConnectionProvider + ?Sized> ConnectionProvider for &T {
    fn acquire(&self) -> Result<Connection> {
        (**self).acquire()
    }

    fn observe(&self, sql: &str) {
        (**self).observe(sql)
    }

    fn released(&self, final_state: SessionState) {
        (**self).released(final_state)
    }
}

/// Opens SQLite database files
#[derive(Debug, Clone)]
pub struct SqliteProvider {
    path: PathBuf,
    foreign_keys: bool,
    busy_timeout: Duration,
}

impl SqliteProvider {
    /// Creates a provider for an existing database file.
    ///
    /// Foreign keys are enforced and the busy timeout is five seconds unless
    /// overridden.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        SqliteProvider {
            path: path.into(),
            foreign_keys: true,
            busy_timeout: Duration::from_millis(5000),
        }
    }

    pub fn with_foreign_keys(mut self, enabled: bool) -> Self {
        self.foreign_keys = enabled;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl ConnectionProvider for SqliteProvider {
    fn acquire(&self) -> Result<Connection> {
        // No SQLITE_OPEN_CREATE: a typo in the path must not create an empty database.
        let conn = Connection::open_with_flags(
            &self.path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(self.busy_timeout)?;
        conn.pragma_update(None, "foreign_keys", self.foreign_keys)?;
        Ok(conn)
    }
}

/// A connection held for the duration of one record operation
pub struct Session<'p> {
    conn: Connection,
    provider: &'p dyn ConnectionProvider,
    state: Cell<SessionState>,
}

impl<'p> Session<'p> {
    /// Acquires a fresh connection from the provider.
    pub fn open(provider: &'p dyn ConnectionProvider) -> Result<Self> {
        let conn = provider.acquire()?;
        debug!("connection acquired");
        Ok(Session {
            conn,
            provider,
            state: Cell::new(SessionState::default()),
        })
    }

    /// Read-only access to the underlying connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, state: SessionState) {
        self.state.set(state);
    }

    /// Moves to `Validated` or `Rejected` depending on a schema check.
    pub(crate) fn validated<T>(&self, check: Result<T>) -> Result<T> {
        self.set_state(if check.is_ok() {
            SessionState::Validated
        } else {
            SessionState::Rejected
        });
        check
    }

    /// Records that a statement is about to run.
    pub(crate) fn observe(&self, sql: &str) {
        debug!(sql, "executing statement");
        self.provider.observe(sql);
    }

    /// Runs one write statement inside its own transaction.
    ///
    /// The transaction commits when `work` succeeds; on error it is dropped
    /// uncommitted, which rolls it back.
    pub(crate) fn write<T>(&self, work: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        // `unchecked_transaction` borrows immutably; the session never nests transactions.
        let tx = self.conn.unchecked_transaction()?;
        let result = match work(&tx) {
            // Deferred constraints are only checked at COMMIT.
            Ok(value) => tx.commit().map_err(RecadminError::from_execution).map(|_| value),
            Err(err) => Err(err),
        };
        match result {
            Ok(value) => {
                self.set_state(SessionState::Executed);
                Ok(value)
            }
            Err(err) => {
                self.set_state(SessionState::RolledBack);
                Err(err)
            }
        }
    }
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        let state = self.state.get();
        debug!(?state, "connection released");
        self.provider.released(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{DatabaseFixture, SpyProvider};

    #[test]
    fn test_provider_opens_existing_database() {
        let fixture = DatabaseFixture::with_users().unwrap();
        let conn = fixture.provider().acquire().unwrap();
        let fk: bool = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert!(fk);
    }

    #[test]
    fn test_provider_refuses_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let provider = SqliteProvider::new(dir.path().join("absent.db"));
        match provider.acquire() {
            Err(RecadminError::Database(_)) => {}
            other => panic!("Expected Database error, got {:?}", other.map(|_| ())),
        }
        assert!(!dir.path().join("absent.db").exists());
    }

    #[test]
    fn test_session_releases_once() {
        let fixture = DatabaseFixture::with_users().unwrap();
        let spy = SpyProvider::new(fixture.provider());
        {
            let session = Session::open(&spy).unwrap();
            assert_eq!(session.state(), SessionState::Acquired);
            assert_eq!(spy.acquire_count(), 1);
            assert_eq!(spy.release_count(), 0);
        }
        assert_eq!(spy.release_count(), 1);
    }

    #[test]
    fn test_failed_write_rolls_back() {
        let fixture = DatabaseFixture::with_users().unwrap();
        let spy = SpyProvider::new(fixture.provider());
        let session = Session::open(&spy).unwrap();

        let result: Result<()> = session.write(|conn| {
            conn.execute("INSERT INTO users (email) VALUES ('a@x.com')", [])?;
            Err(RecadminError::RecordNotFound)
        });
        assert!(result.is_err());
        assert_eq!(session.state(), SessionState::RolledBack);
        drop(session);

        assert_eq!(fixture.count("users"), 0);
        assert_eq!(spy.final_states(), vec![SessionState::RolledBack]);
    }

    #[test]
    fn test_deferred_constraint_fails_at_commit() {
        let fixture = DatabaseFixture::new().unwrap();
        fixture.execute_batch(
            "CREATE TABLE parent (id INTEGER PRIMARY KEY);
             CREATE TABLE child (
                 id INTEGER PRIMARY KEY,
                 parent_id INTEGER REFERENCES parent(id) DEFERRABLE INITIALLY DEFERRED
             );",
        );
        let spy = SpyProvider::new(fixture.provider());
        let session = Session::open(&spy).unwrap();

        let result = session.write(|conn| Ok(conn.execute("INSERT INTO child (parent_id) VALUES (99)", [])?));
        assert!(matches!(result, Err(RecadminError::ConstraintViolation(_))));
        assert_eq!(session.state(), SessionState::RolledBack);
        drop(session);

        assert_eq!(fixture.count("child"), 0);
        assert_eq!(spy.final_states(), vec![SessionState::RolledBack]);
    }

    #[test]
    fn test_write_commits() {
        let fixture = DatabaseFixture::with_users().unwrap();
        let provider = fixture.provider();
        let session = Session::open(&provider).unwrap();
        let changed = session
            .write(|conn| Ok(conn.execute("INSERT INTO users (email) VALUES ('a@x.com')", [])?))
            .unwrap();
        assert_eq!(changed, 1);
        assert_eq!(session.state(), SessionState::Executed);
        drop(session);
        assert_eq!(fixture.count("users"), 1);
    }
}
