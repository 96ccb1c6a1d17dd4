/// # Test Utilities Module
///
/// Fixtures shared by the unit tests: throwaway database files with a known
/// schema, and a spy provider that records what each session did.
///
/// Every record operation opens its own connection, so fixtures use a file
/// in a temporary directory rather than an in-memory database.

use crate::core::db::{ConnectionProvider, SessionState, SqliteProvider};
use crate::core::Result;
use rusqlite::types::FromSql;
use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use tempfile::TempDir;

pub const USERS_SCHEMA: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        is_active BOOLEAN NOT NULL DEFAULT 1,
        created_at DATETIME
    );
";

pub const MEMBERS_SCHEMA: &str = "
    CREATE TABLE chat_members (
        room_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        role VARCHAR(50) NOT NULL DEFAULT 'member',
        PRIMARY KEY (room_id, user_id)
    );
    INSERT INTO chat_members (room_id, user_id) VALUES (1, 1), (1, 2), (2, 1);
";

/// Temporary database file that lives as long as the fixture
pub struct DatabaseFixture {
    _dir: TempDir,
    pub path: PathBuf,
}

impl DatabaseFixture {
    /// Creates an empty database file
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fixture.db");
        Connection::open(&path)?.execute_batch("PRAGMA user_version = 1;")?;
        Ok(DatabaseFixture { _dir: dir, path })
    }

    /// Database with the `users` table
    pub fn with_users() -> Result<Self> {
        let fixture = Self::new()?;
        fixture.connection().execute_batch(USERS_SCHEMA)?;
        Ok(fixture)
    }

    /// Database with the composite-key `chat_members` table and three rows
    pub fn with_members() -> Result<Self> {
        let fixture = Self::new()?;
        fixture.connection().execute_batch(MEMBERS_SCHEMA)?;
        Ok(fixture)
    }

    pub fn provider(&self) -> SqliteProvider {
        SqliteProvider::new(&self.path)
    }

    /// Direct connection that bypasses the provider
    pub fn connection(&self) -> Connection {
        Connection::open(&self.path).expect("Failed to open fixture database")
    }

    pub fn execute_batch(&self, sql: &str) {
        self.connection()
            .execute_batch(sql)
            .expect("Failed to run fixture SQL");
    }

    pub fn query_one<T: FromSql>(&self, sql: &str) -> T {
        self.connection()
            .query_row(sql, [], |row| row.get(0))
            .expect("Fixture query failed")
    }

    pub fn count(&self, table: &str) -> i64 {
        self.query_one(&format!("SELECT COUNT(*) FROM \"{}\"", table))
    }
}

/// Provider wrapper that counts sessions and records executed statements
pub struct SpyProvider {
    inner: SqliteProvider,
    acquired: Cell<usize>,
    statements: RefCell<Vec<String>>,
    final_states: RefCell<Vec<SessionState>>,
}

impl SpyProvider {
    pub fn new(inner: SqliteProvider) -> Self {
        SpyProvider {
            inner,
            acquired: Cell::new(0),
            statements: RefCell::new(Vec::new()),
            final_states: RefCell::new(Vec::new()),
        }
    }

    pub fn acquire_count(&self) -> usize {
        self.acquired.get()
    }

    pub fn release_count(&self) -> usize {
        self.final_states.borrow().len()
    }

    /// SQL text of every statement run through a session, in order
    pub fn statements(&self) -> Vec<String> {
        self.statements.borrow().clone()
    }

    /// State each released session ended in, in release order
    pub fn final_states(&self) -> Vec<SessionState> {
        self.final_states.borrow().clone()
    }
}

impl ConnectionProvider for SpyProvider {
    fn acquire(&self) -> Result<Connection> {
        self.acquired.set(self.acquired.get() + 1);
        self.inner.acquire()
    }

    fn observe(&self, sql: &str) {
        self.statements.borrow_mut().push(sql.to_string());
    }

    fn released(&self, final_state: SessionState) {
        self.final_states.borrow_mut().push(final_state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_database_fixture_creation() {
        let fixture = DatabaseFixture::with_users().unwrap();
        assert!(fixture.path.exists());
        assert_eq!(fixture.count("users"), 0);
    }

    #[test]
    fn test_members_fixture() {
        let fixture = DatabaseFixture::with_members().unwrap();
        assert_eq!(fixture.count("chat_members"), 3);
    }
}
