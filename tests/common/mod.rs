//! Shared fixtures for the integration tests

#![allow(dead_code)]

use recadmin::core::db::SqliteProvider;
use rusqlite::Connection;
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
";

/// Database file in a temporary directory, seeded with `sql`
pub struct TestDb {
    _dir: TempDir,
    pub path: PathBuf,
}

impl TestDb {
    pub fn new(sql: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.db");
        Connection::open(&path).unwrap().execute_batch(sql).unwrap();
        TestDb { _dir: dir, path }
    }

    pub fn users() -> Self {
        Self::new(USERS_SCHEMA)
    }

    pub fn provider(&self) -> SqliteProvider {
        SqliteProvider::new(&self.path)
    }

    pub fn connection(&self) -> Connection {
        Connection::open(&self.path).unwrap()
    }

    pub fn count(&self, table: &str) -> i64 {
        self.connection()
            .query_row(&format!("SELECT COUNT(*) FROM \"{}\"", table), [], |row| row.get(0))
            .unwrap()
    }
}
