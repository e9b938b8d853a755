//! SQLite persistence layer.
//!
//! RULE: Only the store talks to the database.
//! The engine calls store methods; pipeline stages never execute SQL.

use crate::error::SegResult;
use rusqlite::Connection;

mod cluster_run;
mod contract;

pub use cluster_run::RunClientCount;

pub struct SegStore {
    conn: Connection,
}

impl SegStore {
    pub fn open(path: &str) -> SegResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        // Concurrent runners for other profiles may hold the write lock briefly.
        conn.busy_timeout(std::time::Duration::from_secs(30))?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> SegResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order. Idempotent.
    pub fn migrate(&self) -> SegResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_contracts.sql"))?;
        self.conn
            .execute_batch(include_str!("../../../migrations/002_cluster_runs.sql"))?;
        Ok(())
    }
}
