//! # SQLite
//!
//! Disk database.
//!
//! Core purpose is to store the option catalog, per-option vote counts and the set of voters
//! who already voted. Also, the one place where votes are serialized.
//!
//! ## Requirements
//!
//! - One vote per identity, enforced by the database and not by a lookup beforehand
//! - Counter increments never lost under concurrent votes
//! - Readers never see a counted vote without its voter, or the reverse
//! - Survives restarts
//!
//! ## Implementation
//!
//! - Three tables: `options`, `tallies`, `voters`
//! - `voters.identity` is the primary key, so a second insert for the same identity is a no-op
//! - Vote = voter insert + tally increment inside one `IMMEDIATE` transaction
//! - WAL journal, `synchronous = FULL`, foreign keys on
//! - Single owned connection behind a mutex, every call runs on the blocking pool
//!
//! ## Schema
//! ```sql
//! options (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE)
//! tallies (option_id INTEGER PRIMARY KEY REFERENCES options(id), count INTEGER NOT NULL)
//! voters  (identity TEXT PRIMARY KEY, voted_at TEXT NOT NULL)
//! ```
use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::Duration,
};

use rusqlite::Connection;
use tokio::task::spawn_blocking;
use tracing::{info, warn};

use crate::error::StorageError;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS options (
        id   INTEGER PRIMARY KEY,
        name TEXT NOT NULL UNIQUE CHECK (length(name) > 0)
    );

    CREATE TABLE IF NOT EXISTS tallies (
        option_id INTEGER PRIMARY KEY REFERENCES options(id),
        count     INTEGER NOT NULL DEFAULT 0 CHECK (count >= 0)
    );

    CREATE TABLE IF NOT EXISTS voters (
        identity TEXT PRIMARY KEY,
        voted_at TEXT NOT NULL
    );
";

/// Owned handle to the vote database. Cloning shares the same connection.
#[derive(Clone)]
pub struct Database {
    connection: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, StorageError> {
        let path = path.as_ref();
        info!("Opening database at {}", path.display());

        let connection = Connection::open(path)?;
        connection.busy_timeout(busy_timeout)?;

        Self::init(connection)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(connection: Connection) -> Result<Self, StorageError> {
        let journal_mode: String =
            connection.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        connection.pragma_update(None, "synchronous", "FULL")?;
        connection.pragma_update(None, "foreign_keys", true)?;

        // in-memory databases stay on "memory"
        if !journal_mode.eq_ignore_ascii_case("wal") {
            info!("Journal mode is {journal_mode}");
        }

        connection.execute_batch(SCHEMA)?;

        Ok(Self {
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Runs `operation` with exclusive access to the connection on the blocking pool.
    pub async fn run<F, T>(&self, operation: F) -> Result<T, StorageError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let connection = self.connection.clone();

        spawn_blocking(move || {
            let mut connection = connection
                .lock()
                .map_err(|_| StorageError::LockPoisoned)?;

            operation(&mut connection)
        })
        .await?
    }

    /// Flushes and closes the connection. Other live clones keep it open instead.
    pub fn close(self) -> Result<(), StorageError> {
        let Ok(connection) = Arc::try_unwrap(self.connection) else {
            warn!("Database still in use, connection closes with its last handle");
            return Ok(());
        };

        connection
            .into_inner()
            .map_err(|_| StorageError::LockPoisoned)?
            .close()
            .map_err(|(_, e)| StorageError::Sqlite(e))?;

        info!("Database closed");
        Ok(())
    }
}
