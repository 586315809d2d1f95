//! # Voter Registry
//!
//! Identities that already voted. Insert-only.
//!
//! The `voters.identity` primary key decides who got there first: the insert either adds a row
//! or hits the conflict clause and changes nothing, in one statement. Callers run it inside the
//! vote transaction so a later failure also removes the row.
use rusqlite::{Connection, params};

use crate::error::StorageError;

/// Returns `true` if `identity` was newly registered, `false` if it had already voted.
pub fn register_if_absent(
    connection: &Connection,
    identity: &str,
    voted_at: &str,
) -> Result<bool, StorageError> {
    let inserted = connection.execute(
        "INSERT INTO voters (identity, voted_at) VALUES (?1, ?2)
         ON CONFLICT (identity) DO NOTHING",
        params![identity, voted_at],
    )?;

    Ok(inserted == 1)
}

pub fn voter_count(connection: &Connection) -> Result<u64, StorageError> {
    Ok(connection.query_row("SELECT COUNT(*) FROM voters", [], |row| row.get(0))?)
}
