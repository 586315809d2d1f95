//! # Option Catalog
//!
//! Fixed set of options, written once into an empty database.
//!
//! - Ids are sequential starting at 1, following the order of the list
//! - Each option gets its zero tally in the same transaction
//! - Any existing option means the catalog is already seeded, nothing is written
//! - A failure part way (duplicate or empty name) rolls everything back
use rusqlite::{Connection, TransactionBehavior, params};
use tracing::info;

use crate::{database::Database, error::StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded(i64),
    AlreadySeeded(i64),
}

pub fn option_count(connection: &Connection) -> Result<i64, StorageError> {
    Ok(connection.query_row("SELECT COUNT(*) FROM options", [], |row| row.get(0))?)
}

pub fn seed<S: AsRef<str>>(
    connection: &mut Connection,
    names: &[S],
) -> Result<SeedOutcome, StorageError> {
    if names.is_empty() {
        return Err(StorageError::InvalidCatalog("no options to seed".to_string()));
    }

    // IMMEDIATE so a second process can't see the same empty catalog
    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    let existing = option_count(&transaction)?;
    if existing > 0 {
        return Ok(SeedOutcome::AlreadySeeded(existing));
    }

    {
        let mut insert_option =
            transaction.prepare("INSERT INTO options (id, name) VALUES (?1, ?2)")?;
        let mut insert_tally =
            transaction.prepare("INSERT INTO tallies (option_id, count) VALUES (?1, 0)")?;

        for (id, name) in (1_i64..).zip(names) {
            let name: &str = name.as_ref();
            insert_option.execute(params![id, name])?;
            insert_tally.execute(params![id])?;
        }
    }

    transaction.commit()?;

    Ok(SeedOutcome::Seeded(names.len() as i64))
}

/// Seeds `names` if the catalog is empty and returns the number of stored options.
pub async fn seed_catalog(
    database: &Database,
    names: &[&'static str],
) -> Result<i64, StorageError> {
    let names = names.to_vec();

    let (outcome, count) = database
        .run(move |connection| {
            let outcome = seed(connection, names.as_slice())?;
            Ok((outcome, option_count(connection)?))
        })
        .await?;

    match outcome {
        SeedOutcome::Seeded(seeded) => info!("Seeded {seeded} options"),
        SeedOutcome::AlreadySeeded(existing) => {
            info!("Catalog already has {existing} options, skipping seed")
        }
    }

    Ok(count)
}
