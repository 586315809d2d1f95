//! # Tally Store
//!
//! One counter per option, only ever incremented.
//!
//! - `increment` is a single `UPDATE ... SET count = count + 1`, so concurrent votes for the
//!   same option can't overwrite each other
//! - No matching row means the option doesn't exist
//! - `snapshot` reads every counter in one read transaction, so it only sees committed votes
use rusqlite::{Connection, params};

use crate::error::StorageError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionTally {
    pub id: i64,
    pub name: String,
    pub count: u64,
}

/// Point-in-time view of every option, ascending by id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub options: Vec<OptionTally>,
    pub total: u64,
}

pub fn increment(connection: &Connection, option_id: i64) -> Result<(), StorageError> {
    let updated = connection.execute(
        "UPDATE tallies SET count = count + 1 WHERE option_id = ?1",
        params![option_id],
    )?;

    if updated == 0 {
        return Err(StorageError::OptionNotFound(option_id));
    }

    Ok(())
}

pub fn snapshot(connection: &mut Connection) -> Result<Snapshot, StorageError> {
    let transaction = connection.transaction()?;

    let options = {
        let mut statement = transaction.prepare(
            "SELECT o.id, o.name, t.count
             FROM options o
             JOIN tallies t ON t.option_id = o.id
             ORDER BY o.id ASC",
        )?;

        let options = statement
            .query_map([], |row| {
                Ok(OptionTally {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    count: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        options
    };

    transaction.commit()?;

    let total = options.iter().map(|option| option.count).sum();

    Ok(Snapshot { options, total })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{catalog::seed, database::Database};

    fn open() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[tokio::test]
    async fn test_increment_and_snapshot() {
        let database = open();

        let snapshot = database
            .run(|connection| {
                seed(connection, &["red", "green", "blue"])?;
                increment(connection, 2)?;
                increment(connection, 2)?;
                increment(connection, 3)?;
                snapshot(connection)
            })
            .await
            .unwrap();

        let counts: Vec<_> = snapshot
            .options
            .iter()
            .map(|option| (option.id, option.name.as_str(), option.count))
            .collect();

        assert_eq!(counts, [(1, "red", 0), (2, "green", 2), (3, "blue", 1)]);
        assert_eq!(snapshot.total, 3);
    }

    #[tokio::test]
    async fn test_increment_unknown_option() {
        let database = open();

        let (result, snapshot) = database
            .run(|connection| {
                seed(connection, &["red"])?;
                let result = increment(connection, 42);
                Ok((result, snapshot(connection)?))
            })
            .await
            .unwrap();

        assert!(matches!(result, Err(StorageError::OptionNotFound(42))));
        assert_eq!(snapshot.total, 0);
    }

    #[tokio::test]
    async fn test_snapshot_empty_catalog() {
        let database = open();

        let snapshot = database.run(snapshot).await.unwrap();

        assert_eq!(snapshot, Snapshot::default());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_increments_not_lost() {
        let database = open();
        database
            .run(|connection| seed(connection, &["only"]).map(|_| ()))
            .await
            .unwrap();

        let tasks: Vec<_> = (0..64)
            .map(|_| {
                let database = database.clone();
                tokio::spawn(async move { database.run(|connection| increment(connection, 1)).await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let snapshot = database.run(snapshot).await.unwrap();
        assert_eq!(snapshot.options[0].count, 64);
        assert_eq!(snapshot.total, 64);
    }
}
