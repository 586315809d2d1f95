//! # Voting
//!
//! One vote = one transaction.
//!
//! 1. Reject option ids outside `[1, N]` before touching the database
//! 2. Register the identity, stop with a duplicate if it already voted
//! 3. Increment the option's tally
//! 4. Commit both, or neither
//!
//! The transaction is `IMMEDIATE`, so the write lock is taken at `BEGIN` and concurrent votes
//! queue on it instead of failing at commit. Dropping the transaction before `commit` rolls
//! back the voter row as well, so an identity is never used up without its vote being counted.
use chrono::Utc;
use rusqlite::{Connection, TransactionBehavior};
use tracing::debug;

use crate::{
    database::Database,
    error::{StorageError, VoteError},
    registry::register_if_absent,
    tally::increment,
};

/// Matches SQLite's `datetime('now')`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VoteReceipt {
    pub option_id: i64,
    pub voted_at: String,
}

pub async fn cast_vote(
    database: &Database,
    option_count: i64,
    option_id: i64,
    identity: String,
) -> Result<VoteReceipt, VoteError> {
    if !(1..=option_count).contains(&option_id) {
        return Err(VoteError::InvalidOption(option_id));
    }

    let voted_at = Utc::now().format(TIMESTAMP_FORMAT).to_string();

    let registered = database
        .run({
            let voted_at = voted_at.clone();
            move |connection| commit_vote(connection, option_id, &identity, &voted_at)
        })
        .await?;

    if !registered {
        debug!("Duplicate vote for option {option_id}");
        return Err(VoteError::DuplicateVote);
    }

    debug!("Vote registered for option {option_id}");

    Ok(VoteReceipt {
        option_id,
        voted_at,
    })
}

/// Registers `identity` and counts its vote atomically. `Ok(false)` means the identity had
/// already voted and nothing changed.
pub fn commit_vote(
    connection: &mut Connection,
    option_id: i64,
    identity: &str,
    voted_at: &str,
) -> Result<bool, StorageError> {
    let transaction = connection.transaction_with_behavior(TransactionBehavior::Immediate)?;

    if !register_if_absent(&transaction, identity, voted_at)? {
        return Ok(false);
    }

    increment(&transaction, option_id)?;

    transaction.commit()?;

    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use ballot::OPTIONS;
    use chrono::NaiveDateTime;

    use super::*;
    use crate::{
        catalog::seed_catalog,
        registry::voter_count,
        tally::{Snapshot, snapshot},
    };

    async fn seeded(database: Database) -> (Database, i64) {
        let count = seed_catalog(&database, &OPTIONS).await.unwrap();
        (database, count)
    }

    async fn state(database: &Database) -> (Snapshot, u64) {
        database
            .run(|connection| Ok((snapshot(connection)?, voter_count(connection)?)))
            .await
            .unwrap()
    }

    fn count_of(snapshot: &Snapshot, option_id: i64) -> u64 {
        snapshot
            .options
            .iter()
            .find(|option| option.id == option_id)
            .map(|option| option.count)
            .unwrap()
    }

    #[tokio::test]
    async fn test_vote_scenario() {
        let (database, n) = seeded(Database::open_in_memory().unwrap()).await;
        assert_eq!(n, 5);

        let receipt = cast_vote(&database, n, 3, "A".to_string()).await.unwrap();
        assert_eq!(receipt.option_id, 3);
        let (after_a, _) = state(&database).await;
        assert_eq!(count_of(&after_a, 3), 1);
        assert_eq!(after_a.total, 1);

        let duplicate = cast_vote(&database, n, 1, "A".to_string()).await;
        assert!(matches!(duplicate, Err(VoteError::DuplicateVote)));
        assert_eq!(state(&database).await.0, after_a);

        let out_of_range = cast_vote(&database, n, 99, "B".to_string()).await;
        assert!(matches!(out_of_range, Err(VoteError::InvalidOption(99))));
        assert_eq!(state(&database).await.0, after_a);

        cast_vote(&database, n, 3, "B".to_string()).await.unwrap();
        let (after_b, voters) = state(&database).await;
        assert_eq!(count_of(&after_b, 3), 2);
        assert_eq!(after_b.total, 2);
        assert_eq!(voters, 2);
    }

    #[tokio::test]
    async fn test_invalid_option_does_not_register() {
        let (database, n) = seeded(Database::open_in_memory().unwrap()).await;

        for option_id in [0, -1, n + 1, i64::MAX, i64::MIN] {
            let result = cast_vote(&database, n, option_id, "A".to_string()).await;
            assert!(matches!(result, Err(VoteError::InvalidOption(id)) if id == option_id));
        }

        assert_eq!(state(&database).await.1, 0);
        cast_vote(&database, n, n, "A".to_string()).await.unwrap();
    }

    #[tokio::test]
    async fn test_failed_increment_rolls_back_registration() {
        let (database, _) = seeded(Database::open_in_memory().unwrap()).await;

        let result = database
            .run(|connection| Ok(commit_vote(connection, 42, "D", "2025-01-01 00:00:00")))
            .await
            .unwrap();
        assert!(matches!(result, Err(StorageError::OptionNotFound(42))));

        let (snapshot, voters) = state(&database).await;
        assert_eq!(voters, 0);
        assert_eq!(snapshot.total, 0);

        let retried = database
            .run(|connection| commit_vote(connection, 2, "D", "2025-01-01 00:00:01"))
            .await
            .unwrap();
        assert!(retried);
    }

    #[tokio::test]
    async fn test_receipt_timestamp_format() {
        let (database, n) = seeded(Database::open_in_memory().unwrap()).await;

        let receipt = cast_vote(&database, n, 1, "E".to_string()).await.unwrap();

        assert!(NaiveDateTime::parse_from_str(&receipt.voted_at, TIMESTAMP_FORMAT).is_ok());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_distinct_identities_all_counted() {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open(dir.path().join("votes.db"), Duration::from_secs(5)).unwrap();
        let (database, n) = seeded(database).await;

        let voters = 200;
        let tasks: Vec<_> = (0..voters)
            .map(|i| {
                let database = database.clone();
                let option_id = i % n + 1;
                tokio::spawn(async move {
                    cast_vote(&database, n, option_id, format!("10.0.{}.{}", i / 256, i % 256))
                        .await
                })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        let (snapshot, registered) = state(&database).await;
        assert_eq!(snapshot.total, voters as u64);
        assert_eq!(registered, voters as u64);
        for option in &snapshot.options {
            assert_eq!(option.count, voters as u64 / n as u64);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 8)]
    async fn test_same_identity_race() {
        let (database, n) = seeded(Database::open_in_memory().unwrap()).await;

        for round in 0..20 {
            let identity = format!("C{round}");
            let tasks: Vec<_> = (0..2)
                .map(|_| {
                    let database = database.clone();
                    let identity = identity.clone();
                    tokio::spawn(async move { cast_vote(&database, n, 1, identity).await })
                })
                .collect();

            let mut registered = 0;
            let mut duplicates = 0;
            for task in tasks {
                match task.await.unwrap() {
                    Ok(_) => registered += 1,
                    Err(VoteError::DuplicateVote) => duplicates += 1,
                    Err(e) => panic!("unexpected error: {e}"),
                }
            }

            assert_eq!((registered, duplicates), (1, 1));
        }

        let (snapshot, voters) = state(&database).await;
        assert_eq!(count_of(&snapshot, 1), 20);
        assert_eq!(snapshot.total, 20);
        assert_eq!(voters, 20);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_votes_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("votes.db");

        let (database, n) = seeded(Database::open(&path, Duration::from_secs(5)).unwrap()).await;
        cast_vote(&database, n, 4, "F".to_string()).await.unwrap();
        database.close().unwrap();

        let (reopened, n) = seeded(Database::open(&path, Duration::from_secs(5)).unwrap()).await;
        assert_eq!(n, 5);

        let duplicate = cast_vote(&reopened, n, 4, "F".to_string()).await;
        assert!(matches!(duplicate, Err(VoteError::DuplicateVote)));

        let (snapshot, voters) = state(&reopened).await;
        assert_eq!(count_of(&snapshot, 4), 1);
        assert_eq!(voters, 1);
    }
}
