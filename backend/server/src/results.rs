//! # Results
//!
//! Read path. Returns the tally snapshot as is, never writes.
use ballot::payloads::{OptionResult, Results};

use crate::{
    database::Database,
    error::StorageError,
    tally::{Snapshot, snapshot},
};

pub async fn get_results(database: &Database) -> Result<Snapshot, StorageError> {
    database.run(snapshot).await
}

impl From<Snapshot> for Results {
    fn from(snapshot: Snapshot) -> Self {
        Self {
            total: snapshot.total,
            resultados: snapshot
                .options
                .into_iter()
                .map(|option| OptionResult {
                    id: option.id,
                    nombre: option.name,
                    cantidad: option.count,
                })
                .collect(),
        }
    }
}
