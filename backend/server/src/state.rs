use std::sync::Arc;

use ballot::OPTIONS;

use super::{
    catalog::seed_catalog,
    config::Config,
    database::Database,
    error::AppError,
};

pub struct AppState {
    pub config: Config,
    pub database: Database,
    pub option_count: i64,
}

impl AppState {
    pub async fn new() -> anyhow::Result<Arc<Self>> {
        let config = Config::load()?;

        let database = Database::open(&config.database_path, config.busy_timeout)?;

        Ok(Arc::new(Self::with_database(config, database, &OPTIONS).await?))
    }

    /// Seeds `options` into `database` if its catalog is empty.
    pub async fn with_database(
        config: Config,
        database: Database,
        options: &[&'static str],
    ) -> Result<Self, AppError> {
        let option_count = seed_catalog(&database, options)
            .await
            .map_err(AppError::SeedFailure)?;

        Ok(Self {
            config,
            database,
            option_count,
        })
    }
}
