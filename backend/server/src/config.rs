use std::{env, fmt::Display, path::PathBuf, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug)]
#[error("Invalid {key} value: {reason}")]
pub struct ConfigError {
    key: &'static str,
    reason: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: PathBuf,
    pub busy_timeout: Duration,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        Ok(Self {
            port: try_load("PORT", "3000")?,
            database_path: try_load("DATABASE_PATH", "data.db")?,
            busy_timeout: Duration::from_millis(try_load("DATABASE_BUSY_TIMEOUT_MS", "5000")?),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            database_path: PathBuf::from("data.db"),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    let value = env::var(key).unwrap_or_else(|_| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    parse(key, &value)
}

fn parse<T: FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    value.trim().parse().map_err(|e: T::Err| {
        warn!("Invalid {key} value: {e}");

        ConfigError {
            key,
            reason: e.to_string(),
        }
    })
}
