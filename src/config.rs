use std::{env, fmt::Display, str::FromStr, time::Duration};

use thiserror::Error;
use tracing::info;

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 2000;
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid {key} value {value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub bind_address: String,
    pub snapshot_interval: Duration,
    pub admin_emails: Vec<String>,
}

impl Config {
    /// Reads configuration from the process environment. Call `dotenv` first
    /// to pick up a local `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;
        let snapshot_interval_ms: u64 = try_load(
            &lookup,
            "SNAPSHOT_INTERVAL_MS",
            DEFAULT_SNAPSHOT_INTERVAL_MS,
        )?;
        if snapshot_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                key: "SNAPSHOT_INTERVAL_MS",
                value: "0".to_owned(),
                reason: "interval must be positive".to_owned(),
            });
        }

        Ok(Self {
            database_url,
            database_max_connections: try_load(
                &lookup,
                "DATABASE_MAX_CONNECTIONS",
                DEFAULT_MAX_CONNECTIONS,
            )?,
            bind_address: lookup("BIND_ADDRESS").unwrap_or_else(|| DEFAULT_BIND_ADDRESS.to_owned()),
            snapshot_interval: Duration::from_millis(snapshot_interval_ms),
            admin_emails: lookup("ADMIN_EMAILS")
                .map(|emails| parse_emails(&emails))
                .unwrap_or_default(),
        })
    }
}

fn try_load<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + Display,
    T::Err: Display,
{
    match lookup(key) {
        Some(value) => value.trim().parse().map_err(|err: T::Err| ConfigError::Invalid {
            key,
            value,
            reason: err.to_string(),
        }),
        None => {
            info!("{key} not set, using default: {default}", key = key, default = default);
            Ok(default)
        }
    }
}

fn parse_emails(emails: &str) -> Vec<String> {
    emails
        .split(',')
        .map(str::trim)
        .filter(|email| !email.is_empty())
        .map(str::to_lowercase)
        .collect()
}
