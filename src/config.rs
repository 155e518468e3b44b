//! Environment-driven configuration, resolved once at startup.

use std::time::Duration;

use crate::error::{PipelineError, Result};

pub const ENV_SERVER: &str = "AZ_SQLSERVER";
pub const ENV_DATABASE: &str = "AZ_DBNAME";
pub const ENV_USER: &str = "AZ_SQLUSER";
pub const ENV_PASSWORD: &str = "AZ_SQLPASSWORD";
/// Optional override for the connect timeout, in whole seconds.
pub const ENV_TIMEOUT: &str = "AZ_SQLTIMEOUT";

const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 30;

/// Resolved connection settings, passed by reference to every phase.
#[derive(Debug, Clone)]
pub struct Config {
    pub server: String,
    pub database: String,
    pub user: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl Config {
    /// Read the pipeline configuration from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build a config from an arbitrary name-to-value lookup. An unset or
    /// empty required variable is an error; credentials never get defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &'static str| -> Result<String> {
            match lookup(name) {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(PipelineError::MissingConfiguration { name }),
            }
        };

        let server = required(ENV_SERVER)?;
        let database = required(ENV_DATABASE)?;
        let user = required(ENV_USER)?;
        let password = required(ENV_PASSWORD)?;

        let connect_timeout = match lookup(ENV_TIMEOUT) {
            Some(raw) => {
                let secs = raw.trim().parse::<u64>().map_err(|_| {
                    PipelineError::InvalidConfiguration {
                        name: ENV_TIMEOUT,
                        value: raw.clone(),
                    }
                })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        };

        Ok(Config {
            server,
            database,
            user,
            password,
            connect_timeout,
        })
    }
}
