use crate::solver::{SolverSettings, DEFAULT_TIME_BUDGET};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub const ENV_ADDR: &str = "SHIFT_SCHEDULER_ADDR";
pub const ENV_DB: &str = "SHIFT_SCHEDULER_DB";
pub const ENV_TIME_BUDGET: &str = "SHIFT_SCHEDULER_TIME_BUDGET_SECS";
pub const ENV_LOG: &str = "SHIFT_SCHEDULER_LOG";

const DEFAULT_ADDR: &str = "127.0.0.1:8080";
const DEFAULT_DB: &str = "shift_scheduler.db";
const DEFAULT_LOG: &str = "info";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
}

/// Runtime settings, read from the environment with defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub database_path: String,
    pub solver: SolverSettings,
    /// Default `env_logger` filter; `RUST_LOG` still wins when set.
    pub log_filter: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let addr = lookup(ENV_ADDR).unwrap_or_else(|| DEFAULT_ADDR.to_string());
        let bind_addr = addr.parse().map_err(|_| ConfigError::InvalidValue {
            key: ENV_ADDR,
            value: addr.clone(),
        })?;

        let time_budget = match lookup(ENV_TIME_BUDGET) {
            Some(raw) => raw
                .parse::<f64>()
                .ok()
                .filter(|secs| *secs > 0.0)
                .and_then(|secs| Duration::try_from_secs_f64(secs).ok())
                .ok_or(ConfigError::InvalidValue {
                    key: ENV_TIME_BUDGET,
                    value: raw,
                })?,
            None => DEFAULT_TIME_BUDGET,
        };

        Ok(Self {
            bind_addr,
            database_path: lookup(ENV_DB).unwrap_or_else(|| DEFAULT_DB.to_string()),
            solver: SolverSettings { time_budget },
            log_filter: lookup(ENV_LOG).unwrap_or_else(|| DEFAULT_LOG.to_string()),
        })
    }
}
