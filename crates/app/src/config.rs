use serde::{Deserialize, Serialize};
use thiserror::Error;

use seatwise_infra::command_dispatcher::DEFAULT_CONFLICT_RETRIES;

pub const MAX_CONFLICT_RETRIES_VAR: &str = "SEATWISE_MAX_CONFLICT_RETRIES";
pub const LOG_VAR: &str = "SEATWISE_LOG";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Engine settings: defaults overridden by environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Extra attempts after an optimistic-concurrency conflict.
    pub max_conflict_retries: u32,
    /// Tracing filter directive; `RUST_LOG` applies when unset.
    pub log_filter: Option<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: DEFAULT_CONFLICT_RETRIES,
            log_filter: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(raw) = get(MAX_CONFLICT_RETRIES_VAR) {
            config.max_conflict_retries = raw.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::Invalid {
                key: MAX_CONFLICT_RETRIES_VAR,
                value: raw.clone(),
                reason: e.to_string(),
            })?;
        }

        config.log_filter = get(LOG_VAR);
        Ok(config)
    }
}
