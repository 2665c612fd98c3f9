//! Client configuration parsed from environment variables.

use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_MAX_TOKENS: u32 = 100;
pub const MIN_MAX_TOKENS: u32 = 10;
pub const MAX_MAX_TOKENS: u32 = 2000;

const STATE_DIR: &str = ".pocket-portal";
const STATE_FILE: &str = "state.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request_secs: u64,
    pub connect_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self { request_secs: DEFAULT_REQUEST_TIMEOUT_SECS, connect_secs: DEFAULT_CONNECT_TIMEOUT_SECS }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortalConfig {
    pub base_url: String,
    pub timeouts: Timeouts,
    pub max_tokens: u32,
    pub state_file: PathBuf,
}

impl PortalConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `POCKET_BASE_URL`: default `http://localhost:8000`
    /// - `POCKET_REQUEST_TIMEOUT_SECS`: default 30
    /// - `POCKET_CONNECT_TIMEOUT_SECS`: default 10
    /// - `POCKET_MAX_TOKENS`: default 100, accepted range 10..=2000
    /// - `POCKET_STATE_FILE`: default `$HOME/.pocket-portal/state.json`
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("POCKET_BASE_URL")
            .unwrap_or_else(|_| DEFAULT_BASE_URL.to_owned())
            .trim_end_matches('/')
            .to_owned();
        let timeouts = Timeouts {
            request_secs: env_parse("POCKET_REQUEST_TIMEOUT_SECS", DEFAULT_REQUEST_TIMEOUT_SECS)?,
            connect_secs: env_parse("POCKET_CONNECT_TIMEOUT_SECS", DEFAULT_CONNECT_TIMEOUT_SECS)?,
        };
        let max_tokens = validate_max_tokens(env_parse("POCKET_MAX_TOKENS", DEFAULT_MAX_TOKENS)?)?;
        let state_file = std::env::var_os("POCKET_STATE_FILE").map_or_else(default_state_file, PathBuf::from);

        Ok(Self { base_url, timeouts, max_tokens, state_file })
    }
}

/// Reject token budgets outside `MIN_MAX_TOKENS..=MAX_MAX_TOKENS`.
pub fn validate_max_tokens(value: u32) -> Result<u32, ConfigError> {
    if (MIN_MAX_TOKENS..=MAX_MAX_TOKENS).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Parse(format!(
            "max tokens {value} out of range ({MIN_MAX_TOKENS}..={MAX_MAX_TOKENS})"
        )))
    }
}

fn env_parse<T>(key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|_| ConfigError::Parse(format!("invalid {key}: {raw}"))),
        Err(_) => Ok(default),
    }
}

fn default_state_file() -> PathBuf {
    std::env::var_os("HOME")
        .map_or_else(|| PathBuf::from("."), PathBuf::from)
        .join(STATE_DIR)
        .join(STATE_FILE)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
