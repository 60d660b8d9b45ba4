use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::warn;

use crate::model::{Feed, UnknownFeed};

pub const DEFAULT_INTERVAL_SECS: i64 = 5;
pub const MIN_INTERVAL_SECS: i64 = 1;

const DEFAULT_SYMBOL: &str = "NVDA";

pub const API_KEY_VAR: &str = "ALPACA_API_KEY";
pub const SECRET_KEY_VAR: &str = "ALPACA_SECRET_KEY";

/// Startup configuration problems. These are fatal: the poll loop never
/// starts without valid credentials.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    MissingCredentials(&'static str),
    #[error("RTD_SYMBOL must not be empty")]
    EmptySymbol,
    #[error(transparent)]
    InvalidFeed(#[from] UnknownFeed),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub secret_key: String,
    pub symbol: String,
    pub feed: Feed,
    pub snapshot_path: PathBuf,
}

impl Config {
    /// Read service configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = require_var(API_KEY_VAR)?;
        let secret_key = require_var(SECRET_KEY_VAR)?;

        let symbol = match env::var("RTD_SYMBOL") {
            Ok(s) if s.trim().is_empty() => return Err(ConfigError::EmptySymbol),
            Ok(s) => s.trim().to_ascii_uppercase(),
            Err(_) => DEFAULT_SYMBOL.to_string(),
        };

        let feed = match env::var("RTD_FEED") {
            Ok(s) => s.parse::<Feed>()?,
            Err(_) => Feed::Iex,
        };

        let snapshot_path = match env::var("RTD_SNAPSHOT_PATH") {
            Ok(p) => PathBuf::from(p),
            Err(_) => env::temp_dir().join(format!("{}_price_data.json", symbol.to_ascii_lowercase())),
        };

        Ok(Self {
            api_key,
            secret_key,
            symbol,
            feed,
            snapshot_path,
        })
    }
}

fn require_var(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or(ConfigError::MissingCredentials(name))
}

/// Resolve the poll interval from the optional CLI argument. Non-numeric
/// input falls back to the 5s default with a notice, values below 1s are
/// clamped to 1s.
pub fn resolve_interval(arg: Option<&str>) -> Duration {
    let secs = match arg {
        None => DEFAULT_INTERVAL_SECS,
        Some(raw) => match raw.trim().parse::<i64>() {
            Ok(n) if n < MIN_INTERVAL_SECS => {
                warn!("minimum poll interval is {MIN_INTERVAL_SECS}s, clamping {n}");
                MIN_INTERVAL_SECS
            }
            Ok(n) => n,
            Err(_) => {
                warn!("invalid interval '{raw}', using default {DEFAULT_INTERVAL_SECS}s");
                DEFAULT_INTERVAL_SECS
            }
        },
    };
    Duration::from_secs(secs as u64)
}
