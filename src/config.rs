use dotenvy::dotenv;
use eyre::{Result, WrapErr, bail};
use std::env;
use std::net::SocketAddr;
use std::time::Duration;

const DEFAULT_REDIS_URL: &str = "redis://redis:6379";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_STORE_TIMEOUT_MS: u64 = 2000;
const SNAPSHOT_KEY_PREFIX: &str = "portfolio_snapshot";

#[derive(Debug, Clone)]
pub struct Config {
    pub mode: String,
    pub redis_url: String,
    pub snapshot_key_prefix: String,
    pub store_timeout: Option<Duration>, // None disables the bound
    pub bind_addr: SocketAddr,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from any key lookup, so values can come from somewhere other than the process env.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mode = lookup("MODE").unwrap_or_else(|| "test".to_string());

        // Test runs write under their own namespace so they never clobber prod snapshots
        let default_prefix = match mode.as_str() {
            "test" => format!("test:{}", SNAPSHOT_KEY_PREFIX),
            "prod" => SNAPSHOT_KEY_PREFIX.to_string(),
            _ => bail!("Invalid MODE value '{}' (must be 'test' or 'prod')", mode),
        };

        let redis_url = lookup("REDIS_URL").unwrap_or_else(|| DEFAULT_REDIS_URL.to_string());
        let snapshot_key_prefix = lookup("SNAPSHOT_KEY_PREFIX")
            .filter(|prefix| !prefix.is_empty())
            .unwrap_or(default_prefix);

        let timeout_ms = match lookup("STORE_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .wrap_err_with(|| format!("Invalid STORE_TIMEOUT_MS '{}'", raw))?,
            None => DEFAULT_STORE_TIMEOUT_MS,
        };
        let store_timeout = (timeout_ms > 0).then(|| Duration::from_millis(timeout_ms));

        let bind_raw = lookup("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .wrap_err_with(|| format!("Invalid BIND_ADDR '{}'", bind_raw))?;

        Ok(Config {
            mode,
            redis_url,
            snapshot_key_prefix,
            store_timeout,
            bind_addr,
        })
    }
}
