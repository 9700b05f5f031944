use std::time::Duration;
use thiserror::Error;

/// Errors raised by a snapshot store. Never returned verbatim to HTTP callers.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Malformed snapshot record: {0}")]
    Decode(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}
