use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError};
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::Config;

/// Process-wide Redis handle. The multiplexed connection is opened on first use
/// and then cloned for every call; a failed open leaves the cell empty so the
/// next call tries again.
pub struct RedisConnection {
    client: Client,
    connection: OnceCell<MultiplexedConnection>,
}

impl RedisConnection {
    pub fn open(config: &Config) -> Result<Self, RedisError> {
        let client = Client::open(config.redis_url.as_str())?;

        Ok(Self {
            client,
            connection: OnceCell::new(),
        })
    }

    pub async fn get(&self) -> Result<MultiplexedConnection, RedisError> {
        let connection = self
            .connection
            .get_or_try_init(|| async {
                info!("Opening multiplexed Redis connection");
                self.client.get_multiplexed_async_connection().await
            })
            .await?;

        Ok(connection.clone())
    }
}
