//! Redis connection shared by the fast cache and the distributed lock

use redis::Client;
use redis::aio::MultiplexedConnection;

/// Cloneable handle over one multiplexed connection
#[derive(Clone)]
pub struct RedisConnection {
    conn: MultiplexedConnection,
}

impl RedisConnection {
    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = Client::open(redis_url)?;
        let conn = client.get_multiplexed_async_connection().await?;

        tracing::info!("Redis multiplexed connection established");
        Ok(Self { conn })
    }

    /// Connections are multiplexed, so a clone per call is cheap
    pub fn connection(&self) -> MultiplexedConnection {
        self.conn.clone()
    }

    pub async fn health_check(&self) -> Result<(), redis::RedisError> {
        let mut conn = self.connection();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }
}
