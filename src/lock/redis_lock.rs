//! Redis-backed lock: `SET key holder NX PX ttl`, compare-and-delete on release

use std::time::Duration;

use async_trait::async_trait;
use redis::Script;

use super::{DistributedLock, LockError};
use crate::db::RedisConnection;

/// Deletes the key only while it still carries our holder id
const RELEASE_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

pub struct RedisLock {
    redis: RedisConnection,
    release_script: Script,
}

impl RedisLock {
    pub fn new(redis: RedisConnection) -> Self {
        Self {
            redis,
            release_script: Script::new(RELEASE_SCRIPT),
        }
    }
}

#[async_trait]
impl DistributedLock for RedisLock {
    async fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let mut conn = self.redis.connection();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(holder)
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await?;

        Ok(reply.is_some())
    }

    async fn release(&self, key: &str, holder: &str) -> Result<(), LockError> {
        let mut conn = self.redis.connection();
        let deleted: i64 = self
            .release_script
            .key(key)
            .arg(holder)
            .invoke_async(&mut conn)
            .await?;

        if deleted == 0 {
            tracing::warn!(lock = key, holder, "Lock was no longer ours at release");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_REDIS_URL: &str = "redis://127.0.0.1:6379/";

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_redis_lock_exclusive() {
        let redis = RedisConnection::connect(TEST_REDIS_URL).await.unwrap();
        let lock = RedisLock::new(redis);
        let key = format!("CommissionService:LockTest:{}", uuid::Uuid::new_v4());
        let ttl = Duration::from_secs(30);

        assert!(lock.try_acquire(&key, "a", ttl).await.unwrap());
        assert!(!lock.try_acquire(&key, "b", ttl).await.unwrap());

        lock.release(&key, "b").await.unwrap();
        assert!(!lock.try_acquire(&key, "b", ttl).await.unwrap());

        lock.release(&key, "a").await.unwrap();
        assert!(lock.try_acquire(&key, "b", ttl).await.unwrap());
        lock.release(&key, "b").await.unwrap();
    }
}
