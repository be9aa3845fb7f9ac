//! Fast cache: one hash of JSON values per namespace

use std::collections::HashMap;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;

use super::error::CacheError;
use crate::db::RedisConnection;

/// Volatile key/value hashes, rebuildable from the durable store
#[async_trait]
pub trait FastCache: Send + Sync {
    async fn get(&self, namespace: &str, field: &str) -> Result<Option<String>, CacheError>;

    async fn get_all(&self, namespace: &str) -> Result<HashMap<String, String>, CacheError>;

    async fn set(&self, namespace: &str, field: &str, value: String) -> Result<(), CacheError>;

    /// Replace the whole namespace with `entries` in one step
    async fn replace_all(
        &self,
        namespace: &str,
        entries: Vec<(String, String)>,
    ) -> Result<(), CacheError>;
}

#[derive(Default)]
pub struct InMemoryFastCache {
    hashes: DashMap<String, HashMap<String, String>>,
}

impl InMemoryFastCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FastCache for InMemoryFastCache {
    async fn get(&self, namespace: &str, field: &str) -> Result<Option<String>, CacheError> {
        Ok(self
            .hashes
            .get(namespace)
            .and_then(|hash| hash.get(field).cloned()))
    }

    async fn get_all(&self, namespace: &str) -> Result<HashMap<String, String>, CacheError> {
        Ok(self
            .hashes
            .get(namespace)
            .map(|hash| hash.clone())
            .unwrap_or_default())
    }

    async fn set(&self, namespace: &str, field: &str, value: String) -> Result<(), CacheError> {
        self.hashes
            .entry(namespace.to_string())
            .or_default()
            .insert(field.to_string(), value);
        Ok(())
    }

    async fn replace_all(
        &self,
        namespace: &str,
        entries: Vec<(String, String)>,
    ) -> Result<(), CacheError> {
        if entries.is_empty() {
            self.hashes.remove(namespace);
        } else {
            self.hashes
                .insert(namespace.to_string(), entries.into_iter().collect());
        }
        Ok(())
    }
}

/// Redis hashes (`HGET` / `HGETALL` / `HSET`)
pub struct RedisFastCache {
    redis: RedisConnection,
}

impl RedisFastCache {
    pub fn new(redis: RedisConnection) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl FastCache for RedisFastCache {
    async fn get(&self, namespace: &str, field: &str) -> Result<Option<String>, CacheError> {
        let mut conn = self.redis.connection();
        let value: Option<String> = conn.hget(namespace, field).await?;
        Ok(value)
    }

    async fn get_all(&self, namespace: &str) -> Result<HashMap<String, String>, CacheError> {
        let mut conn = self.redis.connection();
        let values: HashMap<String, String> = conn.hgetall(namespace).await?;
        Ok(values)
    }

    async fn set(&self, namespace: &str, field: &str, value: String) -> Result<(), CacheError> {
        let mut conn = self.redis.connection();
        let _: () = conn.hset(namespace, field, value).await?;
        Ok(())
    }

    async fn replace_all(
        &self,
        namespace: &str,
        entries: Vec<(String, String)>,
    ) -> Result<(), CacheError> {
        let mut conn = self.redis.connection();
        let mut pipe = redis::pipe();
        pipe.atomic().del(namespace).ignore();
        // HSET with no fields is a syntax error
        if !entries.is_empty() {
            pipe.hset_multiple(namespace, &entries).ignore();
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_replace_all_drops_stale_fields() {
        let cache = InMemoryFastCache::new();
        cache.set("ns", "old", "1".to_string()).await.unwrap();

        cache
            .replace_all("ns", vec![("new".to_string(), "2".to_string())])
            .await
            .unwrap();

        assert_eq!(cache.get("ns", "old").await.unwrap(), None);
        assert_eq!(cache.get("ns", "new").await.unwrap().as_deref(), Some("2"));
        assert_eq!(cache.get_all("ns").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_namespaces_are_independent() {
        let cache = InMemoryFastCache::new();
        cache.set("a", "k", "1".to_string()).await.unwrap();

        assert_eq!(cache.get("b", "k").await.unwrap(), None);
        assert!(cache.get_all("b").await.unwrap().is_empty());
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_redis_fast_cache_roundtrip() {
        let redis = RedisConnection::connect("redis://127.0.0.1:6379/")
            .await
            .unwrap();
        let cache = RedisFastCache::new(redis);
        let ns = format!("CommissionService:CacheTest:{}", uuid::Uuid::new_v4());

        cache.set(&ns, "stale", "0".to_string()).await.unwrap();
        cache
            .replace_all(&ns, vec![("EURUSD".to_string(), "{}".to_string())])
            .await
            .unwrap();

        assert_eq!(cache.get(&ns, "stale").await.unwrap(), None);
        assert_eq!(cache.get(&ns, "EURUSD").await.unwrap().as_deref(), Some("{}"));
        cache.replace_all(&ns, Vec::new()).await.unwrap();
    }
}
