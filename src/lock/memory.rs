use std::time::{Duration, Instant};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use super::{DistributedLock, LockError};

struct Lease {
    holder: String,
    expires_at: Instant,
}

/// Process-local lock for single-instance deployments and tests
#[derive(Default)]
pub struct InMemoryLock {
    leases: DashMap<String, Lease>,
}

impl InMemoryLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedLock for InMemoryLock {
    async fn try_acquire(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<bool, LockError> {
        let lease = Lease {
            holder: holder.to_string(),
            expires_at: Instant::now() + ttl,
        };

        match self.leases.entry(key.to_string()) {
            Entry::Occupied(mut held) => {
                if held.get().expires_at > Instant::now() {
                    return Ok(false);
                }
                held.insert(lease);
                Ok(true)
            }
            Entry::Vacant(slot) => {
                slot.insert(lease);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &str, holder: &str) -> Result<(), LockError> {
        self.leases.remove_if(key, |_, lease| lease.holder == holder);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_second_acquire_fails() {
        let lock = InMemoryLock::new();
        let ttl = Duration::from_secs(60);

        assert!(lock.try_acquire("k", "a", ttl).await.unwrap());
        assert!(!lock.try_acquire("k", "b", ttl).await.unwrap());
        // Not reentrant either
        assert!(!lock.try_acquire("k", "a", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_release_by_other_holder_is_noop() {
        let lock = InMemoryLock::new();
        let ttl = Duration::from_secs(60);

        assert!(lock.try_acquire("k", "a", ttl).await.unwrap());
        lock.release("k", "b").await.unwrap();
        assert!(!lock.try_acquire("k", "b", ttl).await.unwrap());

        lock.release("k", "a").await.unwrap();
        assert!(lock.try_acquire("k", "b", ttl).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lease_can_be_taken() {
        let lock = InMemoryLock::new();

        assert!(
            lock.try_acquire("k", "a", Duration::from_millis(10))
                .await
                .unwrap()
        );
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(lock.try_acquire("k", "b", Duration::from_secs(60)).await.unwrap());
    }
}
