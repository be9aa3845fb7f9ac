//! Distributed Lock
//!
//! Cluster-wide exclusive lock with TTL. Acquisition fails fast when the lock
//! is held; there is no queueing. The guarded region is scoped by
//! [`run_exclusive`], which releases on every exit path including panics.

pub mod memory;
pub mod redis_lock;

pub use memory::InMemoryLock;
pub use redis_lock::RedisLock;

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Lock {0} is already held")]
    AlreadyHeld(String),

    #[error("Lock backend error: {0}")]
    Backend(#[from] redis::RedisError),
}

#[async_trait]
pub trait DistributedLock: Send + Sync {
    /// Acquire `key` for `holder` unless someone holds it. Never blocks.
    async fn try_acquire(&self, key: &str, holder: &str, ttl: Duration)
    -> Result<bool, LockError>;

    /// Release `key` if still held by `holder`. Releasing a lock held by
    /// someone else (e.g. after TTL expiry) is a no-op.
    async fn release(&self, key: &str, holder: &str) -> Result<(), LockError>;
}

/// Acquire, run `body`, always release.
///
/// Returns [`LockError::AlreadyHeld`] without polling `body` when the lock is
/// taken. A panic inside `body` is resumed after the release.
pub async fn run_exclusive<F, T>(
    lock: &dyn DistributedLock,
    key: &str,
    holder: &str,
    ttl: Duration,
    body: F,
) -> Result<T, LockError>
where
    F: Future<Output = T>,
{
    if !lock.try_acquire(key, holder, ttl).await? {
        tracing::warn!(lock = key, holder, "Lock already held, refusing to run");
        return Err(LockError::AlreadyHeld(key.to_string()));
    }
    tracing::info!(lock = key, holder, ttl_secs = ttl.as_secs(), "Lock acquired");

    let outcome = AssertUnwindSafe(body).catch_unwind().await;

    match lock.release(key, holder).await {
        Ok(()) => tracing::info!(lock = key, holder, "Lock released"),
        // The TTL still bounds how long the lock can outlive us
        Err(e) => tracing::error!(lock = key, holder, error = %e, "Failed to release lock"),
    }

    match outcome {
        Ok(value) => Ok(value),
        Err(panic) => std::panic::resume_unwind(panic),
    }
}
