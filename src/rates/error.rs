use thiserror::Error;

use crate::events::EventError;

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),
}

#[derive(Error, Debug)]
pub enum RateSettingsError {
    #[error("Invalid rate settings: {0}")]
    Validation(String),

    #[error("Fast cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Durable store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("Rate serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to publish settings change: {0}")]
    Publish(#[from] EventError),
}
