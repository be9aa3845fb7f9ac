//! Rate Settings
//!
//! Read-through / write-through settings cache per kind:
//!
//! ```text
//! get:     fast cache ──miss──▶ durable store (whole kind) ──miss──▶ static default
//!              ▲                        │                                 │
//!              └──── repopulate ────────┘                 cache this key only
//! replace: validate → merge durable → rebuild fast cache → RateSettingsChanged
//! ```

pub mod cache;
pub mod db;
pub mod error;
pub mod service;
pub mod store;
pub mod types;

pub use cache::{FastCache, InMemoryFastCache, RedisFastCache};
pub use db::PgSettingsStore;
pub use error::{CacheError, RateSettingsError};
pub use service::RateSettingsService;
pub use store::{InMemorySettingsStore, SettingsStore};
pub use types::{
    CACHE_KEY_PREFIX, ON_BEHALF_KEY, OnBehalfRate, OrderExecutionRate, OvernightSwapRate,
    RateKind, RateSetting,
};
