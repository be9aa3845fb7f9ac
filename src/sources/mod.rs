//! External market data collaborators
//!
//! Positions, asset pairs, interest rates and quotes are owned by the trading
//! backend and consumed read-only.

pub mod error;
pub mod http;
pub mod memory;
pub mod types;

pub use error::SourceError;
pub use http::BackendClient;
pub use memory::InMemoryMarketData;
pub use types::{AssetPair, InterestRate, OpenPosition, PositionDirection};

use async_trait::async_trait;
use rust_decimal::Decimal;

#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Every currently open position
    async fn get_active(&self) -> Result<Vec<OpenPosition>, SourceError>;
}

#[async_trait]
pub trait AssetPairSource: Send + Sync {
    async fn list(&self) -> Result<Vec<AssetPair>, SourceError>;
}

#[async_trait]
pub trait InterestRateSource: Send + Sync {
    async fn get_all_latest(&self) -> Result<Vec<InterestRate>, SourceError>;
}

#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Rate converting `instrument`'s quote asset into `asset`.
    /// `None` when no quote is known.
    async fn quote_rate_for_quote_asset(
        &self,
        asset: &str,
        instrument: &str,
        legal_entity: &str,
    ) -> Result<Option<Decimal>, SourceError>;

    /// Rate converting `from_asset` into `to_asset`
    async fn quote(
        &self,
        from_asset: &str,
        to_asset: &str,
        legal_entity: &str,
    ) -> Result<Option<Decimal>, SourceError>;
}
