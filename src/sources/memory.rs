//! In-process market data for single-instance runs and tests

use async_trait::async_trait;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::Mutex;

use super::error::SourceError;
use super::types::{AssetPair, InterestRate, OpenPosition};
use super::{AssetPairSource, InterestRateSource, PositionSource, QuoteSource};

#[derive(Default)]
pub struct InMemoryMarketData {
    positions: DashMap<String, OpenPosition>,
    asset_pairs: DashMap<String, AssetPair>,
    interest_rates: DashMap<String, Decimal>,
    /// (from, to) → rate
    quotes: DashMap<(String, String), Decimal>,
    unavailable: Mutex<Option<String>>,
}

impl InMemoryMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert_position(&self, position: OpenPosition) {
        self.positions.insert(position.id.clone(), position);
    }

    pub fn close_position(&self, position_id: &str) {
        self.positions.remove(position_id);
    }

    pub fn add_asset_pair(&self, pair: AssetPair) {
        self.asset_pairs.insert(pair.id.clone(), pair);
    }

    pub fn set_interest_rate(&self, id: &str, rate: Decimal) {
        self.interest_rates.insert(id.to_string(), rate);
    }

    pub fn set_quote(&self, from_asset: &str, to_asset: &str, rate: Decimal) {
        self.quotes
            .insert((from_asset.to_string(), to_asset.to_string()), rate);
    }

    /// Make every read fail with `reason` (`None` restores service)
    pub fn set_unavailable(&self, reason: Option<&str>) {
        if let Ok(mut guard) = self.unavailable.lock() {
            *guard = reason.map(str::to_string);
        }
    }

    fn check_available(&self) -> Result<(), SourceError> {
        match self.unavailable.lock() {
            Ok(guard) => match guard.as_ref() {
                Some(reason) => Err(SourceError::Unavailable(reason.clone())),
                None => Ok(()),
            },
            Err(_) => Err(SourceError::Unavailable("poisoned".to_string())),
        }
    }
}

#[async_trait]
impl PositionSource for InMemoryMarketData {
    async fn get_active(&self) -> Result<Vec<OpenPosition>, SourceError> {
        self.check_available()?;
        let mut positions: Vec<_> = self.positions.iter().map(|p| p.value().clone()).collect();
        positions.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(positions)
    }
}

#[async_trait]
impl AssetPairSource for InMemoryMarketData {
    async fn list(&self) -> Result<Vec<AssetPair>, SourceError> {
        self.check_available()?;
        Ok(self.asset_pairs.iter().map(|p| p.value().clone()).collect())
    }
}

#[async_trait]
impl InterestRateSource for InMemoryMarketData {
    async fn get_all_latest(&self) -> Result<Vec<InterestRate>, SourceError> {
        self.check_available()?;
        Ok(self
            .interest_rates
            .iter()
            .map(|r| InterestRate {
                id: r.key().clone(),
                rate: *r.value(),
            })
            .collect())
    }
}

#[async_trait]
impl QuoteSource for InMemoryMarketData {
    async fn quote_rate_for_quote_asset(
        &self,
        asset: &str,
        instrument: &str,
        legal_entity: &str,
    ) -> Result<Option<Decimal>, SourceError> {
        let quote_asset = match self.asset_pairs.get(instrument) {
            Some(pair) => pair.quote_asset_id.clone(),
            None => return Ok(None),
        };
        self.quote(&quote_asset, asset, legal_entity).await
    }

    async fn quote(
        &self,
        from_asset: &str,
        to_asset: &str,
        _legal_entity: &str,
    ) -> Result<Option<Decimal>, SourceError> {
        self.check_available()?;
        if from_asset == to_asset {
            return Ok(Some(Decimal::ONE));
        }
        if let Some(rate) = self
            .quotes
            .get(&(from_asset.to_string(), to_asset.to_string()))
        {
            return Ok(Some(*rate));
        }
        // Fall back to the inverse quote
        Ok(self
            .quotes
            .get(&(to_asset.to_string(), from_asset.to_string()))
            .filter(|rate| !rate.is_zero())
            .map(|rate| Decimal::ONE / *rate))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_quote_identity_direct_and_inverse() {
        let data = InMemoryMarketData::new();
        data.set_quote("USD", "EUR", dec!(0.5));

        assert_eq!(data.quote("EUR", "EUR", "LE").await.unwrap(), Some(dec!(1)));
        assert_eq!(data.quote("USD", "EUR", "LE").await.unwrap(), Some(dec!(0.5)));
        assert_eq!(data.quote("EUR", "USD", "LE").await.unwrap(), Some(dec!(2)));
        assert_eq!(data.quote("EUR", "CHF", "LE").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_quote_rate_for_quote_asset_uses_pair_quote_asset() {
        let data = InMemoryMarketData::new();
        data.add_asset_pair(AssetPair {
            id: "EURUSD".to_string(),
            base_asset_id: "EUR".to_string(),
            quote_asset_id: "USD".to_string(),
            legal_entity: "LE".to_string(),
        });
        data.set_quote("USD", "EUR", dec!(0.9));

        let rate = data
            .quote_rate_for_quote_asset("EUR", "EURUSD", "LE")
            .await
            .unwrap();
        assert_eq!(rate, Some(dec!(0.9)));
        assert_eq!(
            data.quote_rate_for_quote_asset("EUR", "UNKNOWN", "LE")
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn test_unavailable_source_fails_reads() {
        let data = InMemoryMarketData::new();
        data.set_unavailable(Some("maintenance"));
        assert!(matches!(
            data.get_active().await,
            Err(SourceError::Unavailable(_))
        ));

        data.set_unavailable(None);
        assert!(data.get_active().await.unwrap().is_empty());
    }
}
