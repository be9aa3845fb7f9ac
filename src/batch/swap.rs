//! Overnight swap flavor

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use super::engine::BatchFlavor;
use super::error::BatchError;
use super::types::{BatchKind, ItemCalculation};
use crate::pricing::{self, CalculationError, DEFAULT_FINANCING_DAYS_PER_YEAR};
use crate::rates::RateSettingsService;
use crate::sources::{AssetPair, AssetPairSource, InterestRateSource, OpenPosition, QuoteSource};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapParameters {
    pub number_of_financing_days: u32,
    pub financing_days_per_year: u32,
}

impl Default for SwapParameters {
    fn default() -> Self {
        Self {
            number_of_financing_days: 1,
            financing_days_per_year: DEFAULT_FINANCING_DAYS_PER_YEAR,
        }
    }
}

/// Loaded once per run
pub struct SwapContext {
    asset_pairs: HashMap<String, AssetPair>,
    interest_rates: HashMap<String, Decimal>,
}

pub struct OvernightSwapFlavor {
    rates: Arc<RateSettingsService>,
    asset_pairs: Arc<dyn AssetPairSource>,
    interest_rates: Arc<dyn InterestRateSource>,
    quotes: Arc<dyn QuoteSource>,
}

impl OvernightSwapFlavor {
    pub fn new(
        rates: Arc<RateSettingsService>,
        asset_pairs: Arc<dyn AssetPairSource>,
        interest_rates: Arc<dyn InterestRateSource>,
        quotes: Arc<dyn QuoteSource>,
    ) -> Self {
        Self {
            rates,
            asset_pairs,
            interest_rates,
            quotes,
        }
    }
}

#[async_trait]
impl BatchFlavor for OvernightSwapFlavor {
    type Parameters = SwapParameters;
    type Context = SwapContext;

    fn kind(&self) -> BatchKind {
        BatchKind::OvernightSwap
    }

    async fn prepare(&self, _parameters: &SwapParameters) -> Result<SwapContext, BatchError> {
        let asset_pairs = self
            .asset_pairs
            .list()
            .await?
            .into_iter()
            .map(|pair| (pair.id.clone(), pair))
            .collect();
        let interest_rates = self
            .interest_rates
            .get_all_latest()
            .await?
            .into_iter()
            .map(|rate| (rate.id, rate.rate))
            .collect();

        Ok(SwapContext {
            asset_pairs,
            interest_rates,
        })
    }

    async fn calculate(
        &self,
        context: &SwapContext,
        position: &OpenPosition,
        parameters: &SwapParameters,
    ) -> Result<ItemCalculation, CalculationError> {
        let pair = context
            .asset_pairs
            .get(&position.asset_pair_id)
            .ok_or_else(|| CalculationError::AssetPairNotFound(position.asset_pair_id.clone()))?;

        let rate = self.rates.get_overnight_swap_rate(&pair.id).await?;
        let quote_rate = self
            .quotes
            .quote_rate_for_quote_asset(&rate.commission_asset, &pair.id, &pair.legal_entity)
            .await?
            .ok_or_else(|| CalculationError::FxRateNotFound {
                from: pair.quote_asset_id.clone(),
                to: rate.commission_asset.clone(),
            })?;

        let (swap, details) = pricing::overnight_swap(
            quote_rate,
            position.current_volume,
            position.direction,
            &rate,
            &context.interest_rates,
            parameters.number_of_financing_days,
            parameters.financing_days_per_year,
        )?;

        Ok(ItemCalculation {
            amount: swap,
            fx_rate: quote_rate,
            details: serde_json::to_string(&details).ok(),
        })
    }
}
