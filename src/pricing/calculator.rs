//! Commission pricing against live rate settings and quotes

use rust_decimal::Decimal;
use std::sync::Arc;

use super::error::CalculationError;
use super::formulas;
use crate::rates::RateSettingsService;
use crate::sources::QuoteSource;

pub struct CommissionCalculator {
    rates: Arc<RateSettingsService>,
    quotes: Arc<dyn QuoteSource>,
}

impl CommissionCalculator {
    pub fn new(rates: Arc<RateSettingsService>, quotes: Arc<dyn QuoteSource>) -> Self {
        Self { rates, quotes }
    }

    /// Commission for executing `volume` of `instrument`, in the rate's
    /// commission asset
    pub async fn order_execution_commission(
        &self,
        instrument: &str,
        legal_entity: &str,
        volume: Decimal,
    ) -> Result<Decimal, CalculationError> {
        let rate = self.rates.get_order_execution_rate(instrument).await?;
        let quote_rate = self
            .quotes
            .quote_rate_for_quote_asset(&rate.commission_asset, instrument, legal_entity)
            .await?
            .ok_or_else(|| CalculationError::FxRateNotFound {
                from: instrument.to_string(),
                to: rate.commission_asset.clone(),
            })?;

        Ok(formulas::order_execution_commission(quote_rate, volume, &rate))
    }

    /// Commission for `actions` on-behalf actions, converted into the
    /// account's asset
    pub async fn on_behalf_commission(
        &self,
        actions: u32,
        account_asset_id: &str,
    ) -> Result<Decimal, CalculationError> {
        let rate = self.rates.get_on_behalf_rate().await?;
        let legal_entity = rate.legal_entity.clone().unwrap_or_default();
        let quote = self
            .quotes
            .quote(&rate.commission_asset, account_asset_id, &legal_entity)
            .await?
            .ok_or_else(|| CalculationError::FxRateNotFound {
                from: rate.commission_asset.clone(),
                to: account_asset_id.to_string(),
            })?;

        Ok(formulas::on_behalf_commission(actions, rate.commission, quote))
    }
}
