//! Rate settings kinds

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt;

use super::error::RateSettingsError;
use crate::config::DefaultRateSettings;
use crate::core_types::AssetPairId;

/// Fast-cache namespace prefix, one hash per kind below it
pub const CACHE_KEY_PREFIX: &str = "CommissionService:RateSettings";

/// Natural key of the singleton on-behalf rate
pub const ON_BEHALF_KEY: &str = "OnBehalf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateKind {
    OrderExecution,
    OvernightSwap,
    OnBehalf,
}

impl RateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateKind::OrderExecution => "OrderExecution",
            RateKind::OvernightSwap => "OvernightSwap",
            RateKind::OnBehalf => "OnBehalf",
        }
    }

    /// Fast-cache hash holding every rate of this kind
    pub fn cache_key(&self) -> String {
        format!("{}:{}", CACHE_KEY_PREFIX, self.as_str())
    }
}

impl fmt::Display for RateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Shared shape of every settings kind handled by
/// [`super::RateSettingsService`].
pub trait RateSetting: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {
    const KIND: RateKind;

    /// Natural key: asset pair id, or [`ON_BEHALF_KEY`] for the singleton
    fn key(&self) -> String;

    /// Synthesize a rate for `key` from static configuration
    fn from_default(defaults: &DefaultRateSettings, key: &str) -> Self;

    /// Required-field and range checks applied on write
    fn validate(&self) -> Result<(), RateSettingsError>;

    fn legal_entity_mut(&mut self) -> &mut Option<String>;
}

fn require(value: &str, field: &str) -> Result<(), RateSettingsError> {
    if value.trim().is_empty() {
        return Err(RateSettingsError::Validation(format!("{field} is required")));
    }
    Ok(())
}

fn non_negative(value: Decimal, field: &str) -> Result<(), RateSettingsError> {
    if value < Decimal::ZERO {
        return Err(RateSettingsError::Validation(format!(
            "{field} must not be negative, got {value}"
        )));
    }
    Ok(())
}

/// Per asset pair order execution commission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderExecutionRate {
    pub asset_pair_id: AssetPairId,
    pub commission_cap: Decimal,
    pub commission_floor: Decimal,
    pub commission_rate: Decimal,
    pub commission_asset: String,
    #[serde(default)]
    pub legal_entity: Option<String>,
}

impl RateSetting for OrderExecutionRate {
    const KIND: RateKind = RateKind::OrderExecution;

    fn key(&self) -> String {
        self.asset_pair_id.clone()
    }

    fn from_default(defaults: &DefaultRateSettings, key: &str) -> Self {
        let d = &defaults.default_order_execution_settings;
        Self {
            asset_pair_id: key.to_string(),
            commission_cap: d.commission_cap,
            commission_floor: d.commission_floor,
            commission_rate: d.commission_rate,
            commission_asset: d.commission_asset.clone(),
            legal_entity: Some(defaults.default_legal_entity.clone()),
        }
    }

    fn validate(&self) -> Result<(), RateSettingsError> {
        require(&self.asset_pair_id, "asset_pair_id")?;
        require(&self.commission_asset, "commission_asset")?;
        non_negative(self.commission_cap, "commission_cap")?;
        non_negative(self.commission_floor, "commission_floor")?;
        non_negative(self.commission_rate, "commission_rate")?;
        if self.commission_floor > self.commission_cap {
            return Err(RateSettingsError::Validation(format!(
                "commission_floor {} exceeds commission_cap {} for {}",
                self.commission_floor, self.commission_cap, self.asset_pair_id
            )));
        }
        Ok(())
    }

    fn legal_entity_mut(&mut self) -> &mut Option<String> {
        &mut self.legal_entity
    }
}

/// Per asset pair overnight swap parameters.
///
/// `variable_rate_base` / `variable_rate_quote` are interest-rate ids resolved
/// against the backend's current interest rates at calculation time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OvernightSwapRate {
    pub asset_pair_id: AssetPairId,
    pub repo_surcharge_percent: Decimal,
    pub fix_rate: Decimal,
    #[serde(default)]
    pub variable_rate_base: Option<String>,
    #[serde(default)]
    pub variable_rate_quote: Option<String>,
    pub commission_asset: String,
    #[serde(default)]
    pub legal_entity: Option<String>,
}

impl RateSetting for OvernightSwapRate {
    const KIND: RateKind = RateKind::OvernightSwap;

    fn key(&self) -> String {
        self.asset_pair_id.clone()
    }

    fn from_default(defaults: &DefaultRateSettings, key: &str) -> Self {
        let d = &defaults.default_overnight_swap_settings;
        Self {
            asset_pair_id: key.to_string(),
            repo_surcharge_percent: d.repo_surcharge_percent,
            fix_rate: d.fix_rate,
            variable_rate_base: d.variable_rate_base.clone(),
            variable_rate_quote: d.variable_rate_quote.clone(),
            commission_asset: d.commission_asset.clone(),
            legal_entity: Some(defaults.default_legal_entity.clone()),
        }
    }

    fn validate(&self) -> Result<(), RateSettingsError> {
        require(&self.asset_pair_id, "asset_pair_id")?;
        require(&self.commission_asset, "commission_asset")?;
        non_negative(self.repo_surcharge_percent, "repo_surcharge_percent")
    }

    fn legal_entity_mut(&mut self) -> &mut Option<String> {
        &mut self.legal_entity
    }
}

/// Singleton commission for actions performed on behalf of a client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OnBehalfRate {
    pub commission: Decimal,
    pub commission_asset: String,
    #[serde(default)]
    pub legal_entity: Option<String>,
}

impl RateSetting for OnBehalfRate {
    const KIND: RateKind = RateKind::OnBehalf;

    fn key(&self) -> String {
        ON_BEHALF_KEY.to_string()
    }

    fn from_default(defaults: &DefaultRateSettings, _key: &str) -> Self {
        let d = &defaults.default_on_behalf_settings;
        Self {
            commission: d.commission,
            commission_asset: d.commission_asset.clone(),
            legal_entity: Some(defaults.default_legal_entity.clone()),
        }
    }

    fn validate(&self) -> Result<(), RateSettingsError> {
        require(&self.commission_asset, "commission_asset")?;
        non_negative(self.commission, "commission")
    }

    fn legal_entity_mut(&mut self) -> &mut Option<String> {
        &mut self.legal_entity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn rate() -> OrderExecutionRate {
        OrderExecutionRate {
            asset_pair_id: "EURUSD".to_string(),
            commission_cap: dec!(100),
            commission_floor: dec!(1),
            commission_rate: dec!(0.01),
            commission_asset: "EUR".to_string(),
            legal_entity: None,
        }
    }

    #[test]
    fn test_cache_key_namespace() {
        assert_eq!(
            RateKind::OvernightSwap.cache_key(),
            "CommissionService:RateSettings:OvernightSwap"
        );
    }

    #[test]
    fn test_order_execution_validation() {
        assert!(rate().validate().is_ok());

        let mut missing_pair = rate();
        missing_pair.asset_pair_id = " ".to_string();
        assert!(matches!(
            missing_pair.validate(),
            Err(RateSettingsError::Validation(_))
        ));

        let mut missing_asset = rate();
        missing_asset.commission_asset.clear();
        assert!(missing_asset.validate().is_err());

        let mut inverted = rate();
        inverted.commission_floor = dec!(200);
        assert!(inverted.validate().is_err());

        let mut negative = rate();
        negative.commission_rate = dec!(-0.01);
        assert!(negative.validate().is_err());
    }

    #[test]
    fn test_on_behalf_uses_singleton_key() {
        let r = OnBehalfRate {
            commission: dec!(5),
            commission_asset: "EUR".to_string(),
            legal_entity: None,
        };
        assert_eq!(r.key(), ON_BEHALF_KEY);
    }
}
